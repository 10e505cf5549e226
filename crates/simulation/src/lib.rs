//! Simulation crate: trial execution and batch distribution.
//!
//! This crate provides:
//! - [`TrialRunner`]: advances one state vector through the horizon,
//!   applying the ledger in order every step
//! - [`DistributionCoordinator`]: runs a batch of independent trials on a
//!   bounded worker pool and assembles a [`BatchResult`]
//! - Batch hooks for observation, with a built-in [`MetricsHook`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │        DistributionCoordinator.execute(spec)         │
//! │                                                      │
//! │  1. Build schema, initial state, entities, ledgers   │
//! │     (any error here aborts before trials run)        │
//! │  2. Hook: on_batch_start                             │
//! │  3. Spawn one job per trial on the WorkerPool        │
//! │  4. Each job: TrialRunner.run(ledger, state, horizon)│
//! │  5. Collect reports, enforce timeouts                │
//! │  6. Hook: on_trial_finished (per trial)              │
//! │  7. Hook: on_batch_end                               │
//! │                                                      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Parallel Execution
//!
//! With the `parallel` feature, trials run on worker threads bounded by
//! [`CoordinatorConfig::workers`]. Without it, or with
//! `force_sequential`, they run inline on the calling thread. Results are
//! identical either way: each trial owns its generator, seeded from its id.
//!
//! # Example
//!
//! ```ignore
//! use simulation::{BatchSpec, CoordinatorConfig, DistributionCoordinator, SchemaSpec};
//! use ledger::TransactionSpec;
//!
//! let spec = BatchSpec::new(SchemaSpec::new(["checking"]), 12, 100)
//!     .with_seed(42)
//!     .with_transaction(TransactionSpec::recurring_credit("checking", 3200.0, 1)?);
//!
//! let coordinator = DistributionCoordinator::new(CoordinatorConfig::default());
//! let result = coordinator.execute(&spec)?;
//! assert!(result.is_success());
//! ```

mod batch;
mod config;
mod coordinator;
mod error;
pub mod hooks;
mod metrics;
mod result;
mod runner;

pub use batch::PreparedBatch;
pub use config::{BatchSpec, CoordinatorConfig, SchemaSpec, TrialOverride};
pub use coordinator::{CancelHandle, DistributionCoordinator};
pub use error::{PartialBatchFailure, TrialError, TrialFailureKind};
pub use hooks::{BatchHook, BatchInfo, HookRunner, TrialReport, TrialStatus};
pub use metrics::{MetricsHook, MetricsSnapshot};
pub use result::{BatchResult, TrialOutcome, TrialResult};
pub use runner::{TrialPhase, TrialRunner};
