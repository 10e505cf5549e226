//! Core types for the cash-flow simulation engine.
//!
//! This crate defines the vocabulary shared by every other crate:
//! - Identifiers for trials and transactions
//! - Fixed-point `Cash` amounts with checked arithmetic
//! - The `StateSchema` describing a trial's named fields and their bounds
//! - `StateVector` (live state) and `Snapshot` (frozen per-step state)

mod error;
mod ids;
mod money;
mod schema;
mod state;

pub use error::{Result, StateError};
pub use ids::{MONEY_SCALE, Step, TransactionId, TrialId};
pub use money::Cash;
pub use schema::{BoundPolicy, FieldBounds, StateSchema};
pub use state::{Snapshot, StateVector};
