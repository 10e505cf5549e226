//! Distribution coordinator: fans trials out to a bounded worker pool and
//! assembles the batch result.
//!
//! # Flow
//!
//! ```text
//!   BatchSpec ──► PreparedBatch (all validation) ──► plans
//!                                                     │
//!             ┌───────────── WorkerPool ──────────────┤
//!             │  worker: cancelled? ─► Cancelled      │
//!             │          Started ─► run ─► Finished   │
//!             └──────────────┬────────────────────────┘
//!                            ▼ crossbeam channel
//!   coordinator thread: record outcomes, watchdog deadlines, hooks
//!                            │
//!                            ▼
//!                       BatchResult (keyed by TrialId)
//! ```
//!
//! Workers never touch coordinator state; everything flows back over the
//! channel. A trial that blows through its deadline is recorded as
//! `TrialTimeout` and its late report, if any, is discarded. Its thread
//! cannot be reclaimed, so the coordinator starts a replacement worker and
//! queued trials keep running at full width.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use ledger::{ConfigError, Entities};
use parallel::WorkerPool;
use tracing::{debug, info, warn};
use types::{Step, TrialId};

use crate::batch::{PreparedBatch, TrialPlan};
use crate::config::{BatchSpec, CoordinatorConfig};
use crate::error::TrialError;
use crate::hooks::{BatchHook, BatchInfo, HookRunner, TrialReport, TrialStatus};
use crate::result::{BatchResult, TrialOutcome, TrialResult};
use crate::runner::TrialRunner;

/// Slack given to a trial's own deadline check before the watchdog steps in.
const WATCHDOG_GRACE: Duration = Duration::from_millis(25);

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable cancellation flag.
///
/// Trials that have not started when the flag is raised are reported as
/// cancelled; running trials finish (or time out) normally. The flag stays
/// raised for every later batch run by the same coordinator.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker side
// ─────────────────────────────────────────────────────────────────────────────

enum TrialEvent {
    Started {
        trial: TrialId,
        at: Instant,
    },
    Finished {
        trial: TrialId,
        elapsed: Duration,
        result: Result<TrialResult, TrialError>,
    },
    Cancelled(TrialId),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn run_trial(
    plan: TrialPlan,
    entities: Arc<Entities>,
    horizon: Step,
    timeout: Option<Duration>,
    cancel: CancelHandle,
    events: Sender<TrialEvent>,
) {
    let trial = plan.trial;
    if cancel.is_cancelled() {
        let _ = events.send(TrialEvent::Cancelled(trial));
        return;
    }

    let started = Instant::now();
    let _ = events.send(TrialEvent::Started { trial, at: started });

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut runner = TrialRunner::new(trial, plan.seed, &entities);
        if let Some(budget) = timeout {
            runner = runner.with_timeout(budget);
        }
        runner.run(&plan.ledger, plan.initial, horizon)
    }));
    let result =
        outcome.unwrap_or_else(|payload| Err(TrialError::panicked(trial, &panic_message(&*payload))));

    let _ = events.send(TrialEvent::Finished {
        trial,
        elapsed: started.elapsed(),
        result,
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DistributionCoordinator {
    config: CoordinatorConfig,
    hooks: HookRunner,
    cancel: CancelHandle,
}

impl DistributionCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            hooks: HookRunner::new(),
            cancel: CancelHandle::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn add_hook(&mut self, hook: Arc<dyn BatchHook>) {
        self.hooks.add(hook);
    }

    /// Handle that cancels trials of this coordinator not yet started.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Validate `spec`, then run every trial.
    ///
    /// Configuration errors are returned before any trial starts. Trial
    /// failures never abort the batch; they are recorded in the result.
    pub fn execute(&self, spec: &BatchSpec) -> Result<BatchResult, ConfigError> {
        let batch = PreparedBatch::from_spec(spec, self.config.force_sequential)?;
        self.execute_prepared(&batch)
    }

    /// Run an already validated batch.
    pub fn execute_prepared(&self, batch: &PreparedBatch) -> Result<BatchResult, ConfigError> {
        let pool = WorkerPool::new(self.config.workers, self.config.force_sequential)
            .map_err(|e| ConfigError::invalid(e.to_string()))?;
        let info = BatchInfo {
            trials: batch.trials(),
            horizon: batch.horizon(),
            workers: pool.workers(),
            sequential: pool.is_sequential(),
        };
        info!(
            trials = info.trials,
            horizon = info.horizon,
            workers = info.workers,
            sequential = info.sequential,
            "batch started"
        );
        self.hooks.on_batch_start(&info);

        let (tx, rx) = crossbeam_channel::unbounded();
        for plan in batch.plans() {
            let entities = Arc::clone(batch.entities());
            let horizon = batch.horizon();
            let timeout = self.config.trial_timeout;
            let cancel = self.cancel.clone();
            let events = tx.clone();
            pool.spawn(move || run_trial(plan, entities, horizon, timeout, cancel, events));
        }
        drop(tx);

        let mut outcomes = BTreeMap::new();
        let mut deadlines: HashMap<TrialId, Instant> = HashMap::new();
        let total = batch.trials() as usize;

        while outcomes.len() < total {
            let received = match deadlines.values().min().copied() {
                Some(at) => rx.recv_deadline(at),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(TrialEvent::Started { trial, at }) => {
                    debug!(%trial, "trial started");
                    if let Some(at) = self
                        .config
                        .trial_timeout
                        .and_then(|budget| at.checked_add(budget.saturating_add(WATCHDOG_GRACE)))
                    {
                        deadlines.insert(trial, at);
                    }
                }
                Ok(TrialEvent::Finished {
                    trial,
                    elapsed,
                    result,
                }) => {
                    deadlines.remove(&trial);
                    if outcomes.contains_key(&trial) {
                        debug!(%trial, ?elapsed, "late report after timeout discarded");
                        continue;
                    }
                    let outcome = match result {
                        Ok(result) => TrialOutcome::Completed(result),
                        Err(err) => TrialOutcome::Failed(err),
                    };
                    self.record(&mut outcomes, trial, outcome, Some(elapsed));
                }
                Ok(TrialEvent::Cancelled(trial)) => {
                    self.record(&mut outcomes, trial, TrialOutcome::Cancelled, None);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    let expired: Vec<TrialId> = deadlines
                        .iter()
                        .filter(|(_, at)| **at <= now)
                        .map(|(trial, _)| *trial)
                        .collect();
                    let budget = self.config.trial_timeout.unwrap_or_default();
                    for trial in expired {
                        deadlines.remove(&trial);
                        warn!(%trial, ?budget, "trial unresponsive, abandoning");
                        if let Err(err) = pool.replace_worker() {
                            warn!(%trial, error = %err, "no replacement worker for abandoned trial");
                        }
                        let err = TrialError::timeout(trial, budget);
                        self.record(&mut outcomes, trial, TrialOutcome::Failed(err), Some(budget));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Only reachable if a worker vanished without reporting.
        for trial in (0..batch.trials()).map(TrialId) {
            if !outcomes.contains_key(&trial) {
                let err = TrialError::panicked(trial, "worker exited without reporting");
                self.record(&mut outcomes, trial, TrialOutcome::Failed(err), None);
            }
        }

        let result = BatchResult {
            horizon: batch.horizon(),
            outcomes,
        };
        let failed = result.failures().count();
        let cancelled = result.cancelled().count();
        info!(
            completed = result.len() - failed - cancelled,
            failed, cancelled, "batch finished"
        );
        self.hooks.on_batch_end(&result);
        Ok(result)
    }

    fn record(
        &self,
        outcomes: &mut BTreeMap<TrialId, TrialOutcome>,
        trial: TrialId,
        outcome: TrialOutcome,
        elapsed: Option<Duration>,
    ) {
        let status = match &outcome {
            TrialOutcome::Completed(_) => {
                debug!(%trial, ?elapsed, "trial completed");
                TrialStatus::Completed
            }
            TrialOutcome::Failed(err) => {
                warn!(%trial, kind = %err.kind, error = %err, "trial failed");
                TrialStatus::Failed(err.kind)
            }
            TrialOutcome::Cancelled => {
                warn!(%trial, "trial cancelled before start");
                TrialStatus::Cancelled
            }
        };
        outcomes.insert(trial, outcome);
        self.hooks.on_trial_finished(&TrialReport {
            trial,
            status,
            elapsed,
        });
    }
}
