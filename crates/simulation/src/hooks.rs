//! Batch hooks for observing coordinator lifecycle events.
//!
//! Hooks are **observers**: they receive owned or borrowed read-only data at
//! key points of a batch and cannot influence trial execution. Every call
//! happens on the coordinator thread, in registration order.
//!
//! # Example
//!
//! ```ignore
//! use simulation::hooks::{BatchHook, TrialReport};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct FailureCounter {
//!     failed: AtomicU64,
//! }
//!
//! impl BatchHook for FailureCounter {
//!     fn name(&self) -> &str { "FailureCounter" }
//!
//!     fn on_trial_finished(&self, report: &TrialReport) {
//!         if report.status.is_failure() {
//!             self.failed.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use types::{Step, TrialId};

use crate::error::TrialFailureKind;
use crate::result::BatchResult;

// ─────────────────────────────────────────────────────────────────────────────
// Hook Context
// ─────────────────────────────────────────────────────────────────────────────

/// Shape of a batch about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    pub trials: u64,
    pub horizon: Step,
    pub workers: usize,
    pub sequential: bool,
}

/// Terminal status of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStatus {
    Completed,
    Failed(TrialFailureKind),
    Cancelled,
}

impl TrialStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, TrialStatus::Failed(_))
    }
}

/// One trial reaching a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialReport {
    pub trial: TrialId,
    pub status: TrialStatus,
    /// Wall time from start to report; `None` for trials that never started.
    pub elapsed: Option<Duration>,
}

// ─────────────────────────────────────────────────────────────────────────────
// BatchHook Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for batch observers.
///
/// Use interior mutability (`Mutex`, atomics) for hook-owned state.
///
/// ```text
/// on_batch_start ──► on_trial_finished × trials ──► on_batch_end
/// ```
pub trait BatchHook: Send + Sync {
    /// Human-readable name for logging and debugging.
    fn name(&self) -> &str;

    #[allow(unused_variables)]
    fn on_batch_start(&self, info: &BatchInfo) {}

    /// Called once per trial as its outcome is recorded, in completion
    /// order (not trial id order).
    #[allow(unused_variables)]
    fn on_trial_finished(&self, report: &TrialReport) {}

    #[allow(unused_variables)]
    fn on_batch_end(&self, result: &BatchResult) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// HookRunner
// ─────────────────────────────────────────────────────────────────────────────

/// Registered hooks, invoked sequentially in registration order.
#[derive(Default, Clone)]
pub struct HookRunner {
    hooks: Vec<Arc<dyn BatchHook>>,
}

impl HookRunner {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn add(&mut self, hook: Arc<dyn BatchHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn on_batch_start(&self, info: &BatchInfo) {
        for hook in &self.hooks {
            hook.on_batch_start(info);
        }
    }

    pub fn on_trial_finished(&self, report: &TrialReport) {
        for hook in &self.hooks {
            hook.on_trial_finished(report);
        }
    }

    pub fn on_batch_end(&self, result: &BatchResult) {
        for hook in &self.hooks {
            hook.on_batch_end(result);
        }
    }
}

impl std::fmt::Debug for HookRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRunner")
            .field("hooks", &self.hook_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingHook {
        starts: AtomicU64,
        finished: AtomicU64,
        ends: AtomicU64,
    }

    impl CountingHook {
        fn new() -> Self {
            Self {
                starts: AtomicU64::new(0),
                finished: AtomicU64::new(0),
                ends: AtomicU64::new(0),
            }
        }
    }

    impl BatchHook for CountingHook {
        fn name(&self) -> &str {
            "Counting"
        }

        fn on_batch_start(&self, _info: &BatchInfo) {
            self.starts.fetch_add(1, Ordering::Relaxed);
        }

        fn on_trial_finished(&self, _report: &TrialReport) {
            self.finished.fetch_add(1, Ordering::Relaxed);
        }

        fn on_batch_end(&self, _result: &BatchResult) {
            self.ends.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct Silent;

    impl BatchHook for Silent {
        fn name(&self) -> &str {
            "Silent"
        }
    }

    #[test]
    fn test_hook_runner_invocation() {
        let hook = Arc::new(CountingHook::new());
        let mut runner = HookRunner::new();
        runner.add(hook.clone());
        runner.add(Arc::new(Silent));
        assert_eq!(runner.hook_names(), vec!["Counting", "Silent"]);

        runner.on_batch_start(&BatchInfo {
            trials: 2,
            horizon: 1,
            workers: 1,
            sequential: true,
        });
        for trial in 0..2 {
            runner.on_trial_finished(&TrialReport {
                trial: TrialId(trial),
                status: TrialStatus::Completed,
                elapsed: Some(Duration::from_millis(1)),
            });
        }
        runner.on_batch_end(&BatchResult {
            horizon: 1,
            outcomes: BTreeMap::new(),
        });

        assert_eq!(hook.starts.load(Ordering::Relaxed), 1);
        assert_eq!(hook.finished.load(Ordering::Relaxed), 2);
        assert_eq!(hook.ends.load(Ordering::Relaxed), 1);
    }
}
