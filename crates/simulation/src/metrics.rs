//! MetricsHook - built-in hook aggregating batch statistics.
//!
//! Counts trial outcomes and tracks trial wall time. Useful for progress
//! reporting and post-batch summaries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TrialFailureKind;
use crate::hooks::{BatchHook, BatchInfo, TrialReport, TrialStatus};

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Trials announced by `on_batch_start`, summed over batches.
    pub total_trials: u64,
    pub completed: u64,
    /// All failures, timeouts included.
    pub failed: u64,
    pub timed_out: u64,
    pub cancelled: u64,
    /// Mean wall time of trials that started.
    pub avg_trial_time: Duration,
    pub peak_trial_time: Duration,
}

impl MetricsSnapshot {
    /// Trials reported so far.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }
}

/// Thread-safe batch metrics via atomics and a bounded timing history.
///
/// # Example
///
/// ```ignore
/// use simulation::{DistributionCoordinator, MetricsHook};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsHook::new());
/// coordinator.add_hook(metrics.clone());
/// coordinator.execute(&spec)?;
/// println!("completed: {}", metrics.snapshot().completed);
/// ```
pub struct MetricsHook {
    total_trials: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    /// Sum of trial wall times, in microseconds.
    total_micros: AtomicU64,
    peak_micros: AtomicU64,
    timed: AtomicU64,
    /// Per-trial wall times, capped at `max_history` entries.
    history: Mutex<Vec<Duration>>,
    max_history: usize,
}

impl MetricsHook {
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            total_trials: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            total_micros: AtomicU64::new(0),
            peak_micros: AtomicU64::new(0),
            timed: AtomicU64::new(0),
            history: Mutex::new(Vec::with_capacity(max_history.min(10_000))),
            max_history,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let timed = self.timed.load(Ordering::Relaxed);
        let total_micros = self.total_micros.load(Ordering::Relaxed);
        let avg_micros = if timed > 0 { total_micros / timed } else { 0 };

        MetricsSnapshot {
            total_trials: self.total_trials.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            avg_trial_time: Duration::from_micros(avg_micros),
            peak_trial_time: Duration::from_micros(self.peak_micros.load(Ordering::Relaxed)),
        }
    }

    /// Recorded trial wall times, in completion order.
    pub fn trial_times(&self) -> Vec<Duration> {
        self.history.lock().clone()
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_trials,
            &self.completed,
            &self.failed,
            &self.timed_out,
            &self.cancelled,
            &self.total_micros,
            &self.peak_micros,
            &self.timed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.history.lock().clear();
    }

    /// Update peak value atomically (CAS loop).
    fn update_peak(peak: &AtomicU64, value: u64) {
        let mut current = peak.load(Ordering::Relaxed);
        while value > current {
            match peak.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for MetricsHook {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchHook for MetricsHook {
    fn name(&self) -> &str {
        "Metrics"
    }

    fn on_batch_start(&self, info: &BatchInfo) {
        self.total_trials.fetch_add(info.trials, Ordering::Relaxed);
    }

    fn on_trial_finished(&self, report: &TrialReport) {
        match report.status {
            TrialStatus::Completed => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            TrialStatus::Failed(kind) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if kind == TrialFailureKind::TrialTimeout {
                    self.timed_out.fetch_add(1, Ordering::Relaxed);
                }
            }
            TrialStatus::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(elapsed) = report.elapsed {
            let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
            self.total_micros.fetch_add(micros, Ordering::Relaxed);
            self.timed.fetch_add(1, Ordering::Relaxed);
            Self::update_peak(&self.peak_micros, micros);

            let mut history = self.history.lock();
            if history.len() < self.max_history {
                history.push(elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookRunner;
    use std::sync::Arc;
    use types::TrialId;

    fn report(trial: u64, status: TrialStatus, millis: Option<u64>) -> TrialReport {
        TrialReport {
            trial: TrialId(trial),
            status,
            elapsed: millis.map(Duration::from_millis),
        }
    }

    #[test]
    fn test_metrics_counts_outcomes() {
        let metrics = Arc::new(MetricsHook::new());
        let mut runner = HookRunner::new();
        runner.add(metrics.clone());

        runner.on_batch_start(&BatchInfo {
            trials: 4,
            horizon: 12,
            workers: 2,
            sequential: false,
        });
        runner.on_trial_finished(&report(0, TrialStatus::Completed, Some(10)));
        runner.on_trial_finished(&report(
            1,
            TrialStatus::Failed(TrialFailureKind::TrialTimeout),
            Some(30),
        ));
        runner.on_trial_finished(&report(
            2,
            TrialStatus::Failed(TrialFailureKind::SchemaMismatch),
            Some(2),
        ));
        runner.on_trial_finished(&report(3, TrialStatus::Cancelled, None));

        let snap = metrics.snapshot();
        assert_eq!(snap.total_trials, 4);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed, 2);
        assert_eq!(snap.timed_out, 1);
        assert_eq!(snap.cancelled, 1);
        assert_eq!(snap.finished(), 4);
        assert_eq!(snap.avg_trial_time, Duration::from_millis(14));
        assert_eq!(snap.peak_trial_time, Duration::from_millis(30));
        assert_eq!(metrics.trial_times().len(), 3);
    }

    #[test]
    fn test_history_bounded_and_reset() {
        let metrics = MetricsHook::with_max_history(2);
        for i in 0..5 {
            metrics.on_trial_finished(&report(i, TrialStatus::Completed, Some(1)));
        }
        assert_eq!(metrics.trial_times().len(), 2);
        assert_eq!(metrics.snapshot().completed, 5);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert!(metrics.trial_times().is_empty());
    }
}
