//! Coordinator control paths: timeouts, cancellation, panics and hooks,
//! driven by caller-supplied transactions.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ledger::{
    Ledger, RecurringFlow, StateDelta, Transaction, TransactionContext, TransactionError,
};
use simulation::{
    CancelHandle, CoordinatorConfig, DistributionCoordinator, MetricsHook, PreparedBatch,
    TrialFailureKind, TrialOutcome,
};
use types::{StateSchema, StateVector, Step, TrialId};

/// Sleeps on every application.
#[derive(Debug)]
struct Slow(Duration);

impl Transaction for Slow {
    fn kind(&self) -> &'static str {
        "slow"
    }

    fn apply(
        &self,
        _state: &StateVector,
        _step: Step,
        _ctx: &mut TransactionContext<'_>,
    ) -> Result<StateDelta, TransactionError> {
        thread::sleep(self.0);
        Ok(StateDelta::none())
    }
}

/// Raises the batch's cancel flag the first time it runs.
#[derive(Debug)]
struct CancelOnApply(CancelHandle);

impl Transaction for CancelOnApply {
    fn kind(&self) -> &'static str {
        "cancel-on-apply"
    }

    fn apply(
        &self,
        _state: &StateVector,
        _step: Step,
        _ctx: &mut TransactionContext<'_>,
    ) -> Result<StateDelta, TransactionError> {
        self.0.cancel();
        Ok(StateDelta::none())
    }
}

#[derive(Debug)]
struct Explode;

impl Transaction for Explode {
    fn kind(&self) -> &'static str {
        "explode"
    }

    fn apply(
        &self,
        _state: &StateVector,
        step: Step,
        _ctx: &mut TransactionContext<'_>,
    ) -> Result<StateDelta, TransactionError> {
        if step == 1 {
            panic!("exploded at step {step}");
        }
        Ok(StateDelta::none())
    }
}

fn state() -> StateVector {
    StateVector::new(Arc::new(StateSchema::new(["balance"]).unwrap()))
}

fn salary(horizon: Step) -> Ledger {
    Ledger::new(horizon)
        .unwrap()
        .with(RecurringFlow::credit("balance", 10.0, 1).unwrap())
        .unwrap()
}

#[test]
fn slow_trial_times_out_without_blocking_others() {
    let slow = salary(50)
        .with(Slow(Duration::from_millis(10)))
        .unwrap();
    let batch = PreparedBatch::new(salary(50), state(), 4)
        .unwrap()
        .with_trial_ledger(TrialId(1), slow)
        .unwrap();

    let metrics = Arc::new(MetricsHook::new());
    let mut coordinator = DistributionCoordinator::new(
        CoordinatorConfig::default()
            .with_workers(2)
            .with_trial_timeout(Duration::from_millis(100)),
    );
    coordinator.add_hook(metrics.clone());

    let result = coordinator.execute_prepared(&batch).unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(
        result.succeeded(),
        vec![TrialId(0), TrialId(2), TrialId(3)]
    );

    let err = result.get(TrialId(1)).unwrap().error().unwrap();
    assert_eq!(err.kind, TrialFailureKind::TrialTimeout);
    assert_eq!(metrics.snapshot().timed_out, 1);
}

#[cfg(feature = "parallel")]
#[test]
fn unresponsive_trial_is_abandoned() {
    let hung = salary(2).with(Slow(Duration::from_secs(3))).unwrap();
    let batch = PreparedBatch::new(salary(2), state(), 3)
        .unwrap()
        .with_trial_ledger(TrialId(0), hung)
        .unwrap();

    let coordinator = DistributionCoordinator::new(
        CoordinatorConfig::default()
            .with_workers(3)
            .with_trial_timeout(Duration::from_millis(50)),
    );

    let started = Instant::now();
    let result = coordinator.execute_prepared(&batch).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let err = result.get(TrialId(0)).unwrap().error().unwrap();
    assert!(err.is_timeout());
    assert_eq!(result.succeeded(), vec![TrialId(1), TrialId(2)]);
}

#[cfg(feature = "parallel")]
#[test]
fn hung_trial_does_not_starve_single_worker() {
    let hung = salary(2).with(Slow(Duration::from_secs(3))).unwrap();
    let batch = PreparedBatch::new(salary(2), state(), 3)
        .unwrap()
        .with_trial_ledger(TrialId(0), hung)
        .unwrap();

    let metrics = Arc::new(MetricsHook::new());
    let mut coordinator = DistributionCoordinator::new(
        CoordinatorConfig::default()
            .with_workers(1)
            .with_trial_timeout(Duration::from_millis(50)),
    );
    coordinator.add_hook(metrics.clone());

    let started = Instant::now();
    let result = coordinator.execute_prepared(&batch).unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let err = result.get(TrialId(0)).unwrap().error().unwrap();
    assert!(err.is_timeout());
    assert!(err.message.contains("50ms"), "{err}");
    assert_eq!(result.succeeded(), vec![TrialId(1), TrialId(2)]);
    assert_eq!(metrics.snapshot().completed, 2);
}

#[test]
fn cancellation_skips_trials_not_yet_started() {
    let coordinator = DistributionCoordinator::new(
        CoordinatorConfig::default()
            .with_workers(1)
            .with_force_sequential(true),
    );
    let trigger = salary(3)
        .with(CancelOnApply(coordinator.cancel_handle()))
        .unwrap();
    let batch = PreparedBatch::new(salary(3), state(), 5)
        .unwrap()
        .with_trial_ledger(TrialId(0), trigger)
        .unwrap();

    let started = Instant::now();
    let result = coordinator.execute_prepared(&batch).unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    // The trial that raised the flag was already running and completes.
    assert!(result.get(TrialId(0)).unwrap().is_completed());
    assert_eq!(
        result.cancelled().collect::<Vec<_>>(),
        vec![TrialId(1), TrialId(2), TrialId(3), TrialId(4)]
    );
    assert!(result.failure_manifest().is_none());
    assert!(!result.is_success());
}

#[test]
fn panicking_trial_is_reported_not_propagated() {
    let explosive = salary(3).with(Explode).unwrap();
    let batch = PreparedBatch::new(salary(3), state(), 3)
        .unwrap()
        .with_seed(5)
        .with_trial_ledger(TrialId(2), explosive)
        .unwrap();

    let coordinator = DistributionCoordinator::new(CoordinatorConfig::default().with_workers(2));
    let result = coordinator.execute_prepared(&batch).unwrap();

    match result.get(TrialId(2)).unwrap() {
        TrialOutcome::Failed(err) => {
            assert_eq!(err.kind, TrialFailureKind::Panicked);
            assert!(err.message.contains("exploded at step 1"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let seeds: Vec<_> = result.completed().map(|r| r.seed).collect();
    assert_eq!(seeds, vec![5, 6]);
}
