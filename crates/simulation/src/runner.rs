//! Trial runner: advances one state vector through the horizon.
//!
//! # Per-step loop
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  step s                                      │
//! │                                              │
//! │  check deadline                              │
//! │  for entry in ledger (in order):             │
//! │    1. check deadline                         │
//! │    2. delta = entry.apply(&state, s, ctx)    │
//! │    3. state += delta   (visible to the next) │
//! │                                              │
//! │  snapshots.push(state.snapshot())            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every mutable input (state, generator, fired flags) is owned by the
//! runner, so a trial's output depends only on (ledger, initial state,
//! horizon, seed).

use std::time::{Duration, Instant};

use ledger::{Entities, FiredFlags, Ledger, TransactionContext};
use rand::SeedableRng;
use rand::rngs::StdRng;
use types::{StateVector, Step, TrialId};

use crate::error::{TrialError, TrialFailureKind};
use crate::result::TrialResult;

/// Lifecycle of a [`TrialRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    Initialized,
    Running,
    Completed,
    Failed,
}

#[derive(Debug)]
pub struct TrialRunner<'a> {
    trial: TrialId,
    seed: u64,
    entities: &'a Entities,
    timeout: Option<Duration>,
    phase: TrialPhase,
}

impl<'a> TrialRunner<'a> {
    pub fn new(trial: TrialId, seed: u64, entities: &'a Entities) -> Self {
        Self {
            trial,
            seed,
            entities,
            timeout: None,
            phase: TrialPhase::Initialized,
        }
    }

    /// Fail with `TrialTimeout` once `budget` has elapsed since the run
    /// started.
    ///
    /// Checked at the start of every step and between transaction
    /// applications, so a single transaction that never returns is only
    /// caught by the coordinator.
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.timeout = Some(budget);
        self
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    pub fn trial(&self) -> TrialId {
        self.trial
    }

    /// Run `ledger` over `initial` for `horizon` steps.
    ///
    /// A runner runs once; calling `run` again is an error.
    pub fn run(
        &mut self,
        ledger: &Ledger,
        initial: StateVector,
        horizon: Step,
    ) -> Result<TrialResult, TrialError> {
        if self.phase != TrialPhase::Initialized {
            return Err(TrialError::new(
                self.trial,
                TrialFailureKind::InvalidConfiguration,
                format!("runner already {:?}", self.phase),
            ));
        }
        if horizon > ledger.horizon() {
            self.phase = TrialPhase::Failed;
            return Err(TrialError::new(
                self.trial,
                TrialFailureKind::InvalidConfiguration,
                format!(
                    "horizon {horizon} exceeds the ledger's validated horizon {}",
                    ledger.horizon()
                ),
            ));
        }

        self.phase = TrialPhase::Running;
        match self.advance(ledger, initial, horizon) {
            Ok(result) => {
                self.phase = TrialPhase::Completed;
                Ok(result)
            }
            Err(err) => {
                self.phase = TrialPhase::Failed;
                Err(err)
            }
        }
    }

    fn advance(
        &self,
        ledger: &Ledger,
        mut state: StateVector,
        horizon: Step,
    ) -> Result<TrialResult, TrialError> {
        let started = Instant::now();
        // A budget too large to represent as an instant never expires.
        let deadline = self
            .timeout
            .and_then(|budget| Some((started.checked_add(budget)?, budget)));
        let expired = || {
            deadline
                .filter(|(at, _)| Instant::now() >= *at)
                .map(|(_, budget)| TrialError::timeout(self.trial, budget))
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut fired = FiredFlags::new(ledger.len());
        let mut ctx = TransactionContext::new(self.entities, &mut rng, &mut fired, horizon);
        let mut snapshots = Vec::with_capacity(horizon as usize);

        for step in 0..horizon {
            if let Some(err) = expired() {
                return Err(err.at_step(step));
            }
            for entry in ledger.iter() {
                if let Some(err) = expired() {
                    return Err(err.at(step, entry.id(), entry.name()));
                }

                ctx.set_current(entry.id());
                let delta = entry
                    .transaction()
                    .apply(&state, step, &mut ctx)
                    .map_err(|e| {
                        TrialError::from_transaction(self.trial, &e).at(
                            step,
                            entry.id(),
                            entry.name(),
                        )
                    })?;
                delta.apply_to(&mut state).map_err(|e| {
                    TrialError::from_state(self.trial, &e).at(step, entry.id(), entry.name())
                })?;
            }
            snapshots.push(state.snapshot());
        }

        Ok(TrialResult {
            trial: self.trial,
            seed: self.seed,
            snapshots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::{
        Amount, AmountDistribution, FlowDirection, OneOffEvent, RecurringFlow, Schedule,
    };
    use std::sync::Arc;
    use types::{BoundPolicy, Cash, FieldBounds, StateSchema};

    fn balance_schema() -> Arc<StateSchema> {
        Arc::new(StateSchema::new(["balance"]).unwrap())
    }

    fn run(ledger: &Ledger, seed: u64) -> Result<TrialResult, TrialError> {
        let entities = Entities::new();
        let mut runner = TrialRunner::new(TrialId(0), seed, &entities);
        runner.run(ledger, StateVector::new(balance_schema()), ledger.horizon())
    }

    #[test]
    fn test_recurring_credit_series() {
        let ledger = Ledger::new(3)
            .unwrap()
            .with(RecurringFlow::credit("balance", 100.0, 1).unwrap())
            .unwrap();
        let result = run(&ledger, 0).unwrap();
        assert_eq!(
            result.series("balance").unwrap(),
            vec![100.0, 200.0, 300.0]
        );
    }

    #[test]
    fn test_phase_transitions() {
        let ledger = Ledger::new(2)
            .unwrap()
            .with(RecurringFlow::credit("balance", 1.0, 1).unwrap())
            .unwrap();
        let entities = Entities::new();
        let mut runner = TrialRunner::new(TrialId(1), 0, &entities);
        assert_eq!(runner.phase(), TrialPhase::Initialized);
        runner
            .run(&ledger, StateVector::new(balance_schema()), 2)
            .unwrap();
        assert_eq!(runner.phase(), TrialPhase::Completed);

        let again = runner.run(&ledger, StateVector::new(balance_schema()), 2);
        assert_eq!(
            again.unwrap_err().kind,
            TrialFailureKind::InvalidConfiguration
        );
    }

    #[test]
    fn test_horizon_beyond_ledger_rejected() {
        let ledger = Ledger::new(2).unwrap();
        let entities = Entities::new();
        let mut runner = TrialRunner::new(TrialId(0), 0, &entities);
        let err = runner
            .run(&ledger, StateVector::new(balance_schema()), 5)
            .unwrap_err();
        assert_eq!(err.kind, TrialFailureKind::InvalidConfiguration);
        assert_eq!(runner.phase(), TrialPhase::Failed);
    }

    #[test]
    fn test_unknown_field_fails_with_location() {
        let ledger = Ledger::new(4)
            .unwrap()
            .with(RecurringFlow::credit("balance", 1.0, 1).unwrap())
            .unwrap()
            .with_named("bonus", OneOffEvent::at("brokerage", 10.0, 2).unwrap())
            .unwrap();
        let err = run(&ledger, 0).unwrap_err();
        assert_eq!(err.kind, TrialFailureKind::SchemaMismatch);
        assert_eq!(err.step, Some(2));
        assert_eq!(err.transaction_name.as_deref(), Some("bonus"));
    }

    #[test]
    fn test_rejected_bound_is_constraint_violation() {
        let schema = Arc::new(
            StateSchema::new(["balance"])
                .unwrap()
                .with_bounds("balance", FieldBounds::floor(Cash::ZERO))
                .unwrap(),
        );
        let ledger = Ledger::new(3)
            .unwrap()
            .with(RecurringFlow::debit("balance", 40.0, 1).unwrap())
            .unwrap();
        let entities = Entities::new();
        let mut state = StateVector::new(schema);
        state.set("balance", Cash::from_float(50.0)).unwrap();
        let err = TrialRunner::new(TrialId(0), 0, &entities)
            .run(&ledger, state, 3)
            .unwrap_err();
        assert_eq!(err.kind, TrialFailureKind::ConstraintViolation);
        assert_eq!(err.step, Some(1));
    }

    #[test]
    fn test_clamped_bound_keeps_running() {
        let schema = Arc::new(
            StateSchema::new(["balance"])
                .unwrap()
                .with_bounds(
                    "balance",
                    FieldBounds::floor(Cash::ZERO).with_policy(BoundPolicy::Clamp),
                )
                .unwrap(),
        );
        let ledger = Ledger::new(3)
            .unwrap()
            .with(RecurringFlow::debit("balance", 40.0, 1).unwrap())
            .unwrap();
        let entities = Entities::new();
        let mut state = StateVector::new(schema);
        state.set("balance", Cash::from_float(50.0)).unwrap();
        let result = TrialRunner::new(TrialId(0), 0, &entities)
            .run(&ledger, state, 3)
            .unwrap();
        assert_eq!(result.series("balance").unwrap(), vec![10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_same_seed_same_series() {
        let noisy = RecurringFlow::new(
            "balance",
            Amount::Random(AmountDistribution::Normal {
                mean: 100.0,
                std_dev: 25.0,
            }),
            Schedule::Probabilistic { probability: 0.5 },
            FlowDirection::Credit,
        );
        let ledger = Ledger::new(50).unwrap().with(noisy).unwrap();
        let a = run(&ledger, 11).unwrap();
        let b = run(&ledger, 11).unwrap();
        let c = run(&ledger, 12).unwrap();
        assert_eq!(a.snapshots, b.snapshots);
        assert_ne!(a.snapshots, c.snapshots);
    }

    #[test]
    fn test_zero_budget_times_out() {
        let ledger = Ledger::new(3)
            .unwrap()
            .with(RecurringFlow::credit("balance", 1.0, 1).unwrap())
            .unwrap();
        let entities = Entities::new();
        let err = TrialRunner::new(TrialId(4), 0, &entities)
            .with_timeout(Duration::ZERO)
            .run(&ledger, StateVector::new(balance_schema()), 3)
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.step, Some(0));
        assert_eq!(err.message, "exceeded time budget of 0ns");
    }

    #[test]
    fn test_empty_ledger_still_checks_deadline() {
        let ledger = Ledger::new(100_000).unwrap();
        let entities = Entities::new();
        let err = TrialRunner::new(TrialId(0), 0, &entities)
            .with_timeout(Duration::ZERO)
            .run(&ledger, StateVector::new(balance_schema()), 100_000)
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.step, Some(0));
        assert_eq!(err.transaction, None);
    }

    #[derive(Debug)]
    struct Nap(Duration);

    impl ledger::Transaction for Nap {
        fn kind(&self) -> &'static str {
            "nap"
        }

        fn apply(
            &self,
            _state: &StateVector,
            _step: Step,
            _ctx: &mut TransactionContext<'_>,
        ) -> Result<ledger::StateDelta, ledger::TransactionError> {
            std::thread::sleep(self.0);
            Ok(ledger::StateDelta::none())
        }
    }

    #[test]
    fn test_timeout_reports_configured_budget() {
        let budget = Duration::from_millis(20);
        let ledger = Ledger::new(100)
            .unwrap()
            .with(Nap(Duration::from_millis(5)))
            .unwrap();
        let entities = Entities::new();
        let err = TrialRunner::new(TrialId(2), 0, &entities)
            .with_timeout(budget)
            .run(&ledger, StateVector::new(balance_schema()), 100)
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.step.is_some_and(|step| step >= 3));
        assert_eq!(err.message, "exceeded time budget of 20ms");
    }

    #[test]
    fn test_huge_budget_never_expires() {
        let ledger = Ledger::new(2)
            .unwrap()
            .with(RecurringFlow::credit("balance", 1.0, 1).unwrap())
            .unwrap();
        let entities = Entities::new();
        let result = TrialRunner::new(TrialId(0), 0, &entities)
            .with_timeout(Duration::MAX)
            .run(&ledger, StateVector::new(balance_schema()), 2)
            .unwrap();
        assert_eq!(result.series("balance").unwrap(), vec![1.0, 2.0]);
    }
}
