//! One-off event: a single credit or debit that fires exactly once per trial.
//!
//! The event fires either at a configured step or at the first step whose
//! condition holds. The "already fired" flag lives in the trial's context,
//! so a ledger shared by many trials fires the event once in each of them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use types::{Step, StateVector};

use crate::amount::Amount;
use crate::condition::Condition;
use crate::context::TransactionContext;
use crate::delta::StateDelta;
use crate::error::{ConfigError, TransactionError};
use crate::transaction::Transaction;
use crate::variants::recurring::FlowDirection;

/// When a one-off event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneOffTrigger {
    AtStep(Step),
    /// First step at which the condition holds.
    When(Condition),
}

#[derive(Debug, Clone)]
pub struct OneOffEvent {
    field: Arc<str>,
    amount: Amount,
    direction: FlowDirection,
    trigger: OneOffTrigger,
}

impl OneOffEvent {
    pub fn new(field: &str, amount: Amount, direction: FlowDirection, trigger: OneOffTrigger) -> Self {
        Self {
            field: Arc::from(field),
            amount,
            direction,
            trigger,
        }
    }

    /// Credit (or debit, for negative amounts) `amount` at `step`.
    pub fn at(field: &str, amount: f64, step: Step) -> Result<Self, ConfigError> {
        let direction = if amount < 0.0 {
            FlowDirection::Debit
        } else {
            FlowDirection::Credit
        };
        Ok(Self::new(
            field,
            Amount::fixed(amount.abs())?,
            direction,
            OneOffTrigger::AtStep(step),
        ))
    }

    pub fn trigger(&self) -> &OneOffTrigger {
        &self.trigger
    }
}

impl Transaction for OneOffEvent {
    fn kind(&self) -> &'static str {
        "one-off"
    }

    fn validate(&self, horizon: Step) -> Result<(), String> {
        if let OneOffTrigger::AtStep(step) = self.trigger
            && step >= horizon
        {
            return Err(format!("step {step} is outside the horizon 0..{horizon}"));
        }
        self.amount.validate()
    }

    fn apply(
        &self,
        state: &StateVector,
        step: Step,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<StateDelta, TransactionError> {
        if ctx.has_fired() {
            return Ok(StateDelta::none());
        }

        let due = match &self.trigger {
            OneOffTrigger::AtStep(at) => step == *at,
            OneOffTrigger::When(condition) => condition.evaluate(state, ctx)?,
        };
        if !due {
            return Ok(StateDelta::none());
        }

        let amount = self.amount.resolve(state, ctx)?;
        let signed = match self.direction {
            FlowDirection::Credit => amount,
            FlowDirection::Debit => amount.checked_neg().ok_or_else(|| {
                TransactionError::InvalidAmount(format!("cannot debit {amount}"))
            })?,
        };
        ctx.fire_once();
        Ok(StateDelta::credit(Arc::clone(&self.field), signed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Comparison;
    use crate::context::{Entities, FiredFlags};
    use crate::field::FieldRef;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use types::{Cash, StateSchema};

    fn run(event: &OneOffEvent, initial: f64, steps: Step, fired: &mut FiredFlags) -> Vec<Cash> {
        let schema = Arc::new(StateSchema::new(["balance"]).unwrap());
        let mut state = StateVector::new(schema);
        state.set("balance", Cash::from_float(initial)).unwrap();
        let entities = Entities::new();
        let mut rng = StdRng::seed_from_u64(0);
        let mut out = Vec::new();
        for step in 0..steps {
            let mut ctx = TransactionContext::new(&entities, &mut rng, &mut *fired, steps);
            event
                .apply(&state, step, &mut ctx)
                .unwrap()
                .apply_to(&mut state)
                .unwrap();
            out.push(state.get("balance").unwrap());
        }
        out
    }

    #[test]
    fn test_fires_at_step_once() {
        let event = OneOffEvent::at("balance", -250.0, 1).unwrap();
        let mut fired = FiredFlags::new(1);
        assert_eq!(run(&event, 0.0, 4, &mut fired), vec![0.0, -250.0, -250.0, -250.0]);
        assert_eq!(fired.count(), 1);
    }

    #[test]
    fn test_condition_fires_once_even_if_still_true() {
        let event = OneOffEvent::new(
            "balance",
            Amount::fixed(10.0).unwrap(),
            FlowDirection::Credit,
            OneOffTrigger::When(Condition::new(
                FieldRef::local("balance"),
                Comparison::Ge,
                Cash::ZERO,
            )),
        );
        let mut fired = FiredFlags::new(1);
        assert_eq!(run(&event, 0.0, 3, &mut fired), vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_fresh_flags_fire_again() {
        let event = OneOffEvent::at("balance", 5.0, 0).unwrap();
        let mut first = FiredFlags::new(1);
        let mut second = FiredFlags::new(1);
        assert_eq!(run(&event, 0.0, 2, &mut first), vec![5.0, 5.0]);
        assert_eq!(run(&event, 0.0, 2, &mut second), vec![5.0, 5.0]);
    }

    #[test]
    fn test_validate_out_of_horizon() {
        assert!(OneOffEvent::at("balance", 1.0, 3).unwrap().validate(3).is_err());
        assert!(OneOffEvent::at("balance", 1.0, 2).unwrap().validate(3).is_ok());
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        assert!(OneOffEvent::at("balance", f64::INFINITY, 0).is_err());
        assert!(OneOffEvent::at("balance", f64::NAN, 0).is_err());
        assert!(OneOffEvent::at("balance", -f64::MAX, 0).is_err());
    }
}
