//! Recurring flow: credit or debit a field on a schedule.
//!
//! Models salaries, rent, subscriptions, interest and any other periodic or
//! probabilistic income/expense. Off-cycle steps produce an empty delta.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use types::{Step, StateVector};

use crate::amount::Amount;
use crate::context::TransactionContext;
use crate::delta::StateDelta;
use crate::error::{ConfigError, TransactionError};
use crate::schedule::Schedule;
use crate::transaction::Transaction;

/// Direction of a flow relative to its target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone)]
pub struct RecurringFlow {
    field: Arc<str>,
    amount: Amount,
    schedule: Schedule,
    direction: FlowDirection,
}

impl RecurringFlow {
    pub fn new(field: &str, amount: Amount, schedule: Schedule, direction: FlowDirection) -> Self {
        Self {
            field: Arc::from(field),
            amount,
            schedule: schedule.normalized(),
            direction,
        }
    }

    /// Credit `amount` to `field` every `period` steps from step 0.
    pub fn credit(field: &str, amount: f64, period: Step) -> Result<Self, ConfigError> {
        Ok(Self::new(
            field,
            Amount::fixed(amount)?,
            Schedule::every(period),
            FlowDirection::Credit,
        ))
    }

    /// Debit `amount` from `field` every `period` steps from step 0.
    pub fn debit(field: &str, amount: f64, period: Step) -> Result<Self, ConfigError> {
        Ok(Self::new(
            field,
            Amount::fixed(amount)?,
            Schedule::every(period),
            FlowDirection::Debit,
        ))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn direction(&self) -> FlowDirection {
        self.direction
    }
}

impl Transaction for RecurringFlow {
    fn kind(&self) -> &'static str {
        match self.direction {
            FlowDirection::Credit => "recurring-credit",
            FlowDirection::Debit => "recurring-debit",
        }
    }

    fn validate(&self, horizon: Step) -> Result<(), String> {
        if self.field.is_empty() {
            return Err("target field must be named".into());
        }
        self.schedule.validate(horizon)?;
        self.amount.validate()
    }

    fn apply(
        &self,
        state: &StateVector,
        step: Step,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<StateDelta, TransactionError> {
        if !self.schedule.fires(step, ctx.rng()) {
            return Ok(StateDelta::none());
        }

        let amount = self.amount.resolve(state, ctx)?;
        let signed = match self.direction {
            FlowDirection::Credit => amount,
            FlowDirection::Debit => amount.checked_neg().ok_or_else(|| {
                TransactionError::InvalidAmount(format!("cannot debit {amount}"))
            })?,
        };
        Ok(StateDelta::credit(Arc::clone(&self.field), signed))
    }
}
