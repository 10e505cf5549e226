//! Conditional transfer: move value between two fields when a predicate holds.
//!
//! The canonical use is an auto-sweep: "when checking exceeds 5,000, move the
//! excess to savings". Transfers never move a negative amount, and by default
//! never move more than the source holds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use types::{Cash, Step, StateVector};

use crate::condition::Condition;
use crate::context::TransactionContext;
use crate::delta::StateDelta;
use crate::error::TransactionError;
use crate::transaction::Transaction;

/// How much a triggered transfer moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferAmount {
    Fixed(Cash),
    /// Everything in the source above this level.
    ExcessOver(Cash),
    /// The whole (positive) source balance.
    Entire,
}

#[derive(Debug, Clone)]
pub struct ConditionalTransfer {
    from: Arc<str>,
    to: Arc<str>,
    when: Condition,
    amount: TransferAmount,
    cap_at_source: bool,
}

impl ConditionalTransfer {
    pub fn new(from: &str, to: &str, when: Condition, amount: TransferAmount) -> Self {
        Self {
            from: Arc::from(from),
            to: Arc::from(to),
            when,
            amount,
            cap_at_source: true,
        }
    }

    /// Allow fixed transfers to overdraw the source (bounds still apply).
    pub fn allow_overdraw(mut self) -> Self {
        self.cap_at_source = false;
        self
    }

    pub fn condition(&self) -> &Condition {
        &self.when
    }
}

impl Transaction for ConditionalTransfer {
    fn kind(&self) -> &'static str {
        "conditional-transfer"
    }

    fn validate(&self, _horizon: Step) -> Result<(), String> {
        if self.from == self.to {
            return Err(format!("transfer source and destination are both `{}`", self.from));
        }
        if let TransferAmount::Fixed(value) = self.amount
            && value.is_negative()
        {
            return Err(format!("fixed transfer amount {value} must be non-negative"));
        }
        Ok(())
    }

    fn apply(
        &self,
        state: &StateVector,
        _step: Step,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<StateDelta, TransactionError> {
        if !self.when.evaluate(state, ctx)? {
            return Ok(StateDelta::none());
        }

        let available = state.get(&self.from)?;
        // Resolve the destination up front so a bad name fails even when
        // nothing would move.
        state.get(&self.to)?;

        let requested = match self.amount {
            TransferAmount::Fixed(value) => value,
            TransferAmount::ExcessOver(level) => available
                .checked_sub(level)
                .ok_or_else(|| {
                    TransactionError::InvalidAmount(format!("{available} - {level} overflows"))
                })?
                .max(Cash::ZERO),
            TransferAmount::Entire => available.max(Cash::ZERO),
        };

        let moved = if self.cap_at_source {
            requested.min(available.max(Cash::ZERO))
        } else {
            requested
        };

        if moved.is_zero() {
            return Ok(StateDelta::none());
        }
        Ok(StateDelta::transfer(
            Arc::clone(&self.from),
            Arc::clone(&self.to),
            moved,
        )?)
    }
}
