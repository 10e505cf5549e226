//! State deltas: the output of a transaction application.
//!
//! A delta is a short list of additive changes to local fields. The runner
//! applies it immediately, so the next transaction in the same step observes
//! the result.

use std::sync::Arc;

use smallvec::SmallVec;
use types::{Cash, StateError, StateVector};

/// One additive change to a local field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: Arc<str>,
    pub amount: Cash,
}

/// Changes produced by one transaction at one step.
///
/// Most transactions touch one field (flows) or two (transfers), so the
/// changes live inline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    changes: SmallVec<[FieldChange; 2]>,
}

impl StateDelta {
    /// A delta that changes nothing (off-cycle steps, unmet conditions).
    pub fn none() -> Self {
        Self::default()
    }

    /// Add `amount` to `field`.
    pub fn credit(field: Arc<str>, amount: Cash) -> Self {
        let mut delta = Self::none();
        delta.push(field, amount);
        delta
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(from: Arc<str>, to: Arc<str>, amount: Cash) -> Result<Self, StateError> {
        let debit = amount
            .checked_neg()
            .ok_or_else(|| StateError::ConstraintViolation {
                field: from.to_string(),
                reason: format!("cannot negate transfer amount {amount}"),
            })?;
        let mut delta = Self::none();
        delta.push(from, debit);
        delta.push(to, amount);
        Ok(delta)
    }

    pub fn push(&mut self, field: Arc<str>, amount: Cash) {
        self.changes.push(FieldChange { field, amount });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Apply every change in order to `state`.
    pub fn apply_to(&self, state: &mut StateVector) -> Result<(), StateError> {
        for change in &self.changes {
            state.add(&change.field, change.amount)?;
        }
        Ok(())
    }
}
