//! Threshold conditions evaluated against trial state.

use serde::{Deserialize, Serialize};
use types::{Cash, StateVector};

use crate::context::TransactionContext;
use crate::error::TransactionError;
use crate::field::FieldRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl Comparison {
    pub fn holds(self, lhs: Cash, rhs: Cash) -> bool {
        match self {
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
        }
    }
}

/// `field <op> threshold`, e.g. `checking > 5000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: FieldRef,
    pub op: Comparison,
    pub threshold: Cash,
}

impl Condition {
    pub fn new(field: FieldRef, op: Comparison, threshold: Cash) -> Self {
        Self {
            field,
            op,
            threshold,
        }
    }

    pub fn evaluate(
        &self,
        state: &StateVector,
        ctx: &TransactionContext<'_>,
    ) -> Result<bool, TransactionError> {
        let value = self.field.read(state, ctx)?;
        Ok(self.op.holds(value, self.threshold))
    }
}
