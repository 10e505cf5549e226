//! Error types for state vector operations.

use thiserror::Error;

use crate::money::Cash;

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors raised while building or mutating state vectors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A field name that the schema does not define.
    #[error("schema mismatch: unknown field `{field}`")]
    SchemaMismatch { field: String },

    /// A value fell outside the field's bounds, or arithmetic overflowed.
    #[error("constraint violation on `{field}`: {reason}")]
    ConstraintViolation { field: String, reason: String },

    /// The schema itself is malformed (empty, duplicate names, bad bounds).
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl StateError {
    pub(crate) fn unknown_field(field: &str) -> Self {
        StateError::SchemaMismatch {
            field: field.to_string(),
        }
    }

    pub(crate) fn overflow(field: &str, current: Cash, delta: Cash) -> Self {
        StateError::ConstraintViolation {
            field: field.to_string(),
            reason: format!("overflow applying {delta} to {current}"),
        }
    }

    pub(crate) fn out_of_bounds(field: &str, value: Cash, bound: &str, limit: Cash) -> Self {
        StateError::ConstraintViolation {
            field: field.to_string(),
            reason: format!("value {value} breaches {bound} bound {limit}"),
        }
    }
}
