//! Error types for ledger construction and transaction application.

use thiserror::Error;
use types::StateError;

/// Construction-time failure: bad ledger, transaction or schema parameters.
///
/// Always raised before any trial runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A transaction's parameters are invalid for the configured horizon.
    #[error("invalid configuration for transaction `{transaction}`: {reason}")]
    InvalidTransaction { transaction: String, reason: String },

    /// Batch or schema level problem.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid configuration: {0}")]
    State(#[from] StateError),
}

impl ConfigError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ConfigError::InvalidConfiguration(reason.into())
    }

    pub(crate) fn transaction(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidTransaction {
            transaction: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Runtime failure raised by a single transaction application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// Schema mismatch or constraint violation on the trial's state.
    #[error(transparent)]
    State(#[from] StateError),

    /// Reference to an external entity the batch did not provide.
    #[error("schema mismatch: unknown entity `{0}`")]
    UnknownEntity(String),

    /// A computed amount could not be represented (NaN, infinite, overflow).
    #[error("amount not representable: {0}")]
    InvalidAmount(String),
}

impl TransactionError {
    /// Whether this error stems from addressing a field or entity that does
    /// not exist.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            TransactionError::State(StateError::SchemaMismatch { .. })
                | TransactionError::UnknownEntity(_)
        )
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            TransactionError::State(StateError::ConstraintViolation { .. })
        )
    }
}
