//! Trial and batch failure types.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use ledger::TransactionError;
use serde::Serialize;
use thiserror::Error;
use types::{StateError, Step, TransactionId, TrialId};

/// Why a trial failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialFailureKind {
    /// A transaction addressed a field or entity the trial does not have.
    SchemaMismatch,
    /// Overflow or a rejected out-of-bounds value.
    ConstraintViolation,
    /// The trial ran past its time budget.
    TrialTimeout,
    /// Any other error attributable to one transaction.
    Transaction,
    /// The worker panicked while running the trial.
    Panicked,
    /// The runner was asked to do something its inputs do not allow.
    InvalidConfiguration,
}

impl fmt::Display for TrialFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrialFailureKind::SchemaMismatch => "schema mismatch",
            TrialFailureKind::ConstraintViolation => "constraint violation",
            TrialFailureKind::TrialTimeout => "timeout",
            TrialFailureKind::Transaction => "transaction error",
            TrialFailureKind::Panicked => "panic",
            TrialFailureKind::InvalidConfiguration => "invalid configuration",
        };
        f.write_str(label)
    }
}

fn location(step: &Option<Step>, transaction: &Option<String>) -> String {
    match (step, transaction) {
        (Some(step), Some(name)) => format!(" at step {step} in `{name}`"),
        (Some(step), None) => format!(" at step {step}"),
        (None, Some(name)) => format!(" in `{name}`"),
        (None, None) => String::new(),
    }
}

/// Failure record for one trial.
///
/// `step` and `transaction` locate the failure when it is attributable to a
/// single application.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{trial} failed with {kind}{}: {message}", location(.step, .transaction_name))]
pub struct TrialError {
    pub trial: TrialId,
    pub kind: TrialFailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_name: Option<String>,
    pub message: String,
}

impl TrialError {
    pub fn new(trial: TrialId, kind: TrialFailureKind, message: impl Into<String>) -> Self {
        Self {
            trial,
            kind,
            step: None,
            transaction: None,
            transaction_name: None,
            message: message.into(),
        }
    }

    /// Attach the step and transaction the failure happened in.
    pub fn at_step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    pub fn at(mut self, step: Step, transaction: TransactionId, name: &str) -> Self {
        self.step = Some(step);
        self.transaction = Some(transaction);
        self.transaction_name = Some(name.to_string());
        self
    }

    pub fn from_transaction(trial: TrialId, err: &TransactionError) -> Self {
        let kind = if err.is_schema_mismatch() {
            TrialFailureKind::SchemaMismatch
        } else if err.is_constraint_violation() {
            TrialFailureKind::ConstraintViolation
        } else {
            TrialFailureKind::Transaction
        };
        Self::new(trial, kind, err.to_string())
    }

    pub fn from_state(trial: TrialId, err: &StateError) -> Self {
        let kind = match err {
            StateError::SchemaMismatch { .. } => TrialFailureKind::SchemaMismatch,
            StateError::ConstraintViolation { .. } => TrialFailureKind::ConstraintViolation,
            StateError::InvalidSchema(_) => TrialFailureKind::InvalidConfiguration,
        };
        Self::new(trial, kind, err.to_string())
    }

    pub fn timeout(trial: TrialId, budget: Duration) -> Self {
        Self::new(
            trial,
            TrialFailureKind::TrialTimeout,
            format!("exceeded time budget of {budget:?}"),
        )
    }

    pub fn panicked(trial: TrialId, message: &str) -> Self {
        Self::new(
            trial,
            TrialFailureKind::Panicked,
            format!("worker panicked: {message}"),
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TrialFailureKind::TrialTimeout
    }
}

/// Aggregate signal that at least one trial of a batch failed.
///
/// Carries every failing trial id with its cause; successful trials stay in
/// the [`BatchResult`](crate::BatchResult) it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{} of {total} trials failed", .failures.len())]
pub struct PartialBatchFailure {
    pub total: usize,
    pub failures: BTreeMap<TrialId, TrialError>,
}

impl PartialBatchFailure {
    pub fn failed_trials(&self) -> impl Iterator<Item = TrialId> + '_ {
        self.failures.keys().copied()
    }

    /// Failure counts per kind.
    pub fn by_kind(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for err in self.failures.values() {
            *counts.entry(err.kind.to_string()).or_default() += 1;
        }
        counts
    }
}
