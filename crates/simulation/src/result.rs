//! Per-trial and per-batch results.

use std::collections::BTreeMap;

use serde::Serialize;
use types::{Cash, Snapshot, StateError, Step, TrialId};

use crate::error::{PartialBatchFailure, TrialError};

/// Output of one completed trial: one snapshot per step, `0..horizon`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub trial: TrialId,
    pub seed: u64,
    pub snapshots: Vec<Snapshot>,
}

impl TrialResult {
    pub fn horizon(&self) -> Step {
        self.snapshots.len() as Step
    }

    pub fn at(&self, step: Step) -> Option<&Snapshot> {
        self.snapshots.get(step as usize)
    }

    pub fn final_state(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Time series of one field across all steps.
    pub fn series(&self, field: &str) -> Result<Vec<Cash>, StateError> {
        self.snapshots.iter().map(|s| s.get(field)).collect()
    }
}

/// What happened to one trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialOutcome {
    Completed(TrialResult),
    Failed(TrialError),
    /// Never started because the batch was cancelled.
    Cancelled,
}

impl TrialOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TrialOutcome::Completed(_))
    }

    pub fn result(&self) -> Option<&TrialResult> {
        match self {
            TrialOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TrialError> {
        match self {
            TrialOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Every trial of a batch, keyed by trial id.
///
/// Each id in `0..trials` appears exactly once, whatever order the workers
/// finished in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub horizon: Step,
    pub outcomes: BTreeMap<TrialId, TrialOutcome>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, trial: TrialId) -> Option<&TrialOutcome> {
        self.outcomes.get(&trial)
    }

    pub fn completed(&self) -> impl Iterator<Item = &TrialResult> {
        self.outcomes.values().filter_map(TrialOutcome::result)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TrialError> {
        self.outcomes.values().filter_map(TrialOutcome::error)
    }

    pub fn cancelled(&self) -> impl Iterator<Item = TrialId> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TrialOutcome::Cancelled))
            .map(|(id, _)| *id)
    }

    pub fn succeeded(&self) -> Vec<TrialId> {
        self.completed().map(|r| r.trial).collect()
    }

    /// `true` when every trial completed.
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(TrialOutcome::is_completed)
    }

    /// Failure manifest, or `None` when no trial failed.
    ///
    /// Cancelled trials are not failures.
    pub fn failure_manifest(&self) -> Option<PartialBatchFailure> {
        let failures: BTreeMap<_, _> = self
            .failures()
            .map(|err| (err.trial, err.clone()))
            .collect();
        if failures.is_empty() {
            None
        } else {
            Some(PartialBatchFailure {
                total: self.outcomes.len(),
                failures,
            })
        }
    }

    /// Mean final value of `field` over completed trials.
    pub fn mean_final(&self, field: &str) -> Result<Option<f64>, StateError> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for result in self.completed() {
            if let Some(last) = result.final_state() {
                sum += last.get(field)?.to_float();
                n += 1;
            }
        }
        Ok((n > 0).then(|| sum / n as f64))
    }
}
