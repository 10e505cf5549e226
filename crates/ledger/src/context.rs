//! Per-application context handed to every transaction.
//!
//! The context is the only channel through which a transaction sees anything
//! beyond its own parameters and the trial's state vector:
//! - read-only external entities (e.g. a linked account)
//! - the trial's seeded random generator
//! - the trial's fired-flag set for one-off transactions
//!
//! Everything mutable here is owned by a single trial, so ledgers can be
//! shared across concurrently running trials.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use types::{Snapshot, Step, TransactionId};

use crate::error::TransactionError;

/// Named read-only entities available to every trial of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    entries: BTreeMap<String, Snapshot>,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    pub fn with(mut self, name: impl Into<String>, snapshot: Snapshot) -> Self {
        self.entries.insert(name.into(), snapshot);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Snapshot, TransactionError> {
        self.entries
            .get(name)
            .ok_or_else(|| TransactionError::UnknownEntity(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-trial record of which one-off transactions already fired.
///
/// Created fresh for every trial; never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiredFlags {
    fired: Vec<bool>,
}

impl FiredFlags {
    pub fn new(ledger_len: usize) -> Self {
        Self {
            fired: vec![false; ledger_len],
        }
    }

    pub fn has_fired(&self, id: TransactionId) -> bool {
        self.fired.get(id.index()).copied().unwrap_or(false)
    }

    /// Mark `id` fired. Returns `true` only on the first call.
    pub fn mark(&mut self, id: TransactionId) -> bool {
        let i = id.index();
        if i >= self.fired.len() {
            self.fired.resize(i + 1, false);
        }
        !std::mem::replace(&mut self.fired[i], true)
    }

    pub fn count(&self) -> usize {
        self.fired.iter().filter(|f| **f).count()
    }
}

/// Context for one transaction application.
pub struct TransactionContext<'a> {
    entities: &'a Entities,
    rng: &'a mut StdRng,
    fired: &'a mut FiredFlags,
    horizon: Step,
    current: TransactionId,
}

impl<'a> TransactionContext<'a> {
    pub fn new(
        entities: &'a Entities,
        rng: &'a mut StdRng,
        fired: &'a mut FiredFlags,
        horizon: Step,
    ) -> Self {
        Self {
            entities,
            rng,
            fired,
            horizon,
            current: TransactionId::default(),
        }
    }

    /// Point the context at the transaction about to be applied.
    pub fn set_current(&mut self, id: TransactionId) {
        self.current = id;
    }

    pub fn current(&self) -> TransactionId {
        self.current
    }

    pub fn horizon(&self) -> Step {
        self.horizon
    }

    pub fn entity(&self, name: &str) -> Result<&Snapshot, TransactionError> {
        self.entities.get(name)
    }

    /// The trial's seeded generator.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut *self.rng
    }

    /// Whether the current transaction already fired in this trial.
    pub fn has_fired(&self) -> bool {
        self.fired.has_fired(self.current)
    }

    /// Claim the current transaction's single firing. `true` the first time.
    pub fn fire_once(&mut self) -> bool {
        self.fired.mark(self.current)
    }
}
