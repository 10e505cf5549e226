//! Ordered, validated collection of transactions.
//!
//! Ledger order is the per-step application order. Every entry is validated
//! against the horizon when it is added, so a `Ledger` that exists is one that
//! can run for `horizon` steps without configuration surprises.

use std::collections::HashSet;
use std::fmt;

use types::{Step, TransactionId};

use crate::error::ConfigError;
use crate::spec::TransactionSpec;
use crate::transaction::Transaction;

/// One positioned transaction.
#[derive(Debug)]
pub struct LedgerEntry {
    id: TransactionId,
    name: String,
    transaction: Box<dyn Transaction>,
}

impl LedgerEntry {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transaction(&self) -> &dyn Transaction {
        self.transaction.as_ref()
    }
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[derive(Debug)]
pub struct Ledger {
    horizon: Step,
    entries: Vec<LedgerEntry>,
    names: HashSet<String>,
}

impl Ledger {
    /// Empty ledger for simulations of `horizon` steps.
    pub fn new(horizon: Step) -> Result<Self, ConfigError> {
        if horizon == 0 {
            return Err(ConfigError::invalid("horizon must be at least one step"));
        }
        Ok(Self {
            horizon,
            entries: Vec::new(),
            names: HashSet::new(),
        })
    }

    /// Build and validate a ledger from declarative specs, in order.
    pub fn from_specs(specs: &[TransactionSpec], horizon: Step) -> Result<Self, ConfigError> {
        let mut ledger = Self::new(horizon)?;
        for spec in specs {
            ledger.push(spec.name.clone(), spec.build())?;
        }
        Ok(ledger)
    }

    /// Append a transaction at the end of the ledger.
    ///
    /// Unnamed entries get `<kind>-<index>`. Names must be unique.
    pub fn push(
        &mut self,
        name: Option<String>,
        transaction: Box<dyn Transaction>,
    ) -> Result<TransactionId, ConfigError> {
        let index = self.entries.len();
        let name = name.unwrap_or_else(|| format!("{}-{index}", transaction.kind()));

        transaction
            .validate(self.horizon)
            .map_err(|reason| ConfigError::transaction(&name, reason))?;
        if !self.names.insert(name.clone()) {
            return Err(ConfigError::transaction(&name, "duplicate transaction name"));
        }

        let id = u32::try_from(index)
            .map(TransactionId)
            .map_err(|_| ConfigError::invalid("too many transactions"))?;
        tracing::trace!(%id, name = %name, kind = transaction.kind(), "ledger entry added");
        self.entries.push(LedgerEntry {
            id,
            name,
            transaction,
        });
        Ok(id)
    }

    /// Builder form of [`Ledger::push`] for unnamed entries.
    pub fn with(mut self, transaction: impl Transaction + 'static) -> Result<Self, ConfigError> {
        self.push(None, Box::new(transaction))?;
        Ok(self)
    }

    /// Builder form of [`Ledger::push`] with an explicit name.
    pub fn with_named(
        mut self,
        name: &str,
        transaction: impl Transaction + 'static,
    ) -> Result<Self, ConfigError> {
        self.push(Some(name.to_string()), Box::new(transaction))?;
        Ok(self)
    }

    pub fn horizon(&self) -> Step {
        self.horizon
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: TransactionId) -> Option<&LedgerEntry> {
        self.entries.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }
}
