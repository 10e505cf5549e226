//! Batch and coordinator configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use ledger::{ConfigError, TransactionSpec};
use serde::{Deserialize, Serialize};
use types::{Cash, FieldBounds, StateError, StateSchema, Step, TrialId};

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// How the coordinator runs a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Upper bound on concurrently running trials.
    pub workers: usize,

    /// Wall-clock budget per trial; `None` waits forever.
    pub trial_timeout: Option<Duration>,

    /// Run trials inline on the calling thread even when the `parallel`
    /// feature is enabled.
    pub force_sequential: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            trial_timeout: None,
            force_sequential: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_trial_timeout(mut self, timeout: Duration) -> Self {
        self.trial_timeout = Some(timeout);
        self
    }

    pub fn with_force_sequential(mut self, force: bool) -> Self {
        self.force_sequential = force;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch specification
// ─────────────────────────────────────────────────────────────────────────────

/// Field layout and bounds shared by every trial.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bounds: BTreeMap<String, FieldBounds>,
}

impl SchemaSpec {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            bounds: BTreeMap::new(),
        }
    }

    pub fn with_bounds(mut self, field: &str, bounds: FieldBounds) -> Self {
        self.bounds.insert(field.to_string(), bounds);
        self
    }

    pub fn build(&self) -> Result<StateSchema, StateError> {
        self.bounds.iter().try_fold(
            StateSchema::new(self.fields.iter().cloned())?,
            |schema, (field, bounds)| schema.with_bounds(field, *bounds),
        )
    }
}

/// Replacement inputs for one trial.
///
/// Initial values are merged over the batch's; a ledger replaces the batch
/// ledger entirely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialOverride {
    pub trial: TrialId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub initial: BTreeMap<String, Cash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<Vec<TransactionSpec>>,
}

impl TrialOverride {
    pub fn new(trial: TrialId) -> Self {
        Self {
            trial,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_initial(mut self, field: &str, value: f64) -> Result<Self, ConfigError> {
        self.initial.insert(field.to_string(), initial_value(field, value)?);
        Ok(self)
    }

    pub fn with_ledger(mut self, ledger: Vec<TransactionSpec>) -> Self {
        self.ledger = Some(ledger);
        self
    }
}

/// Declarative description of a batch of trials.
///
/// ```toml
/// trials = 100
/// horizon = 24
/// seed = 42
///
/// [schema]
/// fields = ["checking", "savings"]
/// bounds.savings = { min = 0.0 }
///
/// [initial]
/// checking = 2500.0
///
/// [[ledger]]
/// kind = "recurring_credit"
/// field = "checking"
/// amount = { fixed = 3200.0 }
/// schedule = { periodic = { every = 1 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSpec {
    pub trials: u64,
    pub horizon: Step,
    pub schema: SchemaSpec,
    #[serde(default)]
    pub initial: BTreeMap<String, Cash>,
    #[serde(default)]
    pub ledger: Vec<TransactionSpec>,
    /// Read-only external entities, by name.
    #[serde(default)]
    pub entities: BTreeMap<String, BTreeMap<String, Cash>>,
    /// Base seed; trial `i` uses `seed + i` unless overridden.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub overrides: Vec<TrialOverride>,
}

impl BatchSpec {
    pub fn new(schema: SchemaSpec, horizon: Step, trials: u64) -> Self {
        Self {
            trials,
            horizon,
            schema,
            initial: BTreeMap::new(),
            ledger: Vec::new(),
            entities: BTreeMap::new(),
            seed: 0,
            overrides: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_trials(mut self, trials: u64) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_initial(mut self, field: &str, value: f64) -> Result<Self, ConfigError> {
        self.initial.insert(field.to_string(), initial_value(field, value)?);
        Ok(self)
    }

    pub fn with_transaction(mut self, spec: TransactionSpec) -> Self {
        self.ledger.push(spec);
        self
    }

    pub fn with_entity(mut self, name: &str, fields: BTreeMap<String, Cash>) -> Self {
        self.entities.insert(name.to_string(), fields);
        self
    }

    pub fn with_override(mut self, trial_override: TrialOverride) -> Self {
        self.overrides.push(trial_override);
        self
    }
}

fn initial_value(field: &str, value: f64) -> Result<Cash, ConfigError> {
    Cash::try_from(value)
        .map_err(|reason| ConfigError::invalid(format!("initial value of `{field}`: {reason}")))
}
