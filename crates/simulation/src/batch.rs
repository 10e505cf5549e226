//! Validated, ready-to-run batches.
//!
//! A [`PreparedBatch`] is the output of construction: schema, initial state,
//! entities and every ledger (shared and per-trial) have been built and
//! validated. Nothing here can fail once a batch is prepared, which is what
//! lets the coordinator promise that configuration errors never surface
//! mid-batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use ledger::{ConfigError, Entities, Ledger};
use types::{Snapshot, StateVector, Step, TrialId};

use crate::config::BatchSpec;

#[derive(Debug, Default)]
struct PreparedOverride {
    seed: Option<u64>,
    initial: Option<StateVector>,
    ledger: Option<Arc<Ledger>>,
}

/// Everything one worker needs to run one trial.
#[derive(Debug)]
pub(crate) struct TrialPlan {
    pub trial: TrialId,
    pub seed: u64,
    pub ledger: Arc<Ledger>,
    pub initial: StateVector,
}

#[derive(Debug)]
pub struct PreparedBatch {
    trials: u64,
    horizon: Step,
    seed: u64,
    initial: StateVector,
    ledger: Arc<Ledger>,
    entities: Arc<Entities>,
    overrides: BTreeMap<TrialId, PreparedOverride>,
}

impl PreparedBatch {
    /// Batch of `trials` runs of `ledger` over its full horizon.
    pub fn new(ledger: Ledger, initial: StateVector, trials: u64) -> Result<Self, ConfigError> {
        if trials == 0 {
            return Err(ConfigError::invalid("a batch needs at least one trial"));
        }
        Ok(Self {
            trials,
            horizon: ledger.horizon(),
            seed: 0,
            initial,
            ledger: Arc::new(ledger),
            entities: Arc::new(Entities::new()),
            overrides: BTreeMap::new(),
        })
    }

    /// Build and validate every part of a declarative batch.
    ///
    /// Replacement ledgers are built concurrently unless `force_sequential`.
    pub fn from_spec(spec: &BatchSpec, force_sequential: bool) -> Result<Self, ConfigError> {
        let schema = Arc::new(spec.schema.build()?);
        let initial = StateVector::from_initial(Arc::clone(&schema), &spec.initial)?;
        let ledger = Ledger::from_specs(&spec.ledger, spec.horizon)?;

        let mut entities = Entities::new();
        for (name, fields) in &spec.entities {
            let snapshot = Snapshot::from_pairs(fields.iter().map(|(f, v)| (f.clone(), *v)))?;
            entities = entities.with(name.clone(), snapshot);
        }

        let mut batch = Self::new(ledger, initial.clone(), spec.trials)?
            .with_seed(spec.seed)
            .with_entities(entities);

        let ledgers = parallel::map_slice(
            &spec.overrides,
            |o| {
                o.ledger
                    .as_ref()
                    .map(|specs| Ledger::from_specs(specs, spec.horizon))
                    .transpose()
            },
            force_sequential,
        );

        for (o, ledger) in spec.overrides.iter().zip(ledgers) {
            let ledger = ledger.map_err(|e| ConfigError::invalid(format!("{}: {e}", o.trial)))?;
            batch.check_trial(o.trial)?;
            if batch.overrides.contains_key(&o.trial) {
                return Err(ConfigError::invalid(format!(
                    "{} is overridden more than once",
                    o.trial
                )));
            }
            if let Some(seed) = o.seed {
                batch = batch.with_trial_seed(o.trial, seed)?;
            }
            if !o.initial.is_empty() {
                let mut merged = spec.initial.clone();
                merged.extend(o.initial.iter().map(|(k, v)| (k.clone(), *v)));
                let state = StateVector::from_initial(Arc::clone(&schema), &merged)?;
                batch = batch.with_trial_initial(o.trial, state)?;
            }
            if let Some(ledger) = ledger {
                batch = batch.with_trial_ledger(o.trial, ledger)?;
            }
            // Reserve the id even if the override turned out empty.
            batch.overrides.entry(o.trial).or_default();
        }

        Ok(batch)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_entities(mut self, entities: Entities) -> Self {
        self.entities = Arc::new(entities);
        self
    }

    pub fn with_trial_seed(mut self, trial: TrialId, seed: u64) -> Result<Self, ConfigError> {
        self.check_trial(trial)?;
        self.overrides.entry(trial).or_default().seed = Some(seed);
        Ok(self)
    }

    /// Replace the initial state of one trial. The schema must match.
    pub fn with_trial_initial(
        mut self,
        trial: TrialId,
        initial: StateVector,
    ) -> Result<Self, ConfigError> {
        self.check_trial(trial)?;
        if initial.schema() != self.initial.schema() {
            return Err(ConfigError::invalid(format!(
                "{trial}: initial state does not use the batch schema"
            )));
        }
        self.overrides.entry(trial).or_default().initial = Some(initial);
        Ok(self)
    }

    /// Replace the ledger of one trial. It must be validated for at least the
    /// batch horizon.
    pub fn with_trial_ledger(mut self, trial: TrialId, ledger: Ledger) -> Result<Self, ConfigError> {
        self.check_trial(trial)?;
        if ledger.horizon() < self.horizon {
            return Err(ConfigError::invalid(format!(
                "{trial}: ledger horizon {} is shorter than the batch horizon {}",
                ledger.horizon(),
                self.horizon
            )));
        }
        self.overrides.entry(trial).or_default().ledger = Some(Arc::new(ledger));
        Ok(self)
    }

    pub fn trials(&self) -> u64 {
        self.trials
    }

    pub fn horizon(&self) -> Step {
        self.horizon
    }

    pub fn entities(&self) -> &Arc<Entities> {
        &self.entities
    }

    /// Explicit override, else base seed plus trial index.
    pub fn seed_for(&self, trial: TrialId) -> u64 {
        self.overrides
            .get(&trial)
            .and_then(|o| o.seed)
            .unwrap_or_else(|| self.seed.wrapping_add(trial.0))
    }

    fn check_trial(&self, trial: TrialId) -> Result<(), ConfigError> {
        if trial.0 >= self.trials {
            return Err(ConfigError::invalid(format!(
                "{trial} is outside the batch of {} trials",
                self.trials
            )));
        }
        Ok(())
    }

    pub(crate) fn plans(&self) -> impl Iterator<Item = TrialPlan> + '_ {
        (0..self.trials).map(TrialId).map(|trial| {
            let o = self.overrides.get(&trial);
            TrialPlan {
                trial,
                seed: self.seed_for(trial),
                ledger: o
                    .and_then(|o| o.ledger.clone())
                    .unwrap_or_else(|| Arc::clone(&self.ledger)),
                initial: o
                    .and_then(|o| o.initial.clone())
                    .unwrap_or_else(|| self.initial.clone()),
            }
        })
    }
}
