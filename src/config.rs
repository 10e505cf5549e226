//! Batch files for the CLI.
//!
//! A batch file is a [`BatchSpec`] in TOML with an optional `[coordinator]`
//! table. Command-line flags (and their `CASHFLOW_*` environment variables)
//! take precedence over the file.
//!
//! ```toml
//! trials = 200
//! horizon = 36
//! seed = 42
//!
//! [coordinator]
//! workers = 4
//! timeout_ms = 2000
//!
//! [schema]
//! fields = ["checking", "savings"]
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use simulation::{BatchSpec, CoordinatorConfig};

/// Optional execution settings stored next to the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorSection {
    pub workers: Option<usize>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub sequential: bool,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub seed: Option<u64>,
    pub trials: Option<u64>,
    pub sequential: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchFile {
    #[serde(default)]
    pub coordinator: CoordinatorSection,
    #[serde(flatten)]
    pub batch: BatchSpec,
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read batch file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parse batch file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply command-line overrides and split into batch and coordinator
    /// settings.
    pub fn resolve(self, overrides: &Overrides) -> (BatchSpec, CoordinatorConfig) {
        let mut batch = self.batch;
        if let Some(seed) = overrides.seed {
            batch.seed = seed;
        }
        if let Some(trials) = overrides.trials {
            batch.trials = trials;
        }

        let mut config = CoordinatorConfig::default()
            .with_force_sequential(overrides.sequential || self.coordinator.sequential);
        if let Some(workers) = overrides.workers.or(self.coordinator.workers) {
            config = config.with_workers(workers);
        }
        if let Some(ms) = overrides.timeout_ms.or(self.coordinator.timeout_ms) {
            config = config.with_trial_timeout(Duration::from_millis(ms));
        }

        (batch, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
        trials = 10
        horizon = 12
        seed = 3

        [coordinator]
        workers = 2
        timeout_ms = 500

        [schema]
        fields = ["checking"]

        [[ledger]]
        kind = "recurring_credit"
        field = "checking"
        amount = { fixed = 100.0 }
        schedule = { periodic = { every = 1 } }
    "#;

    #[test]
    fn test_file_values_used_without_overrides() {
        let file = BatchFile::parse(FILE).unwrap();
        assert_eq!(file.coordinator.workers, Some(2));

        let (batch, config) = file.resolve(&Overrides::default());
        assert_eq!(batch.trials, 10);
        assert_eq!(batch.seed, 3);
        assert_eq!(batch.ledger.len(), 1);
        assert_eq!(config.workers, 2);
        assert_eq!(config.trial_timeout, Some(Duration::from_millis(500)));
        assert!(!config.force_sequential);
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let overrides = Overrides {
            workers: Some(8),
            timeout_ms: None,
            seed: Some(77),
            trials: Some(2),
            sequential: true,
        };
        let (batch, config) = BatchFile::parse(FILE).unwrap().resolve(&overrides);
        assert_eq!(batch.trials, 2);
        assert_eq!(batch.seed, 77);
        assert_eq!(config.workers, 8);
        assert_eq!(config.trial_timeout, Some(Duration::from_millis(500)));
        assert!(config.force_sequential);
    }

    #[test]
    fn test_missing_coordinator_section() {
        let raw = r#"
            trials = 1
            horizon = 1
            [schema]
            fields = ["a"]
        "#;
        let file = BatchFile::parse(raw).unwrap();
        assert_eq!(file.coordinator, CoordinatorSection::default());
        assert!(file.batch.ledger.is_empty());
    }

    #[test]
    fn test_household_demo_parses() {
        let file = BatchFile::parse(include_str!("../demos/household.toml")).unwrap();
        assert_eq!(file.coordinator.timeout_ms, Some(2000));

        let (batch, _) = file.resolve(&Overrides::default());
        assert_eq!(batch.trials, 500);
        assert_eq!(batch.ledger.len(), 8);
        assert_eq!(batch.overrides.len(), 1);
        assert!(batch.schema.build().is_ok());
        assert!(batch.ledger.iter().all(|spec| spec.name.is_some()));
    }

    #[test]
    fn test_bad_file_is_error() {
        assert!(BatchFile::parse("trials = \"many\"").is_err());
    }
}
