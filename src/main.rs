//! Cash-flow simulation CLI.
//!
//! Loads a TOML batch file, runs every trial through the distribution
//! coordinator and prints a summary (or the full batch result as JSON) to
//! stdout. Diagnostics go to stderr via `tracing`.
//!
//! Exit codes:
//! - `0`: every trial completed
//! - `1`: the batch ran but at least one trial failed or was cancelled
//! - `2`: the batch file or its configuration is invalid

mod config;
mod logging;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use simulation::{BatchResult, BatchSpec, DistributionCoordinator, MetricsHook, MetricsSnapshot};

use crate::config::{BatchFile, Overrides};

/// Transactional cash-flow simulation engine
#[derive(Parser, Debug)]
#[command(name = "cashflow-sim")]
#[command(about = "Run batches of cash-flow simulation trials")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a batch file and report the outcome.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the TOML batch file
    file: PathBuf,

    /// Maximum concurrently running trials
    #[arg(long, env = "CASHFLOW_WORKERS")]
    workers: Option<usize>,

    /// Per-trial time budget in milliseconds
    #[arg(long, env = "CASHFLOW_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Base seed (trial i uses seed + i)
    #[arg(long, env = "CASHFLOW_SEED")]
    seed: Option<u64>,

    /// Number of trials, replacing the file's value
    #[arg(long, env = "CASHFLOW_TRIALS")]
    trials: Option<u64>,

    /// Run trials on the calling thread
    #[arg(long, env = "CASHFLOW_SEQUENTIAL")]
    sequential: bool,

    /// Print the full batch result as JSON instead of a summary
    #[arg(long, env = "CASHFLOW_JSON")]
    json: bool,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            workers: self.workers,
            timeout_ms: self.timeout_ms,
            seed: self.seed,
            trials: self.trials,
            sequential: self.sequential,
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => match cmd_run(&args) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::from(1),
            Err(err) => {
                eprintln!("error: {err:#}");
                ExitCode::from(2)
            }
        },
    }
}

/// Returns whether every trial completed.
fn cmd_run(args: &RunArgs) -> Result<bool> {
    let file = BatchFile::load(&args.file)?;
    let (spec, config) = file.resolve(&args.overrides());
    tracing::debug!(
        file = %args.file.display(),
        trials = spec.trials,
        horizon = spec.horizon,
        workers = config.workers,
        sequential = config.force_sequential,
        "loaded batch"
    );

    let metrics = Arc::new(MetricsHook::new());
    let mut coordinator = DistributionCoordinator::new(config);
    coordinator.add_hook(metrics.clone());

    let result = coordinator
        .execute(&spec)
        .with_context(|| format!("invalid batch {}", args.file.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &result)?;
        writeln!(out)?;
    } else {
        print_summary(&mut out, &spec, &result, &metrics.snapshot())?;
    }
    out.flush()?;

    Ok(result.is_success())
}

fn print_summary(
    out: &mut impl Write,
    spec: &BatchSpec,
    result: &BatchResult,
    metrics: &MetricsSnapshot,
) -> Result<()> {
    writeln!(
        out,
        "batch: {} trials x {} steps (seed {})",
        spec.trials, spec.horizon, spec.seed
    )?;
    writeln!(
        out,
        "completed {}, failed {} ({} timed out), cancelled {}",
        metrics.completed, metrics.failed, metrics.timed_out, metrics.cancelled
    )?;
    writeln!(
        out,
        "trial time: avg {:?}, peak {:?}",
        metrics.avg_trial_time, metrics.peak_trial_time
    )?;

    if metrics.completed > 0 {
        writeln!(out, "mean final value over completed trials:")?;
        let width = spec.schema.fields.iter().map(String::len).max().unwrap_or(0);
        for field in &spec.schema.fields {
            if let Some(mean) = result.mean_final(field)? {
                writeln!(out, "  {field:<width$}  {mean:>16.4}")?;
            }
        }
    }

    if let Some(manifest) = result.failure_manifest() {
        writeln!(out, "{manifest}:")?;
        for err in manifest.failures.values() {
            writeln!(out, "  {err}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::parse_from([
            "cashflow-sim",
            "run",
            "batch.toml",
            "--workers",
            "3",
            "--timeout-ms",
            "250",
            "--sequential",
        ]);
        let Command::Run(args) = cli.command;
        assert_eq!(args.file, PathBuf::from("batch.toml"));
        let overrides = args.overrides();
        assert_eq!(overrides.workers, Some(3));
        assert_eq!(overrides.timeout_ms, Some(250));
        assert!(overrides.sequential);
        assert!(!args.json);
    }

    #[test]
    fn test_summary_lists_failures() {
        let raw = r#"
            trials = 2
            horizon = 2
            [schema]
            fields = ["checking"]
            [[ledger]]
            kind = "recurring_credit"
            field = "checking"
            amount = { fixed = 10.0 }
            schedule = { periodic = { every = 1 } }
            [[overrides]]
            trial = 1
            ledger = [{ kind = "recurring_debit", field = "savings", amount = { fixed = 1.0 }, schedule = { once = { at = 0 } } }]
        "#;
        let (spec, config) = BatchFile::parse(raw)
            .unwrap()
            .resolve(&Overrides {
                sequential: true,
                ..Overrides::default()
            });
        let metrics = Arc::new(MetricsHook::new());
        let mut coordinator = DistributionCoordinator::new(config);
        coordinator.add_hook(metrics.clone());
        let result = coordinator.execute(&spec).unwrap();

        let mut buf = Vec::new();
        print_summary(&mut buf, &spec, &result, &metrics.snapshot()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("completed 1, failed 1"));
        assert!(text.contains("1 of 2 trials failed"));
        assert!(text.contains("Trial#1 failed with schema mismatch"));
        assert!(text.contains("20.0000"));
    }
}
