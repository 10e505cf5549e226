//! Diagnostic tracing for the CLI.
//!
//! Batch lifecycle, per-trial progress and failures are emitted as `tracing`
//! events by the engine crates. They go to stderr so stdout stays reserved
//! for the batch summary or JSON.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`, which surfaces trial failures only.
///
/// ```bash
/// RUST_LOG=simulation=debug cashflow-sim run demos/household.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
