//! Log subscriber setup for the binary.
//!
//! Library code only talks to the `log` facade. The binary installs a
//! `tracing-subscriber` formatter, which also forwards `log` records.

use tracing_subscriber::EnvFilter;

/// Filter applied when neither `--log-level` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter: an explicit level wins over `RUST_LOG`.
pub fn build_filter(level: Option<&str>) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    match level {
        Some(level) => Ok(EnvFilter::try_new(level)
            .map_err(|e| format!("Invalid log level '{level}': {e}"))?),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the global subscriber, writing to stderr so stdout stays clean
/// for command output.
pub fn init_logging(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_filter(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| format!("Failed to install log subscriber: {e}"))?;
    Ok(())
}
