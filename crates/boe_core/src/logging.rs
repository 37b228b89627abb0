use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::BoeConfig;

/// Filter used when neither `RUST_LOG` nor the configured level parses.
const FALLBACK_FILTER: &str = "info";

/// Crates whose debug output goes to the log file even at the default level.
const OWN_CRATES: [&str; 3] = ["boe_core", "boe_ledger", "boe_deploy"];

/// Initializes logging from `config.log_level`, writing a daily-rotated file
/// under `~/.boe/logs` plus compact console output.
///
/// Returns a guard that must be kept alive for the duration of the process.
pub fn init_logging(config: &BoeConfig) -> Result<WorkerGuard> {
    init_logging_in(&BoeConfig::logs_dir()?, &config.log_level)
}

/// Same as [`init_logging`] with an explicit log directory and level.
pub fn init_logging_in(logs_dir: &Path, level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "boe");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(file_filter(level)),
        )
        .with(fmt::layer().with_target(false).compact().with_filter(env_filter(level)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}

/// `RUST_LOG` wins; otherwise the configured level, or [`FALLBACK_FILTER`]
/// when that does not parse.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// The console filter with this workspace's crates raised to `debug`.
fn file_filter(level: &str) -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return env_filter(level);
    }
    OWN_CRATES.iter().fold(env_filter(level), |filter, name| {
        match format!("{name}=debug").parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    })
}
