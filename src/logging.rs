use crate::error::{HarvestError, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the logging system with the specified log level
///
/// Valid log levels are: error, warn, info, debug, trace. `RUST_LOG`, when
/// set, takes precedence. Log lines go to stderr so they interleave cleanly
/// with the progress bar.
pub fn init(log_level: &str) -> Result<()> {
    let level = parse_log_level(log_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gem_harvester={level},{level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| HarvestError::Config(format!("Failed to initialize logging: {e}")))
}

/// Parses a log level string into a tracing Level
///
/// Returns the corresponding Level, defaulting to Info for invalid strings
pub fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}
