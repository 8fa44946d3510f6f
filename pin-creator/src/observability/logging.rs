//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
#[must_use]
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber.
///
/// Output goes to stderr: compact lines without timestamps by default, JSON
/// lines when `json` is set. Safe to call more than once; later calls are
/// no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = env_filter(config);

    let _ = if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .without_time()
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };
}
