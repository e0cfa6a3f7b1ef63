//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

use crate::LogConfig;

fn filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Logs go to stderr; stdout is left to command output. Safe to call multiple
/// times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.pretty().try_init()
    };
    if installed.is_ok() {
        ::tracing::debug!(filter = %config.filter, json = config.json, "logging initialised");
    }
}
