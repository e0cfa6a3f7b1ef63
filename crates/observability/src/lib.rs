//! Tracing/logging setup shared by binaries and tests.

use serde::{Deserialize, Serialize};

/// Tracing configuration (filters, output format).
pub mod tracing;

/// Logging knobs resolved by the caller (usually from `PlacementConfig`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// JSON lines when true, human-readable output otherwise.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &LogConfig) {
    tracing::init(config);
}
