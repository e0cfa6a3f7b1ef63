//! Process configuration.
//!
//! Every knob has a default; environment variables override them:
//!
//! | variable                      | field                          |
//! |-------------------------------|--------------------------------|
//! | `SHIPIT_MAX_CAPACITY`         | `placement.max_capacity`       |
//! | `SHIPIT_MAX_TABLE_CELLS`      | `placement.max_table_cells`    |
//! | `SHIPIT_MAX_CONFLICT_RETRIES` | `placement.max_conflict_retries` |
//! | `SHIPIT_LOG`                  | `log.filter`                   |
//! | `SHIPIT_LOG_JSON`             | `log.json`                     |

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shipit_observability::LogConfig;

/// Limits applied by the placement coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Largest carrier capacity the solver will accept.
    pub max_capacity: u32,
    /// Upper bound on `(units + 1) * (capacity + 1)` DP cells.
    pub max_table_cells: usize,
    /// How many times a placement is retried after a commit conflict.
    pub max_conflict_retries: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000_000,
            max_table_cells: 50_000_000,
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub placement: PlacementConfig,
    pub log: LogConfig,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl AppConfig {
    /// Defaults overridden by `SHIPIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, "SHIPIT_MAX_CAPACITY")? {
            config.placement.max_capacity = v;
        }
        if let Some(v) = parse(&lookup, "SHIPIT_MAX_TABLE_CELLS")? {
            config.placement.max_table_cells = v;
        }
        if let Some(v) = parse(&lookup, "SHIPIT_MAX_CONFLICT_RETRIES")? {
            config.placement.max_conflict_retries = v;
        }
        if let Some(filter) = lookup("SHIPIT_LOG").filter(|f| !f.trim().is_empty()) {
            config.log.filter = filter;
        }
        if let Some(v) = parse(&lookup, "SHIPIT_LOG_JSON")? {
            config.log.json = v;
        }

        if config.placement.max_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "SHIPIT_MAX_CAPACITY",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(config)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.placement.max_conflict_retries, 3);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SHIPIT_MAX_CAPACITY", "500"),
            ("SHIPIT_MAX_TABLE_CELLS", " 1000 "),
            ("SHIPIT_MAX_CONFLICT_RETRIES", "0"),
            ("SHIPIT_LOG", "shipit=debug"),
            ("SHIPIT_LOG_JSON", "false"),
        ]))
        .unwrap();

        assert_eq!(config.placement.max_capacity, 500);
        assert_eq!(config.placement.max_table_cells, 1000);
        assert_eq!(config.placement.max_conflict_retries, 0);
        assert_eq!(config.log.filter, "shipit=debug");
        assert!(!config.log.json);
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[("SHIPIT_MAX_CAPACITY", "lots")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: "SHIPIT_MAX_CAPACITY", .. }
        ));

        let err = AppConfig::from_lookup(lookup(&[("SHIPIT_MAX_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
