//! Runtime configuration for core bootstrap.
//!
//! # Responsibility
//! - Provide defaults for database, logging and write-timeout settings.
//! - Load overrides from `TASKBOARD_*` environment variables or JSON.
//!
//! # Invariants
//! - Missing keys fall back to defaults; unknown JSON keys are rejected.
//! - `busy_timeout_ms` is always positive.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub const ENV_DB_PATH: &str = "TASKBOARD_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "TASKBOARD_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TASKBOARD_LOG_DIR";
pub const ENV_BUSY_TIMEOUT_MS: &str = "TASKBOARD_BUSY_TIMEOUT_MS";
pub const ENV_WRITE_TIMEOUT_MS: &str = "TASKBOARD_WRITE_TIMEOUT_MS";

/// Configuration loading error.
#[derive(Debug)]
pub enum ConfigError {
    /// JSON document could not be parsed.
    Parse(serde_json::Error),
    /// One setting has an unusable value.
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for config key `{key}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Core settings shared by the CLI and embedding hosts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file path. `None` means in-memory.
    pub database_path: Option<PathBuf>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` disables file logs.
    pub log_dir: Option<PathBuf>,
    /// SQLite busy handler timeout for contended writes.
    pub busy_timeout_ms: u64,
    /// Per-request write deadline. `None` means no deadline.
    pub write_timeout_ms: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            write_timeout_ms: None,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON config document on top of defaults.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads overrides from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = non_blank(lookup(ENV_DB_PATH)) {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = level;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = non_blank(lookup(ENV_BUSY_TIMEOUT_MS)) {
            config.busy_timeout_ms = parse_millis(ENV_BUSY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = non_blank(lookup(ENV_WRITE_TIMEOUT_MS)) {
            config.write_timeout_ms = Some(parse_millis(ENV_WRITE_TIMEOUT_MS, &value)?);
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "busy_timeout_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_millis(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_BUSY_TIMEOUT_MS, ENV_DB_PATH, ENV_WRITE_TIMEOUT_MS};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn lookup_overrides_defaults() {
        let env = HashMap::from([
            (ENV_DB_PATH, "/tmp/board.db"),
            (ENV_WRITE_TIMEOUT_MS, "250"),
        ]);
        let config =
            CoreConfig::from_lookup(|key| env.get(key).map(|value| value.to_string())).unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/board.db")));
        assert_eq!(config.write_timeout_ms, Some(250));
        assert_eq!(config.busy_timeout_ms, 5_000);
    }

    #[test]
    fn lookup_rejects_non_numeric_timeout() {
        let err = CoreConfig::from_lookup(|key| {
            (key == ENV_BUSY_TIMEOUT_MS).then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == ENV_BUSY_TIMEOUT_MS
        ));
    }

    #[test]
    fn json_document_fills_missing_keys_and_rejects_unknown() {
        let config = CoreConfig::from_json_str(r#"{"log_level":"warn"}"#).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.database_path, None);

        let err = CoreConfig::from_json_str(r#"{"colour":"blue"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn zero_busy_timeout_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"busy_timeout_ms":0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
