//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe the knobs the persistence core honors (store deadline,
//!   pagination defaults, logging target).
//! - Parse an already-materialized JSON document into typed settings.
//!
//! # Invariants
//! - Every section and field has a default, so `{}` is a valid config.
//! - Pagination defaults are always `>= 1` after `normalized()`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Top-level configuration consumed by `cms_core`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub database: DatabaseConfig,
    pub pagination: PaginationConfig,
    pub logging: LoggingConfig,
}

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Upper bound for waiting on store locks before a call fails.
    pub busy_timeout_ms: u64,
    /// Enables WAL journaling for file databases.
    pub wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            wal: true,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Defaults applied when callers send out-of-range paging values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page: u32,
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_limit: 10,
            max_limit: 100,
        }
    }
}

impl PaginationConfig {
    /// Returns a copy with every value forced into its valid range.
    pub fn normalized(self) -> Self {
        let default_page = self.default_page.max(1);
        let default_limit = self.default_limit.max(1);
        let max_limit = self.max_limit.max(default_limit);
        Self {
            default_page,
            default_limit,
            max_limit,
        }
    }
}

/// Logging target settings. `dir = None` leaves logging uninitialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Error returned when a configuration document cannot be parsed.
#[derive(Debug)]
pub struct ConfigError(serde_json::Error);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid core config: {}", self.0)
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing sections fall back to defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: CoreConfig = serde_json::from_str(raw).map_err(ConfigError)?;
        config.pagination = config.pagination.normalized();
        Ok(config)
    }
}
