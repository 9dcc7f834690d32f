//! Settings handling for sqlbatis.
//!
//! This module provides the typed global settings held by a configuration and the
//! connection pool options used when a pool is built from a data source.

use crate::error::{BatisError, BatisResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LOCAL_CACHE_SIZE: usize = 256;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MAX_CONNECTIONS_SQLITE: u32 = 1;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Setting keys accepted by [`Settings::apply`].
pub mod keys {
    pub const CACHE_ENABLED: &str = "cacheEnabled";
    pub const LAZY_LOADING_ENABLED: &str = "lazyLoadingEnabled";
    pub const DEFAULT_STATEMENT_TIMEOUT: &str = "defaultStatementTimeout";
    pub const LOCAL_CACHE_SIZE: &str = "localCacheSize";

    pub const ALL: &[&str] = &[
        CACHE_ENABLED,
        LAZY_LOADING_ENABLED,
        DEFAULT_STATEMENT_TIMEOUT,
        LOCAL_CACHE_SIZE,
    ];
}

/// Tri-state switch for boolean settings that may never have been set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl Toggle {
    /// Only an explicit `Enabled` turns the feature on.
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn is_set(self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl From<bool> for Toggle {
    fn from(value: bool) -> Self {
        if value { Self::Enabled } else { Self::Disabled }
    }
}

/// Parses exactly `"true"` or `"false"`. Near misses such as `"TRUE"` or `"1"`
/// are rejected rather than silently read as disabled.
impl FromStr for Toggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "true" => Ok(Self::Enabled),
            "false" => Ok(Self::Disabled),
            other => Err(format!(
                "expected exactly \"true\" or \"false\", got \"{}\"",
                other
            )),
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Enabled => write!(f, "true"),
            Self::Disabled => write!(f, "false"),
        }
    }
}

/// Global settings of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Wrap executors in the caching decorator (only when `Enabled`)
    #[serde(default)]
    pub cache_enabled: Toggle,
    /// Stored for mapper proxies; the executor pipeline does not read it
    #[serde(default)]
    pub lazy_loading_enabled: Toggle,
    /// Per-statement timeout in seconds (default: none)
    #[serde(default)]
    pub default_statement_timeout_secs: Option<u64>,
    /// Capacity of the caching executor's result cache (default: 256)
    #[serde(default)]
    pub local_cache_size: Option<usize>,
}

impl Settings {
    /// Get the statement timeout as a Duration, if one is configured.
    pub fn default_statement_timeout(&self) -> Option<Duration> {
        self.default_statement_timeout_secs.map(Duration::from_secs)
    }

    /// Get local_cache_size with default value.
    pub fn local_cache_size_or_default(&self) -> usize {
        self.local_cache_size.unwrap_or(DEFAULT_LOCAL_CACHE_SIZE)
    }

    /// Apply a setting given as a key/value string pair.
    ///
    /// The setting is left untouched when the value does not parse.
    pub fn apply(&mut self, key: &str, value: &str) -> BatisResult<()> {
        match key {
            keys::CACHE_ENABLED => self.cache_enabled = parse_toggle(key, value)?,
            keys::LAZY_LOADING_ENABLED => self.lazy_loading_enabled = parse_toggle(key, value)?,
            keys::DEFAULT_STATEMENT_TIMEOUT => {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    invalid_setting(key, value, "expected a whole number of seconds")
                })?;
                if secs == 0 {
                    return Err(invalid_setting(key, value, "timeout must be greater than 0"));
                }
                self.default_statement_timeout_secs = Some(secs);
            }
            keys::LOCAL_CACHE_SIZE => {
                let size: usize = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid_setting(key, value, "expected a positive integer"))?;
                if size == 0 {
                    return Err(invalid_setting(key, value, "cache size must be greater than 0"));
                }
                self.local_cache_size = Some(size);
            }
            other => {
                return Err(BatisError::setup_usage(
                    format!("Unknown setting '{}'", other),
                    format!("Known settings: {}", keys::ALL.join(", ")),
                ));
            }
        }
        Ok(())
    }
}

fn parse_toggle(key: &str, value: &str) -> BatisResult<Toggle> {
    value
        .parse::<Toggle>()
        .map_err(|reason| invalid_setting(key, value, &reason))
}

fn invalid_setting(key: &str, value: &str, reason: &str) -> BatisError {
    BatisError::setup_usage(
        format!("Invalid value '{}' for setting '{}': {}", value, key, reason),
        "Fix the setting value before freezing the configuration",
    )
}

/// Connection pool configuration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Maximum connections in pool (default: 10 for MySQL/PostgreSQL, 1 for SQLite)
    pub max_connections: Option<u32>,
    /// Minimum connections in pool (default: 1)
    pub min_connections: Option<u32>,
    /// Idle timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Whether to test connections before use (default: true)
    pub test_before_acquire: Option<bool>,
}

impl PoolOptions {
    /// Get max_connections with default value based on database type.
    pub fn max_connections_or_default(&self, is_sqlite: bool) -> u32 {
        self.max_connections.unwrap_or(if is_sqlite {
            DEFAULT_MAX_CONNECTIONS_SQLITE
        } else {
            DEFAULT_MAX_CONNECTIONS
        })
    }

    /// Get min_connections with default value.
    pub fn min_connections_or_default(&self) -> u32 {
        self.min_connections.unwrap_or(DEFAULT_MIN_CONNECTIONS)
    }

    /// Get idle_timeout with default value.
    pub fn idle_timeout_or_default(&self) -> u64 {
        self.idle_timeout_secs.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    }

    /// Get acquire_timeout with default value.
    pub fn acquire_timeout_or_default(&self) -> u64 {
        self.acquire_timeout_secs
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS)
    }

    /// Get test_before_acquire with default value.
    pub fn test_before_acquire_or_default(&self) -> bool {
        self.test_before_acquire.unwrap_or(true)
    }

    /// Validate pool options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max) = self.max_connections {
            if max == 0 {
                return Err("max_connections must be greater than 0".to_string());
            }
        }
        if let Some(min) = self.min_connections {
            if min == 0 {
                return Err("min_connections must be greater than 0".to_string());
            }
            if let Some(max) = self.max_connections {
                if min > max {
                    return Err(format!(
                        "min_connections ({}) cannot exceed max_connections ({})",
                        min, max
                    ));
                }
            }
        }
        Ok(())
    }
}
