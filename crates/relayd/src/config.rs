//! Daemon configuration.
//!
//! Values are layered, lowest precedence first:
//! 1. Built-in defaults ([`Config::default`])
//! 2. An optional TOML file ([`Config::load`])
//! 3. Environment variables ([`Config::apply_env`])
//! 4. Command-line flags (applied by the binary)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::server::{ConnectionSettings, DEFAULT_MAX_CONNECTIONS};

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "RELAY_CONFIG";

/// Environment variable overriding the listen address.
pub const BIND_ENV: &str = "RELAY_BIND";

/// Environment variable overriding the activity log path.
pub const ACTIVITY_LOG_ENV: &str = "RELAY_ACTIVITY_LOG";

/// Environment variable overriding the connection limit.
pub const MAX_CONNECTIONS_ENV: &str = "RELAY_MAX_CONNECTIONS";

/// Runtime configuration for the relay daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the TCP listener binds to.
    pub bind: SocketAddr,

    /// File that receives the activity log.
    pub activity_log: PathBuf,

    /// Whether the activity log is written at all.
    pub activity_log_enabled: bool,

    /// Connections served at once; further connections wait for a slot.
    pub max_connections: usize,

    /// Lines queued per member before new lines to it are dropped.
    pub outbound_buffer: usize,

    /// Seconds a single line write may take before the connection is dropped.
    pub write_timeout_secs: u64,

    /// Longest accepted input line, in bytes.
    pub max_line_bytes: usize,

    /// Default tracing level when `RUST_LOG` is unset.
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let settings = ConnectionSettings::default();
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 59001)),
            activity_log: default_activity_log_path(),
            activity_log_enabled: true,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            outbound_buffer: settings.outbound_buffer,
            write_timeout_secs: settings.write_timeout.as_secs(),
            max_line_bytes: settings.max_line_bytes,
            log_level: None,
        }
    }
}

impl Config {
    /// Reads and parses a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse_toml(&text, &path.display().to_string())
    }

    fn parse_toml(text: &str, source_name: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            source_name: source_name.to_string(),
            error: e.to_string(),
        })
    }

    /// Applies `RELAY_*` overrides read through `lookup`.
    ///
    /// `lookup` is usually `|key| std::env::var(key).ok()`; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV) {
            self.bind = parse_env(BIND_ENV, &bind)?;
        }
        if let Some(path) = lookup(ACTIVITY_LOG_ENV) {
            self.activity_log = PathBuf::from(path);
        }
        if let Some(max) = lookup(MAX_CONNECTIONS_ENV) {
            self.max_connections = parse_env(MAX_CONNECTIONS_ENV, &max)?;
        }
        Ok(())
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "max_connections",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "outbound_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "write_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_line_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_line_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Per-connection settings derived from this config.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            outbound_buffer: self.outbound_buffer,
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            max_line_bytes: self.max_line_bytes,
        }
    }
}

/// `<state_dir>/relay/activity.log`, or under `/tmp` when there is no
/// state directory.
pub fn default_activity_log_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("relay")
        .join("activity.log")
}

fn parse_env<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key,
        value: value.to_string(),
        error: e.to_string(),
    })
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config {source_name}: {error}")]
    Parse { source_name: String, error: String },

    #[error("Invalid value {value:?} for {key}: {error}")]
    Env {
        key: &'static str,
        value: String,
        error: String,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
