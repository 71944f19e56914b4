//! Configuration management for the MMS Companion client.
//!
//! This module provides a configuration system that supports:
//! - Loading from YAML files
//! - Environment variable overrides
//! - Validation of all settings
//!
//! Every setting has a default, so the client runs with no configuration
//! file at all.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use mmsc_core::config::AppConfig;
///
/// let config = AppConfig::from_file("config/config.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Stream client settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::InvalidFormat {
            reason: e.to_string(),
        })
    }

    /// Loads configuration using the `config` crate, which supports
    /// multiple sources and environment variable overrides (MMSC_*).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            // Override with environment variables (MMSC__discovery__...)
            .add_source(
                config::Environment::with_prefix("MMSC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| ConfigError::InvalidFormat {
            reason: e.to_string(),
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any section fails validation.
    pub fn validate(&self) -> Result<()> {
        self.discovery.validate()?;
        self.stream.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Configuration for the mDNS discovery registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Service type to browse for
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// Bound on a single address resolution (seconds)
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,

    /// Capacity of the registry event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_type: default_service_type(),
            resolve_timeout_secs: default_resolve_timeout(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl DiscoveryConfig {
    /// Returns the resolution bound as a Duration.
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Validates the discovery settings.
    pub fn validate(&self) -> Result<()> {
        if !self.service_type.starts_with('_') || !self.service_type.ends_with(".local.") {
            return Err(ConfigError::invalid_value(
                "discovery.service_type",
                "must be a DNS-SD type such as '_mms._tcp.local.'",
            ));
        }

        if self.resolve_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "discovery.resolve_timeout_secs",
                "cannot be 0",
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "discovery.event_capacity",
                "cannot be 0",
            ));
        }

        Ok(())
    }
}

/// Configuration for the stream client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Bound on connection establishment (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum accepted inbound message size (bytes)
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Capacity of the stream event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            max_message_bytes: default_max_message_bytes(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl StreamConfig {
    /// Returns the connect bound as a Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validates the stream settings.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "stream.connect_timeout_secs",
                "cannot be 0",
            ));
        }

        if self.max_message_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "stream.max_message_bytes",
                "cannot be 0",
            ));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "stream.event_capacity",
                "cannot be 0",
            ));
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter (overridable via RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Validates the logging settings.
    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "cannot be empty"));
        }
        Ok(())
    }
}

fn default_service_type() -> String {
    "_mms._tcp.local.".to_string()
}

fn default_resolve_timeout() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_message_bytes() -> usize {
    1024 * 1024
}

fn default_event_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.discovery.service_type, "_mms._tcp.local.");
        assert_eq!(config.discovery.resolve_timeout(), Duration::from_secs(5));
        assert_eq!(config.stream.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
discovery:
  resolve_timeout_secs: 2
logging:
  level: "debug"
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.discovery.resolve_timeout_secs, 2);
        assert_eq!(config.discovery.service_type, "_mms._tcp.local.");
        assert_eq!(config.stream.connect_timeout_secs, 10);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let result = AppConfig::from_yaml("discovery: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::InvalidFormat { .. })));
    }

    #[test]
    fn test_service_type_validation() {
        let config = DiscoveryConfig {
            service_type: "mms".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let discovery = DiscoveryConfig {
            resolve_timeout_secs: 0,
            ..Default::default()
        };
        assert!(discovery.validate().is_err());

        let stream = StreamConfig {
            connect_timeout_secs: 0,
            ..Default::default()
        };
        assert!(stream.validate().is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = AppConfig::from_file("/nonexistent/config.yaml").unwrap_err();
        match err {
            ConfigError::LoadFailed { path, .. } => {
                assert!(path.contains("nonexistent"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
