//! Error types for the MMS Companion core.
//!
//! Discovery and transport failures are reported by their own crates; this
//! module covers the configuration layer, which is the only fallible surface
//! the core itself owns.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using ConfigError as the error type.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors related to configuration loading and validation.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Failed to load configuration from a source
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Configuration format is invalid
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// A configuration value failed validation
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Convenience constructor for validation failures.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
