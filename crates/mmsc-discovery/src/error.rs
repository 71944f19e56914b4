//! Error types for the discovery registry

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during service discovery.
///
/// All of these are non-fatal to the process: a failed browse start or a
/// failed daemon shutdown is reported to the caller and logged, never
/// retried automatically.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// mDNS service daemon failed to initialize
    #[error("Failed to initialize mDNS daemon: {0}")]
    MdnsInitFailed(String),

    /// Failed to browse for services
    #[error("Failed to browse for service type '{service_type}': {reason}")]
    BrowseFailed { service_type: String, reason: String },

    /// Invalid discovery configuration
    #[error("Invalid discovery configuration: {0}")]
    InvalidConfig(#[from] mmsc_core::ConfigError),

    /// Internal error
    #[error("Internal discovery error: {0}")]
    Internal(String),
}
