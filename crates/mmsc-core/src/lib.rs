//! # mmsc-core
//!
//! Core types, error handling, and configuration for the MMS Companion client.
//!
//! This crate provides the foundational building blocks shared by the
//! discovery and stream crates:
//!
//! - **Types**: `Peer` (a resolved, addressable service instance) and
//!   `LocationUpdate` (one decoded coordinate message).
//! - **Errors**: configuration error types using `thiserror`.
//! - **Configuration**: a configuration system supporting YAML files,
//!   environment variable overrides, and validation.
//!
//! ## Example
//!
//! ```
//! use mmsc_core::types::Peer;
//! use std::net::Ipv4Addr;
//!
//! let peer = Peer::new("Living Room", Ipv4Addr::new(192, 168, 1, 23), 8080);
//! assert_eq!(peer.ws_url(), "ws://192.168.1.23:8080");
//! ```

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{AppConfig, DiscoveryConfig, LoggingConfig, StreamConfig};
pub use error::{ConfigError, Result};
pub use types::{LocationUpdate, Peer};
