//! mDNS discovery of media-meta-stream services on the local network
//!
//! This crate finds instances of the `_mms._tcp` service type advertised on
//! the local segment, resolves them to IPv4 endpoints, and publishes them as
//! an ordered, observable peer list:
//!
//! 1. A browse session runs in the background on the mDNS daemon
//! 2. Only the first announced instance per session is pursued to resolution,
//!    under a bounded timeout
//! 3. Resolved peers are deduplicated and appended to the peer list
//! 4. Subscribers are notified through an event channel when the list changes
//!
//! Discovery is consumer-only: this crate never announces a service of its
//! own. Peers are never removed from the list once published; restarting the
//! browse with [`PeerRegistry::start_discovery`] supersedes the previous
//! session without clearing the list.
//!
//! # Example
//!
//! ```no_run
//! use mmsc_core::config::DiscoveryConfig;
//! use mmsc_discovery::PeerRegistry;
//!
//! #[tokio::main]
//! async fn main() -> mmsc_discovery::Result<()> {
//!     let registry = PeerRegistry::new(DiscoveryConfig::default())?;
//!     registry.start_discovery()?;
//!
//!     while let Ok(event) = registry.event_receiver().recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod registry;
pub mod types;

pub use error::{DiscoveryError, Result};
pub use registry::PeerRegistry;
pub use types::{RegistryEvent, RegistryEventKind};
