//! # mmsc-stream
//!
//! The stream client for the MMS Companion: owns at most one WebSocket
//! connection to a selected peer and translates inbound frames into typed
//! events.
//!
//! ## Behavior
//!
//! - `connect` is a no-op while a connection is live; callers disconnect
//!   first to switch peers
//! - every close path (local request, remote close, transport error)
//!   returns the client to idle and emits exactly one close event
//! - there is no automatic reconnection; every reconnect is a fresh,
//!   externally triggered `connect`
//! - inbound JSON records carrying numeric `lat`/`lng` fields become
//!   location events; anything else is logged and dropped
//!
//! ## Example
//!
//! ```rust,no_run
//! use mmsc_core::{config::StreamConfig, Peer};
//! use mmsc_stream::{StreamClient, StreamEventKind};
//! use std::net::Ipv4Addr;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = StreamClient::new(StreamConfig::default());
//!     client.connect(Peer::new("Player", Ipv4Addr::new(192, 168, 1, 23), 8080));
//!
//!     while let Ok(event) = client.event_receiver().recv().await {
//!         if let StreamEventKind::Location(update) = event.kind {
//!             println!("{update}");
//!         }
//!     }
//! }
//! ```

pub mod client;
pub mod state;
pub mod websocket;

// Re-export commonly used types
pub use client::{classify_payload, CloseReason, Payload, StreamEvent, StreamEventKind};
pub use state::{ConnectionMetrics, ConnectionState, ConnectionStatus, MetricsSnapshot};
pub use websocket::StreamClient;
