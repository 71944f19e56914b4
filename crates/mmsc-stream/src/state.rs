//! Connection state and receive-side metrics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Connection state of the stream client.
///
/// A closed connection collapses straight back to `Idle`; the close event
/// carries the terminal classification, so `Idle` is the only state
/// observable after any close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection exists
    Idle,
    /// A connection attempt is in flight
    Connecting,
    /// The connection is established and receiving
    Open,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "Idle"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
        }
    }
}

/// Metrics for the receive side of a connection.
///
/// The client never sends application messages, so only inbound traffic is
/// tracked.
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    /// Total frames received
    frames_received: Arc<AtomicU64>,
    /// Total bytes received
    bytes_received: Arc<AtomicU64>,
    /// Total transport errors observed
    errors: Arc<AtomicU64>,
    /// Connection established timestamp
    connected_at: Arc<parking_lot::RwLock<Option<SystemTime>>>,
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
            connected_at: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    /// Record one received frame of the given size
    pub fn record_frame(&self, bytes: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a transport error
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark connection as established
    pub fn mark_connected(&self) {
        *self.connected_at.write() = Some(SystemTime::now());
    }

    /// Mark connection as closed
    pub fn mark_disconnected(&self) {
        *self.connected_at.write() = None;
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn connected_at(&self) -> Option<SystemTime> {
        *self.connected_at.read()
    }

    /// Connection duration, if currently connected
    pub fn connection_duration(&self) -> Option<Duration> {
        self.connected_at().and_then(|t| t.elapsed().ok())
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received(),
            bytes_received: self.bytes_received(),
            errors: self.errors(),
            connected_at: self.connected_at(),
        }
    }
}

/// Snapshot of connection metrics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub errors: u64,
    pub connected_at: Option<SystemTime>,
}

/// Combined connection state, metrics, and last close reason
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    state: Arc<parking_lot::RwLock<ConnectionState>>,
    metrics: ConnectionMetrics,
    last_close: Arc<parking_lot::RwLock<Option<String>>>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(parking_lot::RwLock::new(ConnectionState::Idle)),
            metrics: ConnectionMetrics::new(),
            last_close: Arc::new(parking_lot::RwLock::new(None)),
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Set connection state
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &ConnectionMetrics {
        &self.metrics
    }

    /// Record why the last connection ended
    pub fn set_last_close(&self, reason: String) {
        *self.last_close.write() = Some(reason);
    }

    /// Why the last connection ended, if any has ended yet
    pub fn last_close(&self) -> Option<String> {
        self.last_close.read().clone()
    }

    /// Check if currently connected
    pub fn is_open(&self) -> bool {
        matches!(self.state(), ConnectionState::Open)
    }

    /// Check if a connection exists or is being established
    pub fn is_live(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Open
        )
    }
}
