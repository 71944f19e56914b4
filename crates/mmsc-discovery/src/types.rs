//! Events emitted by the discovery registry

use chrono::{DateTime, Utc};
use mmsc_core::Peer;
use serde::{Deserialize, Serialize};

/// Event emitted to subscribers when the registry observes a change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// What happened
    pub kind: RegistryEventKind,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl RegistryEvent {
    pub fn new(kind: RegistryEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Kinds of registry events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryEventKind {
    /// A new peer was resolved and appended to the list.
    ///
    /// `peers` is an ordered snapshot of the full list, suitable for
    /// re-rendering a selection surface without reading the registry.
    PeerDiscovered { peer: Peer, peers: Vec<Peer> },

    /// The pursued instance could not be resolved in this session.
    ///
    /// Reporting only; the session keeps running and a fresh
    /// `start_discovery()` is required to retry the instance.
    ResolveFailed { instance: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_event_carries_snapshot() {
        let peer = Peer::new("Player", Ipv4Addr::new(192, 168, 1, 10), 8080);
        let event = RegistryEvent::new(RegistryEventKind::PeerDiscovered {
            peer: peer.clone(),
            peers: vec![peer.clone()],
        });

        match event.kind {
            RegistryEventKind::PeerDiscovered { peers, .. } => {
                assert_eq!(peers, vec![peer]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
