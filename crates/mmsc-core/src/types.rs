//! Core types for the MMS Companion client.
//!
//! This module defines the two values that cross component boundaries: the
//! `Peer` produced by discovery and consumed by the stream client, and the
//! `LocationUpdate` decoded from an inbound stream message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// One resolved, addressable service instance eligible for connection.
///
/// A `Peer` is created by the discovery registry when a service resolution
/// yields a usable IPv4 address, and is immutable thereafter. Identity is the
/// full `(name, address, port)` tuple; two peers are the same entry only when
/// all three fields match.
///
/// The stream client always receives a `Peer` by value; nothing holds a
/// reference back into the registry's list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Advertised instance name
    pub name: String,

    /// Resolved IPv4 address
    pub address: Ipv4Addr,

    /// Advertised service port
    pub port: u16,
}

impl Peer {
    /// Creates a new peer from a completed resolution.
    pub fn new(name: impl Into<String>, address: Ipv4Addr, port: u16) -> Self {
        Self {
            name: name.into(),
            address,
            port,
        }
    }

    /// Returns the socket endpoint (`address:port`).
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Returns the stream endpoint URI for this peer.
    ///
    /// The scheme is fixed; the stream is unauthenticated and unencrypted.
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.address, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.endpoint())
    }
}

/// One decoded coordinate message, in decimal degrees.
///
/// Transient: handed to the presentation layer as it arrives and not retained
/// by the core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Latitude in decimal degrees
    pub latitude: f64,

    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl LocationUpdate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for LocationUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_identity_is_full_tuple() {
        let a = Peer::new("Player", Ipv4Addr::new(192, 168, 1, 10), 8080);
        let b = Peer::new("Player", Ipv4Addr::new(192, 168, 1, 10), 8080);
        assert_eq!(a, b);

        // Any differing field makes a distinct peer
        assert_ne!(a, Peer::new("Other", Ipv4Addr::new(192, 168, 1, 10), 8080));
        assert_ne!(a, Peer::new("Player", Ipv4Addr::new(192, 168, 1, 11), 8080));
        assert_ne!(a, Peer::new("Player", Ipv4Addr::new(192, 168, 1, 10), 8081));
    }

    #[test]
    fn test_peer_ws_url() {
        let peer = Peer::new("Player", Ipv4Addr::new(10, 0, 0, 7), 9001);
        assert_eq!(peer.ws_url(), "ws://10.0.0.7:9001");
        assert_eq!(peer.endpoint(), "10.0.0.7:9001");
    }

    #[test]
    fn test_peer_display() {
        let peer = Peer::new("Living Room", Ipv4Addr::new(192, 168, 1, 23), 8080);
        assert_eq!(peer.to_string(), "Living Room (192.168.1.23:8080)");
    }

    #[test]
    fn test_location_update_display() {
        let update = LocationUpdate::new(52.5, 13.4);
        assert_eq!(update.to_string(), "(52.500000, 13.400000)");
    }
}
