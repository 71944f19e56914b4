//! Stream events and inbound payload dispatch

use chrono::{DateTime, Utc};
use mmsc_core::{LocationUpdate, Peer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Event surfaced to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// What happened
    pub kind: StreamEventKind,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl StreamEvent {
    pub fn new(kind: StreamEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// Kinds of stream events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    /// The transport reported the connection established
    Opened { peer: Peer },

    /// The connection ended; fired exactly once per connection attempt.
    ///
    /// After this event the client is idle and a new peer must be selected;
    /// no reconnection happens on its own.
    Closed { peer: Peer, reason: CloseReason },

    /// One decoded coordinate message
    Location(LocationUpdate),
}

/// Why a connection ended.
///
/// The classification is for reporting only; every variant leaves the client
/// in the same idle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Closed on local request
    LocalRequest,

    /// The remote sent a protocol-level close frame
    Remote { code: u16, reason: String },

    /// The stream ended without a close frame
    Ended,

    /// A transport error tore the connection down
    Transport { reason: String },

    /// The connection attempt itself failed
    ConnectFailed { reason: String },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::LocalRequest => write!(f, "closed on local request"),
            CloseReason::Remote { code, reason } if reason.is_empty() => {
                write!(f, "closed by remote (code {code})")
            }
            CloseReason::Remote { code, reason } => {
                write!(f, "closed by remote (code {code}): {reason}")
            }
            CloseReason::Ended => write!(f, "stream ended"),
            CloseReason::Transport { reason } => write!(f, "transport error: {reason}"),
            CloseReason::ConnectFailed { reason } => write!(f, "connect failed: {reason}"),
        }
    }
}

/// Outcome of dispatching one inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A record with numeric `lat` and `lng` fields
    Location(LocationUpdate),

    /// A well-formed record of some other shape; tolerated and dropped
    Unrecognized(Value),

    /// Not a structured record at all
    Malformed { reason: String },
}

/// Classifies one inbound text frame.
///
/// Records that fail to parse and records without both numeric `lat` and
/// `lng` fields are not errors; they are dropped after logging by the
/// caller.
pub fn classify_payload(text: &str) -> Payload {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Payload::Malformed {
                reason: e.to_string(),
            }
        }
    };

    let lat = value.get("lat").and_then(Value::as_f64);
    let lng = value.get("lng").and_then(Value::as_f64);

    match (lat, lng) {
        (Some(lat), Some(lng)) => Payload::Location(LocationUpdate::new(lat, lng)),
        _ => Payload::Unrecognized(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_record_is_dispatched() {
        let payload = classify_payload(r#"{"lat": 52.5, "lng": 13.4}"#);
        assert_eq!(payload, Payload::Location(LocationUpdate::new(52.5, 13.4)));
    }

    #[test]
    fn test_integer_coordinates_are_numeric() {
        let payload = classify_payload(r#"{"lat": 52, "lng": 13}"#);
        assert_eq!(payload, Payload::Location(LocationUpdate::new(52.0, 13.0)));
    }

    #[test]
    fn test_extra_fields_are_tolerated() {
        let payload = classify_payload(r#"{"lat": 1.0, "lng": 2.0, "alt": 30}"#);
        assert_eq!(payload, Payload::Location(LocationUpdate::new(1.0, 2.0)));
    }

    #[test]
    fn test_unmatched_shape_is_not_an_error() {
        assert!(matches!(
            classify_payload(r#"{"foo": 1}"#),
            Payload::Unrecognized(_)
        ));

        // Wrong-typed fields count as missing
        assert!(matches!(
            classify_payload(r#"{"lat": "52.5", "lng": 13.4}"#),
            Payload::Unrecognized(_)
        ));

        // Missing one of the pair
        assert!(matches!(
            classify_payload(r#"{"lat": 52.5}"#),
            Payload::Unrecognized(_)
        ));

        // Not an object at all
        assert!(matches!(
            classify_payload("[1, 2]"),
            Payload::Unrecognized(_)
        ));
    }

    #[test]
    fn test_malformed_payload() {
        assert!(matches!(
            classify_payload("not json"),
            Payload::Malformed { .. }
        ));
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(
            CloseReason::LocalRequest.to_string(),
            "closed on local request"
        );
        assert_eq!(
            CloseReason::Remote {
                code: 1000,
                reason: String::new()
            }
            .to_string(),
            "closed by remote (code 1000)"
        );
        assert_eq!(
            CloseReason::ConnectFailed {
                reason: "refused".to_string()
            }
            .to_string(),
            "connect failed: refused"
        );
    }
}
