//! Attack event types shared by the session handlers and the event store.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoy protocol a credential attempt arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "SSH")]
    Ssh,
    #[serde(rename = "FTP")]
    Ftp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Ssh => "SSH",
            Protocol::Ftp => "FTP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one captured credential submission.
///
/// Created at the moment both identity and secret are known, persisted and
/// aggregated immediately, never mutated afterwards. Partial exchanges (a
/// peer that disconnects before supplying the secret) never produce one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackEvent {
    pub timestamp: DateTime<Utc>,
    pub protocol: Protocol,
    pub source_ip: IpAddr,
    pub source_port: u16,
    /// Submitted identity, untrusted and unsanitized.
    pub username: String,
    /// Submitted secret, untrusted and unsanitized.
    pub password: String,
    /// Always false — the decoy never grants access. Retained so the log
    /// schema survives a future decoy that simulates a successful login.
    pub success: bool,
    /// Free-text classification tag, e.g. "Brute-force" or "Incursion".
    pub additional_info: String,
}

impl AttackEvent {
    pub fn new(
        protocol: Protocol,
        peer: SocketAddr,
        username: impl Into<String>,
        password: impl Into<String>,
        additional_info: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            protocol,
            source_ip: peer.ip(),
            source_port: peer.port(),
            username: username.into(),
            password: password.into(),
            success: false,
            additional_info: additional_info.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "203.0.113.9:40022".parse().unwrap()
    }

    #[test]
    fn test_event_captures_peer_address() {
        let event = AttackEvent::new(Protocol::Ssh, peer(), "root", "toor", "Brute-force");

        assert_eq!(event.source_ip, "203.0.113.9".parse::<IpAddr>().unwrap());
        assert_eq!(event.source_port, 40022);
        assert!(!event.success);
    }

    #[test]
    fn test_protocol_serializes_uppercase() {
        let json = serde_json::to_string(&Protocol::Ssh).unwrap();
        assert_eq!(json, "\"SSH\"");

        let json = serde_json::to_string(&Protocol::Ftp).unwrap();
        assert_eq!(json, "\"FTP\"");
    }

    #[test]
    fn test_event_json_field_names() {
        let event = AttackEvent::new(Protocol::Ftp, peer(), "anonymous", "guest", "Incursion");
        let value = serde_json::to_value(&event).unwrap();

        let obj = value.as_object().unwrap();
        for field in [
            "timestamp",
            "protocol",
            "source_ip",
            "source_port",
            "username",
            "password",
            "success",
            "additional_info",
        ] {
            assert!(obj.contains_key(field), "missing field {field}");
        }
        assert_eq!(obj["protocol"], "FTP");
    }
}
