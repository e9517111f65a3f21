//! Wire-protocol types for the swarm transport layer.
//!
//! Every frame is a 4-byte big-endian length prefix followed by a JSON
//! object carrying a numeric `type` tag (see the ranges below) and an
//! opaque `payload`. This crate owns and interprets only the transport
//! family (0x01–0x07); every other tag is handed to the caller as an
//! [`Envelope`] for the gossip/queue/election/identity/broker layers above
//! to decode.

use serde::{Deserialize, Serialize};

// ── Tag space ─────────────────────────────────────────────────────────────

pub mod tag {
    //! Numeric message-type tags, grouped by family.

    // Transport: 0x01–0x07
    pub const HELLO: u8 = 0x01;
    pub const POST: u8 = 0x02;
    pub const SYNC_REQ: u8 = 0x03;
    pub const SYNC_RSP: u8 = 0x04;
    pub const PEX: u8 = 0x05;
    pub const PING: u8 = 0x06;
    pub const PONG: u8 = 0x07;

    // Tasks: 0x10–0x17
    pub const TASK_CREATE: u8 = 0x10;
    pub const TASK_CLAIM: u8 = 0x11;
    pub const TASK_UPDATE: u8 = 0x12;
    pub const TASK_COMPLETE: u8 = 0x13;
    pub const TASK_FAIL: u8 = 0x14;
    pub const TASK_CANCEL: u8 = 0x15;
    pub const TASK_ASSIGN: u8 = 0x16;
    pub const TASK_ARCHIVE: u8 = 0x17;

    // Agents: 0x20–0x22
    pub const AGENT_REGISTER: u8 = 0x20;
    pub const AGENT_HEARTBEAT: u8 = 0x21;
    pub const AGENT_DEREGISTER: u8 = 0x22;

    // Task anti-entropy: 0x30-0x31
    pub const TASK_AE_REQ: u8 = 0x30;
    pub const TASK_AE_RSP: u8 = 0x31;

    // Election: 0x40-0x42
    pub const EMPEROR_HEARTBEAT: u8 = 0x40;
    pub const ELECTION_START: u8 = 0x41;
    pub const ELECTION_VICTORY: u8 = 0x42;

    // Census / agent sync: 0x50-0x52
    pub const CENSUS: u8 = 0x50;
    pub const AGENT_SYNC_REQ: u8 = 0x51;
    pub const AGENT_SYNC_RSP: u8 = 0x52;

    // Auth: 0x60-0x62
    pub const AUTH_CHALLENGE: u8 = 0x60;
    pub const AUTH_RESPONSE: u8 = 0x61;
    pub const AUTH_REJECT: u8 = 0x62;

    // Identity: 0x70-0x73
    pub const IDENTITY_ANNOUNCE: u8 = 0x70;
    pub const CREDENTIAL_ISSUE: u8 = 0x71;
    pub const IDENTITY_SYNC_REQ: u8 = 0x72;
    pub const IDENTITY_SYNC_RSP: u8 = 0x73;

    // DHT storage: 0x90-0x95
    pub const DHT_STORE: u8 = 0x90;
    pub const DHT_FIND_VALUE: u8 = 0x91;
    pub const DHT_VALUE: u8 = 0x92;

    // DHT discovery: 0xA0-0xA2
    pub const DHT_FIND_NODE: u8 = 0xA0;
    pub const DHT_NODES: u8 = 0xA1;
    pub const DHT_PING: u8 = 0xA2;

    // Node registry: 0xB0-0xB1
    pub const NODE_REGISTER: u8 = 0xB0;
    pub const NODE_DEREGISTER: u8 = 0xB1;

    // Marketplace: 0xC0-0xCA
    pub const OFFERING_ANNOUNCE: u8 = 0xC0;
    pub const OFFERING_WITHDRAW: u8 = 0xC1;
    pub const TRIBUTE_REQUEST: u8 = 0xC2;
    pub const TRIBUTE_ACCEPT: u8 = 0xC3;
    pub const TRIBUTE_REJECT: u8 = 0xC4;
    pub const CAPABILITY_ADVERTISE: u8 = 0xC5;
    pub const MARKETPLACE_SYNC_REQ: u8 = 0xC6;
    pub const MARKETPLACE_SYNC_RSP: u8 = 0xC7;
    pub const BOUNTY_POST: u8 = 0xC8;
    pub const BOUNTY_CLAIM: u8 = 0xC9;
    pub const BOUNTY_CANCEL: u8 = 0xCA;
}

/// Broker inter-swarm protocol has its own, disjoint tag space carried on a
/// separate TCP port.
pub mod broker_tag {
    pub const HELLO: u8 = 0x01;
    pub const RELAY: u8 = 0x02;
    pub const SYNC_REQ: u8 = 0x03;
    pub const SYNC_RSP: u8 = 0x04;
    pub const PING: u8 = 0x05;
    pub const PONG: u8 = 0x06;
}

/// A single framed message: a numeric type tag plus an opaque JSON payload.
/// Transport owns tags in `tag::HELLO..=tag::PONG`; everything else passes
/// through untouched to the layer that registered interest in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub msg_type: u8,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(msg_type: u8, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            msg_type,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Sent immediately after the TCP connection opens, in both directions.
/// Identifies the sender by node-id (not by transport-layer key) so the
/// receiving side can apply the deterministic edge tiebreak.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hello {
    pub node_id: String,
    pub listen_port: u16,
    pub public_key_hex: Option<String>,
}

/// Peer-exchange gossip: a batch of addresses the sender has learned about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pex {
    pub peers: Vec<PeerAddr>,
}

/// A known peer's node-id and dialable address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    pub node_id: String,
    pub addr: String,
}

/// Keepalive probe. `nonce` is echoed back in the matching `Pong`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ping {
    pub nonce: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pong {
    pub nonce: u64,
}

/// A captured tracing log record forwarded through the log channel so a
/// host TUI/dashboard can display transport internals without them going
/// to stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: String,
    pub target: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrips_payload() {
        let hello = Hello {
            node_id: "abc123".into(),
            listen_port: 7420,
            public_key_hex: None,
        };
        let env = Envelope::new(tag::HELLO, &hello).unwrap();
        assert_eq!(env.msg_type, tag::HELLO);
        let decoded: Hello = env.decode().unwrap();
        assert_eq!(decoded, hello);
    }
}
