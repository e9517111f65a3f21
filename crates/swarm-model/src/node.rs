use serde::{Deserialize, Serialize};

/// The three roles a node can hold. Only the emperor performs emperor-gated
/// work (leader-only dispatch phases, credential issuance); seneschals never
/// participate in election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Emperor,
    Worker,
    Seneschal,
}

/// A node's stable identity record. The `id` is a 32-hex random string,
/// generated on first boot and reused on every restart thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub role: NodeRole,
    pub http_port: u16,
    pub p2p_port: u16,
    pub public_key_hex: String,
}

impl NodeRecord {
    pub fn new(id: String, role: NodeRole, http_port: u16, p2p_port: u16, public_key_hex: String) -> Self {
        Self {
            id,
            role,
            http_port,
            p2p_port,
            public_key_hex,
        }
    }
}
