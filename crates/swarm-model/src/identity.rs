use serde::{Deserialize, Serialize};

use crate::node::NodeRole;

/// `did:<realm>:<node-id>` — the DID format used throughout the swarm.
/// Keys never leave the owning node except via a controlled export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub did: String,
    pub node_id: String,
    pub public_key_hex: String,
    pub role: NodeRole,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub lamport_ts: u64,
}

pub fn make_did(realm: &str, node_id: &str) -> String {
    format!("did:{realm}:{node_id}")
}

/// A claim issued by one identity about another (or itself), signed with
/// Ed25519 over a canonical JSON encoding of the claims plus validity
/// window. Immutable once gossiped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: uuid::Uuid,
    pub issuer_did: String,
    pub subject_did: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub claims: serde_json::Map<String, serde_json::Value>,
    pub signature_hex: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub lamport_ts: u64,
}

impl Credential {
    /// The bytes a signature is computed over: everything except the
    /// signature itself, in a stable field order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let canon = serde_json::json!({
            "id": self.id,
            "issuer_did": self.issuer_did,
            "subject_did": self.subject_did,
            "type": self.credential_type,
            "claims": self.claims,
            "issued_at": self.issued_at.to_rfc3339(),
            "expires_at": self.expires_at.to_rfc3339(),
        });
        serde_json::to_vec(&canon).expect("canonical credential json never fails")
    }

    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now >= self.expires_at
    }
}
