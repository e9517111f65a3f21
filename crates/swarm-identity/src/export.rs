//! Operator-facing DID export/import: moving a node's trust anchor between
//! hosts without ever touching the secret key (spec.md §9's opaque-handle
//! rule). Only the public key and DID metadata cross this boundary.

use serde::{Deserialize, Serialize};
use swarm_model::IdentityRecord;

/// A portable, secret-free snapshot of a node's identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityDocument {
    pub did: String,
    pub node_id: String,
    pub public_key_hex: String,
    pub role: swarm_model::NodeRole,
}

pub fn export_identity(record: &IdentityRecord) -> IdentityDocument {
    IdentityDocument {
        did: record.did.clone(),
        node_id: record.node_id.clone(),
        public_key_hex: record.public_key_hex.clone(),
        role: record.role,
    }
}

/// Re-hydrate an [`IdentityRecord`] from an imported document, stamped with
/// a fresh Lamport tick from the importing node's clock.
pub fn import_identity(doc: &IdentityDocument, lamport_ts: u64) -> IdentityRecord {
    IdentityRecord {
        did: doc.did.clone(),
        node_id: doc.node_id.clone(),
        public_key_hex: doc.public_key_hex.clone(),
        role: doc.role,
        created_at: chrono::Utc::now(),
        lamport_ts,
    }
}
