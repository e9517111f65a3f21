//! Deterministic DID derivation and first-boot keypair bootstrap.
//!
//! A node's secret key and its [`IdentityRecord`](swarm_model::IdentityRecord)
//! both live in the durable store's `swarm_state`/`identities` tables so a
//! restart resumes the same DID rather than rolling a new identity.

use chrono::Utc;
use swarm_model::{make_did, IdentityRecord, NodeRole};
use swarm_store::Store;

use crate::error::IdentityResult;
use crate::keypair::NodeKeypair;

const SECRET_KEY_STATE_KEY: &str = "identity_secret_hex";

/// The live keypair plus the identity record it was derived from, held
/// together so callers never have to re-derive the DID from the key.
pub struct NodeIdentity {
    pub keypair: NodeKeypair,
    pub record: IdentityRecord,
}

impl NodeIdentity {
    pub fn did(&self) -> &str {
        &self.record.did
    }
}

/// Load the persisted keypair, or generate and persist a new one on first
/// boot. Either way, upserts (and returns) the matching [`IdentityRecord`]
/// stamped with a fresh Lamport tick so the first announcement gossips
/// immediately.
pub fn load_or_generate(
    store: &Store,
    realm: &str,
    node_id: &str,
    role: NodeRole,
    clock: &swarm_model::LamportClock,
) -> IdentityResult<NodeIdentity> {
    let keypair = match store.get_state(SECRET_KEY_STATE_KEY)? {
        Some(hex) => NodeKeypair::from_secret_hex(&hex)?,
        None => {
            let kp = NodeKeypair::generate();
            store.set_state(SECRET_KEY_STATE_KEY, &kp.secret_hex())?;
            kp
        }
    };

    let did = make_did(realm, node_id);
    let record = match store.get_identity(&did)? {
        Some(existing) => existing,
        None => {
            let record = IdentityRecord {
                did: did.clone(),
                node_id: node_id.to_string(),
                public_key_hex: keypair.public_key_hex(),
                role,
                created_at: Utc::now(),
                lamport_ts: clock.tick(),
            };
            store.upsert_identity(&record)?;
            record
        }
    };

    Ok(NodeIdentity { keypair, record })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_boot_generates_and_persists_a_keypair() {
        let store = Store::open_in_memory().unwrap();
        let clock = swarm_model::LamportClock::new(0);
        let identity = load_or_generate(&store, "swarm", "abc123", NodeRole::Worker, &clock).unwrap();
        assert_eq!(identity.did(), "did:swarm:abc123");
        assert_eq!(identity.record.public_key_hex, identity.keypair.public_key_hex());
    }

    #[test]
    fn restart_reuses_the_same_identity() {
        let store = Store::open_in_memory().unwrap();
        let clock = swarm_model::LamportClock::new(0);
        let first = load_or_generate(&store, "swarm", "abc123", NodeRole::Worker, &clock).unwrap();
        let second = load_or_generate(&store, "swarm", "abc123", NodeRole::Worker, &clock).unwrap();
        assert_eq!(first.keypair.public_key_hex(), second.keypair.public_key_hex());
        assert_eq!(first.record.lamport_ts, second.record.lamport_ts);
    }
}
