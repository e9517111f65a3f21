//! The `RELAY` envelope (spec.md §4.6): brokers federate `offering`,
//! `bounty`, and `capability-profile` records by wrapping them in a fresh
//! relay-uuid. Receivers dedup on that uuid, LWW-merge the inner record
//! into the shared bounty board, then re-flood to other brokers.

use serde::{Deserialize, Serialize};
use swarm_model::{Bounty, CapabilityProfile};
use uuid::Uuid;

/// The record kinds a broker federates across the swarm boundary. Capacity
/// advertisements and the marketplace's "offering" concept share one
/// representation — `CapabilityProfile` — since both last-writer-win on
/// `lamport_ts` and describe the same thing: what a remote swarm can do and
/// how much of it is free right now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RelayRecord {
    Bounty(Bounty),
    CapabilityProfile(CapabilityProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub relay_id: Uuid,
    pub record: RelayRecord,
}

impl RelayEnvelope {
    pub fn wrap(record: RelayRecord) -> Self {
        Self { relay_id: Uuid::new_v4(), record }
    }

    pub fn dedup_key(&self) -> String {
        self.relay_id.to_string()
    }
}
