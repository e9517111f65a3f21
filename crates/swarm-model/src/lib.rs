//! Shared replicated data model for the swarm: the entity types every node
//! gossips and stores, plus the Lamport clock that orders their mutations.

pub mod agent;
pub mod clock;
pub mod identity;
pub mod market;
pub mod node;
pub mod task;

pub use agent::{Agent, AgentStatus};
pub use clock::{lww_wins, LamportClock};
pub use identity::{make_did, Credential, IdentityRecord};
pub use market::{Bounty, BountyStatus, CapabilityProfile, Post, PostClaimState, PostKind, Tribute};
pub use node::{NodeRecord, NodeRole};
pub use task::{ReviewStatus, Task, TaskStatus, MAX_TASK_CONTEXT_BYTES};

/// `0.40·completion_rate + 0.25·reliability + 0.20·speed_score +
/// 0.15·recency_decay(24h half-life)`. Peers with no observed history score
/// a neutral 0.5.
pub fn reputation_score(
    completion_rate: f64,
    reliability: f64,
    speed_score: f64,
    hours_since_last_seen: f64,
) -> f64 {
    let recency_decay = 0.5_f64.powf(hours_since_last_seen / 24.0);
    0.40 * completion_rate + 0.25 * reliability + 0.20 * speed_score + 0.15 * recency_decay
}

pub const UNKNOWN_PEER_REPUTATION: f64 = 0.5;
