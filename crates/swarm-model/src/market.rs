use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BountyStatus {
    Open,
    Claimed,
    Completed,
    Cancelled,
    Expired,
}

/// A cross-swarm work offer posted to the broker's shared board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounty {
    pub id: Uuid,
    pub swarm_id: String,
    pub task_summary: String,
    pub required_capabilities: Vec<String>,
    pub reputation_floor: f64,
    pub status: BountyStatus,
    pub claimed_by_swarm: Option<String>,
    pub posted_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub lamport_ts: u64,
}

impl Bounty {
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.status == BountyStatus::Open && now >= self.expires_at
    }
}

/// A completed-work receipt exchanged between swarms once a bounty resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tribute {
    pub id: Uuid,
    pub bounty_id: Uuid,
    pub from_swarm: String,
    pub to_swarm: String,
    pub summary: String,
    pub lamport_ts: u64,
}

/// Per-node summary of acceptance rate, throughput, and capacity, used by
/// peers deciding whether to delegate overflow work to this node's swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub node_id: String,
    pub capabilities: Vec<String>,
    pub acceptance_rate: f64,
    pub avg_completion_seconds: f64,
    pub idle_agent_count: u32,
    pub total_agent_count: u32,
    pub lamport_ts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Task,
    Idea,
    Bounty,
    Announcement,
    Discussion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostClaimState {
    Active,
    Claimed,
    Resolved,
    Archived,
}

/// A free-form message-board entry, gossiped like tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub kind: PostKind,
    pub author_node_id: String,
    pub title: String,
    pub body: String,
    pub claim_state: PostClaimState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub lamport_ts: u64,
}
