//! Causal replication plane (spec.md §4.5): push-flood gossip plus pull
//! anti-entropy for tasks, agents, identities, and credentials. Every
//! mutation is stamped with a Lamport tick and merged under last-writer-
//! wins, tie-broken by the higher node-id, so the mesh converges regardless
//! of delivery order.

pub mod agent_gossip;
pub mod anti_entropy;
pub mod error;
pub mod identity_gossip;
pub mod run;
pub mod seen;
pub mod task_gossip;
pub mod tombstone;

pub use agent_gossip::{
    broadcast_agent_deregister, broadcast_agent_heartbeat, broadcast_agent_register, handle_agent_frame,
    AgentGossipOutcome,
};
pub use anti_entropy::{apply_sync_response, build_sync_response, initiate_sync, SyncResponse, Watermarks};
pub use error::{GossipError, GossipResult};
pub use identity_gossip::{broadcast_credential, broadcast_identity_announce, handle_identity_frame, IdentityGossipOutcome};
pub use run::spawn;
pub use seen::SeenMessages;
pub use task_gossip::{broadcast_task_event, handle_task_frame, merge_task, TaskAction, TaskGossipOutcome};
pub use tombstone::TombstoneTracker;
