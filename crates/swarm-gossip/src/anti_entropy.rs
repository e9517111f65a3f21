//! Pull anti-entropy (spec.md §4.5): every 30-60 s each node picks a random
//! peer and exchanges watermarks per entity class, reconciling whatever the
//! push layer missed — partitions, late joiners, dropped frames.

use serde::{Deserialize, Serialize};
use swarm_model::{Agent, Credential, IdentityRecord, LamportClock, Task};
use swarm_net::{tag, NetHandle};
use swarm_store::Store;

use crate::error::GossipResult;
use crate::task_gossip::merge_task;

/// The max known `lamport_ts` this node has observed per entity class,
/// carried in `SYNC_REQ`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Watermarks {
    pub task: u64,
    pub agent: u64,
    pub identity: u64,
    pub credential: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub tasks: Vec<Task>,
    pub agents: Vec<Agent>,
    pub identities: Vec<IdentityRecord>,
    pub credentials: Vec<Credential>,
}

/// Pick a peer at random from the connected set and send it our
/// watermarks. Returns `false` (without erroring) if no peer is connected.
pub async fn initiate_sync(net: &NetHandle, watermarks: Watermarks) -> GossipResult<bool> {
    let peers = net.connected_peers().await?;
    let Some(peer) = pick_random(&peers) else {
        return Ok(false);
    };
    let sent = net
        .send_to(peer, tag::SYNC_REQ, serde_json::to_value(watermarks)?)
        .await?;
    Ok(sent)
}

fn pick_random(peers: &[String]) -> Option<&String> {
    if peers.is_empty() {
        return None;
    }
    let index = (rand::random::<u64>() as usize) % peers.len();
    peers.get(index)
}

/// Build the `SYNC_RSP` payload for a `SYNC_REQ` carrying `requested`.
pub fn build_sync_response(store: &Store, requested: Watermarks) -> GossipResult<SyncResponse> {
    Ok(SyncResponse {
        tasks: store.tasks_since(requested.task)?,
        agents: store.agents_since(requested.agent)?,
        identities: store.identities_since(requested.identity)?,
        credentials: store.credentials_since(requested.credential)?,
    })
}

/// Merge a `SYNC_RSP` into local state under the same LWW discipline as
/// push gossip. Credentials are accepted as-is: their signature was already
/// checked once at first-gossip time by the peer forwarding them, and the
/// append-only store rejects id collisions regardless.
pub fn apply_sync_response(store: &Store, clock: &LamportClock, response: &SyncResponse) -> GossipResult<usize> {
    let mut applied = 0;

    for task in &response.tasks {
        clock.witness(task.lamport_ts);
        if merge_task(store, task)? {
            applied += 1;
        }
    }
    for agent in &response.agents {
        clock.witness(agent.lamport_ts);
        let should_apply = match store.get_agent(agent.id)? {
            None => true,
            Some(current) => agent.lamport_ts > current.lamport_ts,
        };
        if should_apply {
            store.upsert_agent(agent)?;
            applied += 1;
        }
    }
    for identity in &response.identities {
        clock.witness(identity.lamport_ts);
        let should_apply = match store.get_identity(&identity.did)? {
            None => true,
            Some(current) => identity.lamport_ts > current.lamport_ts,
        };
        if should_apply {
            store.upsert_identity(identity)?;
            applied += 1;
        }
    }
    for cred in &response.credentials {
        clock.witness(cred.lamport_ts);
        store.insert_credential(cred)?;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_model::{ReviewStatus, TaskStatus};
    use uuid::Uuid;

    fn sample_task(lamport_ts: u64) -> Task {
        let now = chrono::Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            work_instructions: String::new(),
            acceptance_criteria: String::new(),
            priority: 0,
            required_capabilities: vec![],
            project_path: "/tmp".into(),
            context: String::new(),
            created_by: "node-a".into(),
            assigned_agent_id: None,
            assigned_node_id: None,
            result: None,
            error: None,
            progress: None,
            parent_id: None,
            depends_on: vec![],
            status: TaskStatus::Pending,
            review_status: ReviewStatus::None,
            review_feedback: String::new(),
            archived: false,
            git_branch: None,
            merge_attempts: 0,
            test_command: None,
            auto_merge: false,
            pr_url: None,
            created_at: now,
            updated_at: now,
            claimed_at: None,
            completed_at: None,
            lamport_ts,
        }
    }

    #[test]
    fn build_sync_response_only_includes_records_past_watermark() {
        let store = Store::open_in_memory().unwrap();
        let old = sample_task(1);
        let fresh = sample_task(10);
        store.insert_task(&old).unwrap();
        store.insert_task(&fresh).unwrap();

        let response = build_sync_response(&store, Watermarks { task: 5, ..Default::default() }).unwrap();
        assert_eq!(response.tasks.len(), 1);
        assert_eq!(response.tasks[0].id, fresh.id);
    }

    #[test]
    fn apply_sync_response_merges_new_tasks_and_advances_clock() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let task = sample_task(7);
        let response = SyncResponse {
            tasks: vec![task.clone()],
            agents: vec![],
            identities: vec![],
            credentials: vec![],
        };

        let applied = apply_sync_response(&store, &clock, &response).unwrap();
        assert_eq!(applied, 1);
        assert!(store.get_task(task.id).unwrap().is_some());
        assert_eq!(clock.current(), 8);
    }
}
