//! Task gossip (spec.md §4.5): task mutations are split into sub-actions
//! (create, claim, update, complete, fail, cancel, archive), each with its
//! own dedup key `task_id:action:lamport_ts` and its own wire tag so a
//! receiver can distinguish "this is a new task" from "this task changed".

use swarm_model::{lww_wins, LamportClock, Task};
use swarm_net::{tag, NetHandle};
use swarm_store::Store;

use crate::error::GossipResult;
use crate::seen::SeenMessages;

/// The seven task sub-actions gossiped independently (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Create,
    Claim,
    Update,
    Complete,
    Fail,
    Cancel,
    Archive,
}

impl TaskAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Claim => "claim",
            Self::Update => "update",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::Archive => "archive",
        }
    }

    fn wire_tag(self) -> u8 {
        match self {
            Self::Create => tag::TASK_CREATE,
            Self::Claim => tag::TASK_CLAIM,
            Self::Update => tag::TASK_UPDATE,
            Self::Complete => tag::TASK_COMPLETE,
            Self::Fail => tag::TASK_FAIL,
            Self::Cancel => tag::TASK_CANCEL,
            Self::Archive => tag::TASK_ARCHIVE,
        }
    }

    fn from_wire_tag(msg_type: u8) -> Option<Self> {
        match msg_type {
            tag::TASK_CREATE => Some(Self::Create),
            tag::TASK_CLAIM => Some(Self::Claim),
            tag::TASK_UPDATE => Some(Self::Update),
            tag::TASK_COMPLETE => Some(Self::Complete),
            tag::TASK_FAIL => Some(Self::Fail),
            tag::TASK_CANCEL => Some(Self::Cancel),
            tag::TASK_ARCHIVE => Some(Self::Archive),
            _ => None,
        }
    }
}

pub fn dedup_key(action: TaskAction, task: &Task) -> String {
    format!("{}:{}:{}", task.id, action.as_str(), task.lamport_ts)
}

/// LWW-merge an incoming task snapshot into the local store. Shared by the
/// push path ([`handle_task_frame`]) and anti-entropy sync responses.
pub fn merge_task(store: &Store, incoming: &Task) -> GossipResult<bool> {
    let origin_node = incoming
        .assigned_node_id
        .clone()
        .unwrap_or_else(|| incoming.created_by.clone());
    let applied = match store.get_task(incoming.id)? {
        None => {
            store.insert_task(incoming)?;
            true
        }
        Some(current) => {
            let incumbent_node = current
                .assigned_node_id
                .clone()
                .unwrap_or_else(|| current.created_by.clone());
            if lww_wins(incoming.lamport_ts, &origin_node, current.lamport_ts, &incumbent_node) {
                store.insert_task(incoming)?;
                true
            } else {
                false
            }
        }
    };
    Ok(applied)
}

/// Broadcast a task mutation to every connected peer, excluding the node
/// that originated it locally (there is none — this node is the origin).
pub async fn broadcast_task_event(
    net: &NetHandle,
    seen: &mut SeenMessages,
    action: TaskAction,
    task: &Task,
) -> GossipResult<()> {
    seen.mark(&dedup_key(action, task));
    net.broadcast(action.wire_tag(), serde_json::to_value(task)?, None).await?;
    Ok(())
}

/// What happened when an incoming task gossip frame was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskGossipOutcome {
    /// Already seen; dropped without touching the store.
    Duplicate,
    /// Fresh message. `applied` is whether the local record actually
    /// changed (it may lose the LWW comparison and still need
    /// re-forwarding to the rest of the mesh).
    Forward { applied: bool },
}

/// Handle an incoming task gossip frame: dedup, witness the Lamport clock,
/// CRDT-merge under LWW, and report whether to re-broadcast.
pub fn handle_task_frame(
    store: &Store,
    clock: &LamportClock,
    seen: &mut SeenMessages,
    msg_type: u8,
    payload: serde_json::Value,
) -> GossipResult<TaskGossipOutcome> {
    let Some(action) = TaskAction::from_wire_tag(msg_type) else {
        return Ok(TaskGossipOutcome::Duplicate);
    };
    let incoming: Task = serde_json::from_value(payload)?;
    let key = dedup_key(action, &incoming);
    if seen.contains(&key) {
        return Ok(TaskGossipOutcome::Duplicate);
    }
    seen.mark(&key);
    clock.witness(incoming.lamport_ts);

    let applied = merge_task(store, &incoming)?;
    Ok(TaskGossipOutcome::Forward { applied })
}
