//! `claim(task-id, agent-id)` (spec.md §4.2.3): CAS Pending→Claimed. Failure
//! means another node already claimed the task — the caller must not assume
//! the mutation applied and should simply move on to the next candidate.

use swarm_model::{LamportClock, TaskStatus};
use swarm_store::Store;
use uuid::Uuid;

use crate::error::QueueResult;

/// Attempt to claim a pending task for an agent on `node_id`. Returns
/// `true` iff this call won the race.
pub fn claim(
    store: &Store,
    clock: &LamportClock,
    task_id: Uuid,
    agent_id: Uuid,
    node_id: &str,
) -> QueueResult<bool> {
    let now = chrono::Utc::now();
    let ts = clock.tick();
    let applied = store.transition_task(task_id, &[TaskStatus::Pending], |task| {
        task.status = TaskStatus::Claimed;
        task.assigned_agent_id = Some(agent_id);
        task.assigned_node_id = Some(node_id.to_string());
        task.claimed_at = Some(now);
        task.updated_at = now;
        task.lamport_ts = ts;
    })?;
    Ok(applied)
}
