//! Unconditional requeue back to `Pending`, clearing any assignment. Used
//! where a task's current executor — a cross-swarm bounty claimant, most
//! notably — drops out without going through the normal
//! `{Claimed,InProgress,WaitingInput} -> Failed` agent-report path, and the
//! task should simply re-enter local dispatch rather than terminalize
//! (spec.md §4.6: on bounty `failed`/`expired`, "the task returns to the
//! pending pool").

use swarm_model::{LamportClock, TaskStatus};
use swarm_store::Store;
use uuid::Uuid;

use crate::error::QueueResult;
use crate::statuses::ALL_NON_TERMINAL;

/// CAS `task_id` from any non-terminal state back to `Pending`, clearing
/// its assignment. Returns `false` if the task had already reached a
/// terminal state or no longer exists.
pub fn requeue_to_pending(store: &Store, clock: &LamportClock, task_id: Uuid, note: &str) -> QueueResult<bool> {
    let now = chrono::Utc::now();
    let ts = clock.tick();
    let note = note.to_string();
    store.transition_task(task_id, ALL_NON_TERMINAL, move |task| {
        task.status = TaskStatus::Pending;
        task.assigned_agent_id = None;
        task.assigned_node_id = None;
        task.claimed_at = None;
        task.updated_at = now;
        task.lamport_ts = ts;
        if !note.is_empty() {
            task.progress = Some(note);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::{create_task, NewTask};

    #[test]
    fn requeues_a_claimed_task_back_to_pending() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let task = create_task(&store, &clock, NewTask::default()).unwrap();
        store
            .transition_task(task.id, &[TaskStatus::Pending], |t| t.status = TaskStatus::Claimed)
            .unwrap();

        assert!(requeue_to_pending(&store, &clock, task.id, "bounty expired").unwrap());

        let got = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(got.status, TaskStatus::Pending);
        assert!(got.assigned_agent_id.is_none());
    }

    #[test]
    fn does_not_requeue_a_terminal_task() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let task = create_task(&store, &clock, NewTask::default()).unwrap();
        store
            .transition_task(task.id, &[TaskStatus::Pending], |t| t.status = TaskStatus::Completed)
            .unwrap();

        assert!(!requeue_to_pending(&store, &clock, task.id, "").unwrap());
    }
}
