//! Parent aggregation (spec.md §4.2.4): once every subtask under a parent
//! reaches a terminal state, decide what happens to the parent.
//!
//! The "transaction" the spec describes is realized here as a read of all
//! siblings followed by a single CAS on the parent — the CAS is the
//! linearization point. A concurrent aggregation attempt (two sibling
//! completions racing to trigger the same parent decision) loses the CAS
//! and reports [`AggregationOutcome::AlreadyHandled`], never a double-apply.

use swarm_model::{LamportClock, TaskStatus};
use swarm_store::Store;
use uuid::Uuid;

use crate::error::QueueResult;
use crate::statuses::ALL_NON_TERMINAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOutcome {
    /// At least one sibling is still non-terminal; nothing to do yet.
    NotReady,
    /// All siblings failed; parent moved to `Failed`.
    ParentFailed,
    /// All siblings terminal, none failed, and the parent has no subtask
    /// git branches to merge; parent moved straight to `Completed`.
    ParentCompleted,
    /// All siblings terminal and at least one carries a git branch; parent
    /// moved to `Merging` so an integrator task can be launched.
    ParentMerging,
    /// The CAS lost the race to a concurrent aggregation, or the parent
    /// had no subtasks recorded at all.
    AlreadyHandled,
}

/// Called whenever a subtask reaches a terminal state. Re-reads all
/// siblings under `parent_id` and decides the parent's fate.
pub fn aggregate_parent(store: &Store, clock: &LamportClock, parent_id: Uuid) -> QueueResult<AggregationOutcome> {
    let siblings = store.list_by_parent(parent_id)?;
    if siblings.is_empty() {
        return Ok(AggregationOutcome::AlreadyHandled);
    }
    if siblings.iter().any(|s| !s.status.is_terminal()) {
        return Ok(AggregationOutcome::NotReady);
    }

    let now = chrono::Utc::now();
    let ts = clock.tick();

    if siblings.iter().all(|s| s.status == TaskStatus::Failed) {
        let applied = store.transition_task(parent_id, ALL_NON_TERMINAL, |t| {
            t.status = TaskStatus::Failed;
            t.error = Some("All subtasks failed".into());
            t.completed_at = Some(now);
            t.updated_at = now;
            t.lamport_ts = ts;
        })?;
        return Ok(if applied {
            AggregationOutcome::ParentFailed
        } else {
            AggregationOutcome::AlreadyHandled
        });
    }

    let has_git_branches = siblings.iter().any(|s| s.git_branch.is_some());
    if !has_git_branches {
        let applied = store.transition_task(parent_id, ALL_NON_TERMINAL, |t| {
            t.status = TaskStatus::Completed;
            t.completed_at = Some(now);
            t.updated_at = now;
            t.lamport_ts = ts;
        })?;
        return Ok(if applied {
            AggregationOutcome::ParentCompleted
        } else {
            AggregationOutcome::AlreadyHandled
        });
    }

    let applied = store.transition_task(parent_id, ALL_NON_TERMINAL, |t| {
        t.status = TaskStatus::Merging;
        t.updated_at = now;
        t.lamport_ts = ts;
    })?;
    Ok(if applied {
        AggregationOutcome::ParentMerging
    } else {
        AggregationOutcome::AlreadyHandled
    })
}
