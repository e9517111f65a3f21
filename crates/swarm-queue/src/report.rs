//! Agent report routing (spec.md §4.2.3). Reports arrive through the
//! JSON-RPC collaborator boundary (§6) as one of four kinds and route to CAS
//! transitions with allowed-from set `{Claimed, InProgress, WaitingInput}`.
//!
//! Reports that land on a task in an unexpected non-terminal state are
//! **accepted with warning** rather than dropped, to avoid losing agent
//! output to stale emperor-side state — but a terminal task never accepts a
//! late report.

use swarm_model::{AgentStatus, LamportClock, TaskStatus};
use swarm_store::Store;
use uuid::Uuid;

use crate::error::QueueResult;
use crate::statuses::ALL_NON_TERMINAL;

#[derive(Debug, Clone)]
pub enum AgentReport {
    Progress { message: String },
    Complete { result: String },
    Fail { error: String },
    NeedsInput { prompt: String },
}

const NORMAL_FROM: &[TaskStatus] = &[TaskStatus::Claimed, TaskStatus::InProgress, TaskStatus::WaitingInput];

/// Apply an agent report to a task. Returns `true` iff the task's status
/// (and associated fields) changed. A report that lands the task on a
/// terminal status also releases the assigned agent back to `Idle` — it no
/// longer references any non-terminal task (spec.md §3's busy invariant).
pub fn apply_report(
    store: &Store,
    clock: &LamportClock,
    task_id: Uuid,
    report: AgentReport,
) -> QueueResult<bool> {
    let applied = if try_apply(store, clock, task_id, NORMAL_FROM, &report)? {
        true
    } else {
        let Some(task) = store.get_task(task_id)? else {
            return Ok(false);
        };
        if task.status.is_terminal() {
            return Ok(false);
        }

        tracing::warn!(
            task_id = %task_id,
            status = ?task.status,
            "agent report landed on task in an unexpected state; accepting anyway"
        );
        try_apply(store, clock, task_id, ALL_NON_TERMINAL, &report)?
    };

    if applied {
        release_agent_if_task_terminal(store, clock, task_id)?;
    }
    Ok(applied)
}

/// If `task_id` now sits in a terminal status, CAS its assigned agent (if
/// any) from `Busy` back to `Idle` and clear `current_task_id`. A lost CAS
/// here (agent already reassigned, offline, or untracked) is not an error —
/// the task's own terminal status is the invariant that matters.
fn release_agent_if_task_terminal(store: &Store, clock: &LamportClock, task_id: Uuid) -> QueueResult<()> {
    let Some(task) = store.get_task(task_id)? else {
        return Ok(());
    };
    if !task.status.is_terminal() {
        return Ok(());
    }
    let Some(agent_id) = task.assigned_agent_id else {
        return Ok(());
    };
    let ts = clock.tick();
    store.transition_agent(agent_id, &[AgentStatus::Busy], |a| {
        a.status = AgentStatus::Idle;
        a.current_task_id = None;
        a.lamport_ts = ts;
    })?;
    Ok(())
}

fn try_apply(
    store: &Store,
    clock: &LamportClock,
    task_id: Uuid,
    allowed_from: &[TaskStatus],
    report: &AgentReport,
) -> QueueResult<bool> {
    let now = chrono::Utc::now();
    let ts = clock.tick();
    let report = report.clone();
    let applied = store.transition_task(task_id, allowed_from, move |task| {
        task.updated_at = now;
        task.lamport_ts = ts;
        match report {
            AgentReport::Progress { message } => {
                task.progress = Some(message);
                task.status = TaskStatus::InProgress;
            }
            AgentReport::Complete { result } => {
                task.result = Some(result);
                task.completed_at = Some(now);
                if task.acceptance_criteria.trim().is_empty() {
                    task.status = TaskStatus::Completed;
                } else {
                    task.status = TaskStatus::PendingReview;
                    task.review_status = swarm_model::ReviewStatus::Pending;
                }
            }
            AgentReport::Fail { error } => {
                task.error = Some(error);
                task.status = TaskStatus::Failed;
                task.completed_at = Some(now);
            }
            AgentReport::NeedsInput { prompt } => {
                task.progress = Some(prompt);
                task.status = TaskStatus::WaitingInput;
            }
        }
    })?;
    Ok(applied)
}
