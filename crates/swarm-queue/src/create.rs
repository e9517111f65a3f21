//! Task creation (spec.md §4.2.1, §4.2.3). The queue stamps a fresh Lamport
//! tick and picks the task's birth status from its dependency set; the
//! caller (the gossip layer) is responsible for broadcasting `TASK_CREATE`
//! once this returns.

use std::collections::HashSet;

use swarm_model::{LamportClock, Task, TaskStatus};
use swarm_store::Store;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};

/// The caller-supplied fields of a new task. Everything derived from the
/// queue itself (id, status, timestamps, Lamport stamp) is filled in by
/// [`create_task`].
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub work_instructions: String,
    pub acceptance_criteria: String,
    pub priority: i32,
    pub required_capabilities: Vec<String>,
    pub project_path: String,
    pub context: String,
    pub created_by: String,
    pub parent_id: Option<Uuid>,
    pub depends_on: Vec<Uuid>,
    pub test_command: Option<String>,
    pub auto_merge: bool,
    /// Present iff a planner is attached to decompose this task before it
    /// becomes actionable (`Planning` birth state per the transition table).
    pub has_planner: bool,
}

/// Walk the persisted dependency graph reachable from `start`, depth-first.
/// A dependency cycle among already-stored tasks (A depends on B depends on
/// A) shows up as `start` reappearing on its own path; detected here so a
/// newly created task can never be wired into one.
fn depends_on_cycle(store: &Store, start: Uuid) -> QueueResult<bool> {
    let mut stack = vec![start];
    let mut visited = HashSet::new();
    while let Some(id) = stack.pop() {
        if id == start && !visited.is_empty() {
            return Ok(true);
        }
        if !visited.insert(id) {
            continue;
        }
        if let Some(task) = store.get_task(id)? {
            stack.extend(task.depends_on.iter().copied());
        }
    }
    Ok(false)
}

/// `createTask(fields…)`: stamps with `tick()` and inserts. Birth status is
/// `Blocked` if `depends_on` is non-empty, else `Planning` if a planner is
/// attached, else `Pending`. Rejects at creation time if any named
/// dependency's own chain already cycles back to itself (spec.md §8
/// boundary behavior).
pub fn create_task(store: &Store, clock: &LamportClock, fields: NewTask) -> QueueResult<Task> {
    for dep_id in &fields.depends_on {
        if depends_on_cycle(store, *dep_id)? {
            return Err(QueueError::DependencyCycle(*dep_id));
        }
    }

    let now = chrono::Utc::now();
    let status = if Task::is_blocked_at_birth(&fields.depends_on) {
        TaskStatus::Blocked
    } else if fields.has_planner {
        TaskStatus::Planning
    } else {
        TaskStatus::Pending
    };

    let task = Task {
        id: Uuid::new_v4(),
        title: fields.title,
        description: fields.description,
        work_instructions: fields.work_instructions,
        acceptance_criteria: fields.acceptance_criteria,
        priority: fields.priority,
        required_capabilities: fields.required_capabilities,
        project_path: fields.project_path,
        context: fields.context,
        created_by: fields.created_by,
        assigned_agent_id: None,
        assigned_node_id: None,
        result: None,
        error: None,
        progress: None,
        parent_id: fields.parent_id,
        depends_on: fields.depends_on,
        status,
        review_status: swarm_model::ReviewStatus::None,
        review_feedback: String::new(),
        archived: false,
        git_branch: None,
        merge_attempts: 0,
        test_command: fields.test_command,
        auto_merge: fields.auto_merge,
        pr_url: None,
        created_at: now,
        updated_at: now,
        claimed_at: None,
        completed_at: None,
        lamport_ts: clock.tick(),
    };

    store.insert_task(&task)?;
    Ok(task)
}
