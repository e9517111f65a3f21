//! Dependency-driven bulk transitions: cascade-fail and unblock (spec.md
//! §4.3 phases 1–2). These scan the whole `Blocked` set rather than a
//! single task, so the dispatcher runs them once per wake rather than per
//! task-event.

use swarm_model::{LamportClock, TaskStatus};
use swarm_store::Store;

use crate::aggregation::aggregate_parent;
use crate::error::QueueResult;

/// Blocked tasks whose dependency set contains a failed or cancelled task
/// are themselves failed, and the failure cascades to their parent via
/// aggregation. Runs to a fixpoint so a chain of blocked tasks all fails in
/// one call. Returns the number of tasks failed.
pub fn cascade_fail(store: &Store, clock: &LamportClock) -> QueueResult<usize> {
    let mut total = 0;
    loop {
        let blocked = store.list_by_status(TaskStatus::Blocked)?;
        let mut changed = false;

        for task in blocked {
            let mut has_bad_dependency = false;
            for dep_id in &task.depends_on {
                if let Some(dep) = store.get_task(*dep_id)? {
                    if matches!(dep.status, TaskStatus::Failed | TaskStatus::Cancelled) {
                        has_bad_dependency = true;
                        break;
                    }
                }
            }
            if !has_bad_dependency {
                continue;
            }

            let now = chrono::Utc::now();
            let ts = clock.tick();
            let applied = store.transition_task(task.id, &[TaskStatus::Blocked], |t| {
                t.status = TaskStatus::Failed;
                t.error = Some("Dependency failed or cancelled".into());
                t.completed_at = Some(now);
                t.updated_at = now;
                t.lamport_ts = ts;
            })?;
            if applied {
                changed = true;
                total += 1;
                if let Some(parent_id) = task.parent_id {
                    aggregate_parent(store, clock, parent_id)?;
                }
            }
        }

        if !changed {
            break;
        }
    }
    Ok(total)
}

/// Blocked tasks whose dependencies have all reached `Completed` move to
/// `Pending`. Returns the number of tasks unblocked.
pub fn unblock(store: &Store, clock: &LamportClock) -> QueueResult<usize> {
    let blocked = store.list_by_status(TaskStatus::Blocked)?;
    let mut count = 0;

    for task in blocked {
        let mut all_dependencies_completed = true;
        for dep_id in &task.depends_on {
            match store.get_task(*dep_id)? {
                Some(dep) if dep.status == TaskStatus::Completed => {}
                _ => {
                    all_dependencies_completed = false;
                    break;
                }
            }
        }
        if !all_dependencies_completed {
            continue;
        }

        let now = chrono::Utc::now();
        let ts = clock.tick();
        let applied = store.transition_task(task.id, &[TaskStatus::Blocked], |t| {
            t.status = TaskStatus::Pending;
            t.updated_at = now;
            t.lamport_ts = ts;
        })?;
        if applied {
            count += 1;
        }
    }
    Ok(count)
}
