use rusqlite::{params, OptionalExtension};
use swarm_model::{Task, TaskStatus};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Planning => "planning",
        TaskStatus::Blocked => "blocked",
        TaskStatus::Claimed => "claimed",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::WaitingInput => "waiting_input",
        TaskStatus::PendingReview => "pending_review",
        TaskStatus::Merging => "merging",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
    }
}

impl Store {
    pub fn insert_task(&self, task: &Task) -> StoreResult<()> {
        let data = serde_json::to_string(task)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, data, status, priority, created_at, parent_id, lamport_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    data = excluded.data, status = excluded.status, priority = excluded.priority,
                    parent_id = excluded.parent_id, lamport_ts = excluded.lamport_ts",
                params![
                    task.id.to_string(),
                    data,
                    status_str(task.status),
                    task.priority,
                    task.created_at.to_rfc3339(),
                    task.parent_id.map(|p| p.to_string()),
                    task.lamport_ts as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.with_conn(|conn| {
            let data: Option<String> = conn
                .query_row("SELECT data FROM tasks WHERE id = ?1", [id.to_string()], |r| r.get(0))
                .optional()?;
            Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
        })
    }

    pub fn list_by_status(&self, status: TaskStatus) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT data FROM tasks WHERE status = ?1 ORDER BY priority DESC, created_at ASC",
            )?;
            let rows = stmt
                .query_map([status_str(status)], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }

    pub fn list_by_parent(&self, parent_id: Uuid) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM tasks WHERE parent_id = ?1")?;
            let rows = stmt
                .query_map([parent_id.to_string()], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }

    pub fn tasks_since(&self, lamport_watermark: u64) -> StoreResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM tasks WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC")?;
            let rows = stmt
                .query_map([lamport_watermark as i64], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }

    /// Highest `lamport_ts` recorded across all tasks, for anti-entropy's
    /// outbound watermark. Zero on an empty store.
    pub fn tasks_max_lamport_ts(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let max: i64 = conn.query_row("SELECT COALESCE(MAX(lamport_ts), 0) FROM tasks", [], |r| r.get(0))?;
            Ok(max as u64)
        })
    }

    /// Compare-and-swap transition: applies `mutate` to the task iff its
    /// current persisted status is in `allowed_from`. Returns `false`
    /// (without writing anything) on a lost race; callers must not assume
    /// the mutation applied.
    pub fn transition_task(
        &self,
        id: Uuid,
        allowed_from: &[TaskStatus],
        mutate: impl FnOnce(&mut Task),
    ) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let data: Option<String> = tx
                .query_row("SELECT data FROM tasks WHERE id = ?1", [id.to_string()], |r| r.get(0))
                .optional()?;
            let Some(data) = data else {
                return Ok(false);
            };
            let mut task: Task = serde_json::from_str(&data)?;
            if !allowed_from.contains(&task.status) {
                return Ok(false);
            }
            mutate(&mut task);
            let updated = serde_json::to_string(&task)?;
            tx.execute(
                "UPDATE tasks SET data = ?1, status = ?2, priority = ?3, parent_id = ?4, lamport_ts = ?5 WHERE id = ?6",
                params![
                    updated,
                    status_str(task.status),
                    task.priority,
                    task.parent_id.map(|p| p.to_string()),
                    task.lamport_ts as i64,
                    id.to_string(),
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_task(status: TaskStatus) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            work_instructions: String::new(),
            acceptance_criteria: String::new(),
            priority: 5,
            required_capabilities: vec![],
            project_path: "/tmp".into(),
            context: String::new(),
            created_by: "n1".into(),
            assigned_agent_id: None,
            assigned_node_id: None,
            result: None,
            error: None,
            progress: None,
            parent_id: None,
            depends_on: vec![],
            status,
            review_status: swarm_model::ReviewStatus::None,
            review_feedback: String::new(),
            archived: false,
            git_branch: None,
            merge_attempts: 0,
            test_command: None,
            auto_merge: false,
            pr_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            claimed_at: None,
            completed_at: None,
            lamport_ts: 1,
        }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let task = sample_task(TaskStatus::Pending);
        store.insert_task(&task).unwrap();
        let got = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(got.id, task.id);
        assert_eq!(got.status, TaskStatus::Pending);
    }

    #[test]
    fn cas_transition_succeeds_from_allowed_state() {
        let store = Store::open_in_memory().unwrap();
        let task = sample_task(TaskStatus::Pending);
        store.insert_task(&task).unwrap();

        let applied = store
            .transition_task(task.id, &[TaskStatus::Pending], |t| {
                t.status = TaskStatus::Claimed;
                t.lamport_ts = 2;
            })
            .unwrap();
        assert!(applied);

        let got = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(got.status, TaskStatus::Claimed);
    }

    #[test]
    fn cas_transition_fails_silently_from_disallowed_state() {
        let store = Store::open_in_memory().unwrap();
        let task = sample_task(TaskStatus::InProgress);
        store.insert_task(&task).unwrap();

        let applied = store
            .transition_task(task.id, &[TaskStatus::Pending], |t| {
                t.status = TaskStatus::Claimed;
            })
            .unwrap();
        assert!(!applied);

        let got = store.get_task(task.id).unwrap().unwrap();
        assert_eq!(got.status, TaskStatus::InProgress);
    }

    #[test]
    fn list_by_status_orders_by_priority_then_age() {
        let store = Store::open_in_memory().unwrap();
        let mut low = sample_task(TaskStatus::Pending);
        low.priority = 1;
        let mut high = sample_task(TaskStatus::Pending);
        high.priority = 10;
        store.insert_task(&low).unwrap();
        store.insert_task(&high).unwrap();

        let pending = store.list_by_status(TaskStatus::Pending).unwrap();
        assert_eq!(pending[0].id, high.id);
    }
}
