use rusqlite::{params, OptionalExtension};
use swarm_model::{Agent, AgentStatus};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

fn status_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Starting => "starting",
        AgentStatus::Idle => "idle",
        AgentStatus::Busy => "busy",
        AgentStatus::Waiting => "waiting",
        AgentStatus::Offline => "offline",
    }
}

impl Store {
    pub fn upsert_agent(&self, agent: &Agent) -> StoreResult<()> {
        let data = serde_json::to_string(agent)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO agents (id, data, node_id, status, lamport_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    data = excluded.data, status = excluded.status, lamport_ts = excluded.lamport_ts",
                params![
                    agent.id.to_string(),
                    data,
                    agent.node_id,
                    status_str(agent.status),
                    agent.lamport_ts as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_agent(&self, id: Uuid) -> StoreResult<Option<Agent>> {
        self.with_conn(|conn| {
            let data: Option<String> = conn
                .query_row("SELECT data FROM agents WHERE id = ?1", [id.to_string()], |r| r.get(0))
                .optional()?;
            Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
        })
    }

    pub fn list_agents_by_node(&self, node_id: &str) -> StoreResult<Vec<Agent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM agents WHERE node_id = ?1")?;
            let rows = stmt
                .query_map([node_id], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }

    /// Agents mutated since `lamport_watermark`, for anti-entropy pull sync.
    pub fn agents_since(&self, lamport_watermark: u64) -> StoreResult<Vec<Agent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM agents WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC")?;
            let rows = stmt
                .query_map([lamport_watermark as i64], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }

    pub fn agents_max_lamport_ts(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let max: i64 = conn.query_row("SELECT COALESCE(MAX(lamport_ts), 0) FROM agents", [], |r| r.get(0))?;
            Ok(max as u64)
        })
    }

    pub fn list_idle_agents_with_capabilities(&self, required: &[String]) -> StoreResult<Vec<Agent>> {
        let all = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM agents WHERE status = 'idle'")?;
            let rows = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str::<Agent>(&d).map_err(StoreError::from))
                .collect::<StoreResult<Vec<_>>>()
        })?;
        Ok(all.into_iter().filter(|a| a.has_capabilities(required)).collect())
    }

    /// Compare-and-swap transition for an agent: applies `mutate` iff its
    /// current persisted status is in `allowed_from`. Mirrors
    /// [`Store::transition_task`] — the only seam through which an agent's
    /// `status`/`current_task_id` may change, so "busy iff exactly one
    /// non-terminal task is assigned to it" (spec.md §3) never races.
    pub fn transition_agent(
        &self,
        id: Uuid,
        allowed_from: &[AgentStatus],
        mutate: impl FnOnce(&mut Agent),
    ) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let data: Option<String> = tx
                .query_row("SELECT data FROM agents WHERE id = ?1", [id.to_string()], |r| r.get(0))
                .optional()?;
            let Some(data) = data else {
                return Ok(false);
            };
            let mut agent: Agent = serde_json::from_str(&data)?;
            if !allowed_from.contains(&agent.status) {
                return Ok(false);
            }
            mutate(&mut agent);
            let updated = serde_json::to_string(&agent)?;
            tx.execute(
                "UPDATE agents SET data = ?1, status = ?2, lamport_ts = ?3 WHERE id = ?4",
                params![updated, status_str(agent.status), agent.lamport_ts as i64, id.to_string()],
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

    fn sample_agent(status: AgentStatus) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "a".into(),
            node_id: "n1".into(),
            tool: "claude".into(),
            model: "x".into(),
            capabilities: vec!["rust".into()],
            multiplexer_session_id: None,
            project_path: "/tmp".into(),
            max_concurrent_tasks: 1,
            status,
            current_task_id: None,
            last_heartbeat: Utc::now(),
            lamport_ts: 1,
        }
    }

    #[test]
    fn upsert_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        let agent = sample_agent(AgentStatus::Idle);
        store.upsert_agent(&agent).unwrap();
        let got = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(got.id, agent.id);
    }

    #[test]
    fn idle_filter_respects_capabilities() {
        let store = Store::open_in_memory().unwrap();
        let agent = sample_agent(AgentStatus::Idle);
        store.upsert_agent(&agent).unwrap();
        assert_eq!(store.list_idle_agents_with_capabilities(&["rust".into()]).unwrap().len(), 1);
        assert_eq!(store.list_idle_agents_with_capabilities(&["go".into()]).unwrap().len(), 0);
    }

    #[test]
    fn transition_agent_succeeds_from_allowed_state_and_drops_out_of_the_idle_pool() {
        let store = Store::open_in_memory().unwrap();
        let agent = sample_agent(AgentStatus::Idle);
        store.upsert_agent(&agent).unwrap();
        let task_id = Uuid::new_v4();

        let applied = store
            .transition_agent(agent.id, &[AgentStatus::Idle], |a| {
                a.status = AgentStatus::Busy;
                a.current_task_id = Some(task_id);
                a.lamport_ts = 2;
            })
            .unwrap();
        assert!(applied);

        let got = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(got.status, AgentStatus::Busy);
        assert_eq!(got.current_task_id, Some(task_id));
        assert_eq!(store.list_idle_agents_with_capabilities(&["rust".into()]).unwrap().len(), 0);
    }

    #[test]
    fn transition_agent_fails_silently_from_disallowed_state() {
        let store = Store::open_in_memory().unwrap();
        let agent = sample_agent(AgentStatus::Busy);
        store.upsert_agent(&agent).unwrap();

        let applied = store
            .transition_agent(agent.id, &[AgentStatus::Idle], |a| a.status = AgentStatus::Offline)
            .unwrap();
        assert!(!applied);

        let got = store.get_agent(agent.id).unwrap().unwrap();
        assert_eq!(got.status, AgentStatus::Busy);
    }
}
