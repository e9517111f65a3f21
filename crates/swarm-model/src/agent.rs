use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Idle,
    Busy,
    Waiting,
    Offline,
}

/// A worker process attached to exactly one node. `offline` is a local
/// derivation (heartbeat timeout) and is never gossiped — peers simply stop
/// hearing about the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub node_id: String,
    pub tool: String,
    pub model: String,
    pub capabilities: Vec<String>,
    pub multiplexer_session_id: Option<String>,
    pub project_path: String,
    pub max_concurrent_tasks: u32,
    pub status: AgentStatus,
    pub current_task_id: Option<Uuid>,
    pub last_heartbeat: chrono::DateTime<chrono::Utc>,
    pub lamport_ts: u64,
}

impl Agent {
    pub fn is_busy(&self) -> bool {
        matches!(self.status, AgentStatus::Busy) && self.current_task_id.is_some()
    }

    pub fn has_capabilities(&self, required: &[String]) -> bool {
        required.iter().all(|r| self.capabilities.iter().any(|c| c == r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "a".into(),
            node_id: "n".into(),
            tool: "claude".into(),
            model: "x".into(),
            capabilities: vec!["rust".into(), "python".into()],
            multiplexer_session_id: None,
            project_path: "/tmp".into(),
            max_concurrent_tasks: 1,
            status: AgentStatus::Idle,
            current_task_id: None,
            last_heartbeat: chrono::Utc::now(),
            lamport_ts: 1,
        }
    }

    #[test]
    fn has_capabilities_requires_all() {
        let a = sample();
        assert!(a.has_capabilities(&["rust".into()]));
        assert!(!a.has_capabilities(&["go".into()]));
    }

    #[test]
    fn busy_requires_status_and_task() {
        let mut a = sample();
        a.status = AgentStatus::Busy;
        assert!(!a.is_busy());
        a.current_task_id = Some(Uuid::new_v4());
        assert!(a.is_busy());
    }
}
