use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum size of a task's free-form context blob, mirrored from the
/// wire-protocol payload ceiling so a single oversized task can't blow the
/// framing limit on gossip relay.
pub const MAX_TASK_CONTEXT_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planning,
    Blocked,
    Claimed,
    InProgress,
    WaitingInput,
    PendingReview,
    Merging,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    None,
    Pending,
    Accepted,
    Rejected,
}

/// A unit of work in the replicated queue. Keyed by UUID; at most one
/// record exists per id across the whole swarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub work_instructions: String,
    pub acceptance_criteria: String,
    pub priority: i32,
    pub required_capabilities: Vec<String>,
    pub project_path: String,
    pub context: String,
    pub created_by: String,
    pub assigned_agent_id: Option<Uuid>,
    pub assigned_node_id: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub progress: Option<String>,
    pub parent_id: Option<Uuid>,
    pub depends_on: Vec<Uuid>,
    pub status: TaskStatus,
    pub review_status: ReviewStatus,
    /// Append-only; each rejection appends a `[Rejection N]` marker.
    pub review_feedback: String,
    pub archived: bool,
    pub git_branch: Option<String>,
    pub merge_attempts: u32,
    pub test_command: Option<String>,
    pub auto_merge: bool,
    pub pr_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub claimed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub lamport_ts: u64,
}

impl Task {
    /// Count the `[Rejection N]` markers already present in the feedback
    /// history. The review loop fails a task outright once this reaches 3.
    pub fn rejection_count(&self) -> u32 {
        self.review_feedback.matches("[Rejection ").count() as u32
    }

    pub fn is_blocked_at_birth(depends_on: &[Uuid]) -> bool {
        !depends_on.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            work_instructions: String::new(),
            acceptance_criteria: String::new(),
            priority: 0,
            required_capabilities: vec![],
            project_path: "/tmp".into(),
            context: String::new(),
            created_by: "node-a".into(),
            assigned_agent_id: None,
            assigned_node_id: None,
            result: None,
            error: None,
            progress: None,
            parent_id: None,
            depends_on: vec![],
            status: TaskStatus::Pending,
            review_status: ReviewStatus::None,
            review_feedback: String::new(),
            archived: false,
            git_branch: None,
            merge_attempts: 0,
            test_command: None,
            auto_merge: false,
            pr_url: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            claimed_at: None,
            completed_at: None,
            lamport_ts: 1,
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn rejection_count_counts_markers() {
        let mut t = sample();
        t.review_feedback = "[Rejection 1] fix x\n[Rejection 2] fix y".into();
        assert_eq!(t.rejection_count(), 2);
    }

    #[test]
    fn non_empty_depends_on_is_blocked_at_birth() {
        assert!(Task::is_blocked_at_birth(&[Uuid::new_v4()]));
        assert!(!Task::is_blocked_at_birth(&[]));
    }
}
