//! Agent selection for main dispatch (spec.md §4.3 phase 4): capability
//! filter, project/clone affinity, then round-robin fairness over whatever
//! remains eligible.

use swarm_model::{Agent, Task};

/// `required ⊆ agent.capabilities`, with an empty agent capability list
/// read as "universal" and an empty requirement list as "any agent".
fn capability_ok(task: &Task, agent: &Agent) -> bool {
    if agent.capabilities.is_empty() || task.required_capabilities.is_empty() {
        return true;
    }
    agent.has_capabilities(&task.required_capabilities)
}

fn is_git_url(project_path: &str) -> bool {
    project_path.starts_with("git@") || project_path.contains("://")
}

/// Scores an agent for affinity against the task's project path: higher is
/// better. Filesystem-path tasks prefer an agent already rooted there;
/// git-URL tasks prefer an agent that already has *some* local clone to
/// reuse, since any clone dir beats cloning fresh.
fn affinity_score(task: &Task, agent: &Agent) -> u8 {
    if is_git_url(&task.project_path) {
        if !agent.project_path.is_empty() {
            1
        } else {
            0
        }
    } else if agent.project_path == task.project_path {
        1
    } else {
        0
    }
}

/// Picks an idle, capable agent for `task` from `candidates`, breaking ties
/// by affinity first and then a round-robin index so load spreads evenly
/// across an otherwise-equal eligible set. `fairness_cursor` is advanced by
/// the caller across dispatch cycles.
pub fn pick_agent<'a>(task: &Task, candidates: &'a [Agent], fairness_cursor: usize) -> Option<&'a Agent> {
    let mut eligible: Vec<&Agent> = candidates.iter().filter(|a| capability_ok(task, a)).collect();
    if eligible.is_empty() {
        return None;
    }
    eligible.sort_by(|a, b| affinity_score(task, b).cmp(&affinity_score(task, a)));

    let best_score = affinity_score(task, eligible[0]);
    let top_tier: Vec<&Agent> = eligible.into_iter().take_while(|a| affinity_score(task, a) == best_score).collect();

    let index = fairness_cursor % top_tier.len();
    Some(top_tier[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use swarm_model::AgentStatus;
    use uuid::Uuid;

    fn agent(capabilities: &[&str], project_path: &str) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "a".into(),
            node_id: "n1".into(),
            tool: "claude".into(),
            model: "x".into(),
            capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
            multiplexer_session_id: None,
            project_path: project_path.into(),
            max_concurrent_tasks: 1,
            status: AgentStatus::Idle,
            current_task_id: None,
            last_heartbeat: Utc::now(),
            lamport_ts: 1,
        }
    }

    fn task(required_capabilities: &[&str], project_path: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            work_instructions: String::new(),
            acceptance_criteria: String::new(),
            priority: 0,
            required_capabilities: required_capabilities.iter().map(|s| s.to_string()).collect(),
            project_path: project_path.into(),
            context: String::new(),
            created_by: "n1".into(),
            assigned_agent_id: None,
            assigned_node_id: None,
            result: None,
            error: None,
            progress: None,
            parent_id: None,
            depends_on: vec![],
            status: swarm_model::TaskStatus::Pending,
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
    fn empty_required_capabilities_matches_any_agent() {
        let t = task(&[], "/tmp");
        let a = agent(&[], "/tmp");
        assert!(pick_agent(&t, std::slice::from_ref(&a), 0).is_some());
    }

    #[test]
    fn agent_missing_required_capability_is_excluded() {
        let t = task(&["rust"], "/tmp");
        let a = agent(&["python"], "/tmp");
        assert!(pick_agent(&t, std::slice::from_ref(&a), 0).is_none());
    }

    #[test]
    fn universal_agent_capabilities_match_anything() {
        let t = task(&["rust"], "/tmp");
        let a = agent(&[], "/tmp");
        assert!(pick_agent(&t, std::slice::from_ref(&a), 0).is_some());
    }

    #[test]
    fn affinity_prefers_matching_project_path() {
        let t = task(&[], "/repo/a");
        let matching = agent(&[], "/repo/a");
        let other = agent(&[], "/repo/b");
        let candidates = vec![other, matching.clone()];
        let picked = pick_agent(&t, &candidates, 0).unwrap();
        assert_eq!(picked.id, matching.id);
    }

    #[test]
    fn round_robin_cursor_rotates_within_equal_tier() {
        let t = task(&[], "git://example.com/repo.git");
        let a = agent(&[], "");
        let b = agent(&[], "");
        let candidates = vec![a.clone(), b.clone()];

        let first = pick_agent(&t, &candidates, 0).unwrap().id;
        let second = pick_agent(&t, &candidates, 1).unwrap().id;
        assert_ne!(first, second);
    }
}
