use chrono::Utc;
use swarm_model::{Agent, AgentStatus, ReviewStatus, Task, TaskStatus};
use swarm_store::Store;
use uuid::Uuid;

fn new_task(parent_id: Option<Uuid>) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: "build the thing".into(),
        description: String::new(),
        work_instructions: String::new(),
        acceptance_criteria: String::new(),
        priority: 5,
        required_capabilities: vec!["rust".into()],
        project_path: "/tmp/proj".into(),
        context: String::new(),
        created_by: "n1".into(),
        assigned_agent_id: None,
        assigned_node_id: None,
        result: None,
        error: None,
        progress: None,
        parent_id,
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
        created_at: Utc::now(),
        updated_at: Utc::now(),
        claimed_at: None,
        completed_at: None,
        lamport_ts: 1,
    }
}

#[test]
fn task_claim_assign_complete_round_trip() {
    let store = Store::open_in_memory().unwrap();
    let agent = Agent {
        id: Uuid::new_v4(),
        name: "worker-1".into(),
        node_id: "n1".into(),
        tool: "claude".into(),
        model: "x".into(),
        capabilities: vec!["rust".into()],
        multiplexer_session_id: None,
        project_path: "/tmp/proj".into(),
        max_concurrent_tasks: 1,
        status: AgentStatus::Idle,
        current_task_id: None,
        last_heartbeat: Utc::now(),
        lamport_ts: 1,
    };
    store.upsert_agent(&agent).unwrap();

    let task = new_task(None);
    store.insert_task(&task).unwrap();

    let candidates = store.list_idle_agents_with_capabilities(&task.required_capabilities).unwrap();
    assert_eq!(candidates.len(), 1);

    let claimed = store
        .transition_task(task.id, &[TaskStatus::Pending], |t| {
            t.status = TaskStatus::Claimed;
            t.assigned_agent_id = Some(agent.id);
            t.claimed_at = Some(Utc::now());
            t.lamport_ts = 2;
        })
        .unwrap();
    assert!(claimed);

    let in_progress = store
        .transition_task(task.id, &[TaskStatus::Claimed], |t| {
            t.status = TaskStatus::InProgress;
            t.lamport_ts = 3;
        })
        .unwrap();
    assert!(in_progress);

    let completed = store
        .transition_task(task.id, &[TaskStatus::InProgress], |t| {
            t.status = TaskStatus::Completed;
            t.completed_at = Some(Utc::now());
            t.result = Some("done".into());
            t.lamport_ts = 4;
        })
        .unwrap();
    assert!(completed);

    let got = store.get_task(task.id).unwrap().unwrap();
    assert_eq!(got.status, TaskStatus::Completed);
    assert_eq!(got.result.as_deref(), Some("done"));

    let backlog = store.tasks_since(1).unwrap();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].lamport_ts, 4);
}

#[test]
fn subtasks_aggregate_under_their_parent() {
    let store = Store::open_in_memory().unwrap();
    let parent = new_task(None);
    store.insert_task(&parent).unwrap();

    let child_a = new_task(Some(parent.id));
    let child_b = new_task(Some(parent.id));
    store.insert_task(&child_a).unwrap();
    store.insert_task(&child_b).unwrap();

    let children = store.list_by_parent(parent.id).unwrap();
    assert_eq!(children.len(), 2);
}
