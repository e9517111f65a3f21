//! Merge-test-retry procedure (spec.md §4.4). Runs once per parent task
//! that reaches `Merging`; safe to re-run on restart since every step is
//! driven by CAS — a succeeding peer simply wins the race and this call
//! reports [`IntegrationOutcome::LostRace`].

use std::path::Path;

use chrono::Utc;
use swarm_model::{LamportClock, TaskStatus};
use swarm_store::Store;
use uuid::Uuid;

use crate::collaborator::GitCollaborator;
use crate::error::{IntegratorError, IntegratorResult};
use crate::git::{run_test_command, GitOps, MergeOutcome};

/// Parent fails outright once merge attempts exceed this (spec.md §4.4
/// step 1).
pub const MAX_MERGE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// One or more subtask branches conflicted; those subtasks were
    /// requeued and the parent returned to `InProgress`.
    MergeConflict { requeued: Vec<Uuid> },
    /// The test command failed; every completed subtask was requeued.
    TestFailed { requeued: Vec<Uuid> },
    /// Integration succeeded; the parent is `Completed` with `pr_url` set
    /// if a pull request was opened.
    Completed { pr_url: Option<String> },
    /// Merge attempts exceeded [`MAX_MERGE_ATTEMPTS`]; the parent is
    /// `Failed`.
    MaxAttemptsExceeded,
    /// A concurrent integrator already handled this parent, or it was no
    /// longer in `Merging` when we looked.
    LostRace,
}

pub async fn integrate_parent(
    store: &Store,
    clock: &LamportClock,
    parent_id: Uuid,
    workbench_root: &Path,
    collaborator: &dyn GitCollaborator,
) -> IntegratorResult<IntegrationOutcome> {
    let Some(parent) = store.get_task(parent_id)? else {
        return Err(IntegratorError::ParentNotFound(parent_id));
    };
    if parent.status != TaskStatus::Merging {
        return Ok(IntegrationOutcome::LostRace);
    }

    // Step 1: atomically increment merge-attempts.
    let mut attempts = 0u32;
    let incremented = store.transition_task(parent_id, &[TaskStatus::Merging], |t| {
        t.merge_attempts += 1;
        attempts = t.merge_attempts;
        t.updated_at = Utc::now();
    })?;
    if !incremented {
        return Ok(IntegrationOutcome::LostRace);
    }
    if attempts > MAX_MERGE_ATTEMPTS {
        let ts = clock.tick();
        store.transition_task(parent_id, &[TaskStatus::Merging], |t| {
            t.status = TaskStatus::Failed;
            t.error = Some("Max merge attempts exceeded".into());
            t.completed_at = Some(Utc::now());
            t.updated_at = Utc::now();
            t.lamport_ts = ts;
        })?;
        return Ok(IntegrationOutcome::MaxAttemptsExceeded);
    }

    let siblings = store.list_by_parent(parent_id)?;
    let branched: Vec<_> = siblings
        .iter()
        .filter(|s| s.status == TaskStatus::Completed && s.git_branch.is_some())
        .collect();

    let git = GitOps::new(workbench_root.to_path_buf());
    let prefix: String = parent_id.to_string().chars().take(8).collect();
    let worktree = git.ensure_integration_worktree(workbench_root, &prefix).await?;

    // Step 3: merge each subtask branch in order.
    for sibling in &branched {
        let branch = sibling.git_branch.as_deref().unwrap();
        match git.merge_branch(&worktree, branch).await? {
            MergeOutcome::Clean => continue,
            MergeOutcome::Conflict { output } => {
                let ts = clock.tick();
                store.transition_task(sibling.id, &[TaskStatus::Completed], |t| {
                    t.status = TaskStatus::Pending;
                    t.review_feedback
                        .push_str(&format!("\n## Merge Conflict (attempt {attempts})\n{output}\n"));
                    t.updated_at = Utc::now();
                    t.lamport_ts = ts;
                })?;
                let parent_ts = clock.tick();
                store.transition_task(parent_id, &[TaskStatus::Merging], |t| {
                    t.status = TaskStatus::InProgress;
                    t.updated_at = Utc::now();
                    t.lamport_ts = parent_ts;
                })?;
                return Ok(IntegrationOutcome::MergeConflict { requeued: vec![sibling.id] });
            }
        }
    }

    // Step 4: run the configured test command.
    let test_command = parent.test_command.as_deref();
    let test_outcome = run_test_command(&worktree, test_command).await?;
    if !test_outcome.success {
        let mut requeued = Vec::new();
        for sibling in &branched {
            let ts = clock.tick();
            let applied = store.transition_task(sibling.id, &[TaskStatus::Completed], |t| {
                t.status = TaskStatus::Pending;
                t.review_feedback
                    .push_str(&format!("\n## Test Failure (attempt {attempts})\n{}\n", test_outcome.output));
                t.updated_at = Utc::now();
                t.lamport_ts = ts;
            })?;
            if applied {
                requeued.push(sibling.id);
            }
        }
        let parent_ts = clock.tick();
        store.transition_task(parent_id, &[TaskStatus::Merging], |t| {
            t.status = TaskStatus::InProgress;
            t.updated_at = Utc::now();
            t.lamport_ts = parent_ts;
        })?;
        return Ok(IntegrationOutcome::TestFailed { requeued });
    }

    // Step 5: push and optionally open a PR.
    git.push(&worktree).await?;
    let pr_url = if parent.auto_merge {
        None
    } else {
        collaborator
            .open_pull_request(&worktree.branch, &parent.title)
            .await
            .unwrap_or(None)
    };

    let ts = clock.tick();
    store.transition_task(parent_id, &[TaskStatus::Merging], |t| {
        t.status = TaskStatus::Completed;
        t.pr_url = pr_url.clone();
        t.completed_at = Some(Utc::now());
        t.updated_at = Utc::now();
        t.lamport_ts = ts;
    })?;

    Ok(IntegrationOutcome::Completed { pr_url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    use swarm_queue::{create_task, NewTask};
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("git available in test environment");
        assert!(status.success(), "git {args:?} failed in {dir:?}");
    }

    /// A work repo with an `origin` remote pointed at a local bare repo, one
    /// commit on its default branch already pushed.
    fn init_repo_with_origin() -> (TempDir, TempDir) {
        let origin = TempDir::new().unwrap();
        git(origin.path(), &["init", "--bare", "-q"]);

        let work = TempDir::new().unwrap();
        git(work.path(), &["init", "-q", "-b", "main"]);
        git(work.path(), &["config", "user.email", "swarm@example.com"]);
        git(work.path(), &["config", "user.name", "swarm"]);
        std::fs::write(work.path().join("README.md"), "base\n").unwrap();
        git(work.path(), &["add", "."]);
        git(work.path(), &["commit", "-q", "-m", "initial"]);
        git(work.path(), &["remote", "add", "origin", origin.path().to_str().unwrap()]);
        git(work.path(), &["push", "-q", "origin", "main"]);

        (origin, work)
    }

    fn branch_with_file(work: &Path, branch: &str, file: &str, contents: &str) {
        git(work, &["checkout", "-q", "-b", branch, "main"]);
        std::fs::write(work.join(file), contents).unwrap();
        git(work, &["add", "."]);
        let message = format!("work on {branch}");
        git(work, &["commit", "-q", "-m", message.as_str()]);
        git(work, &["checkout", "-q", "main"]);
    }

    fn merging_parent_with_subtask(store: &Store, clock: &LamportClock, branch: &str) -> (Uuid, Uuid) {
        let parent = create_task(store, clock, NewTask { has_planner: true, ..Default::default() }).unwrap();
        store.transition_task(parent.id, &[TaskStatus::Planning], |t| t.status = TaskStatus::Merging).unwrap();

        let child = create_task(store, clock, NewTask { parent_id: Some(parent.id), ..Default::default() }).unwrap();
        store
            .transition_task(child.id, &[TaskStatus::Pending], |t| {
                t.status = TaskStatus::Completed;
                t.git_branch = Some(branch.to_string());
            })
            .unwrap();

        (parent.id, child.id)
    }

    #[tokio::test]
    async fn merge_attempts_exceeding_cap_fails_the_parent() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let (parent_id, _child_id) = merging_parent_with_subtask(&store, &clock, "feature/unused");
        store
            .transition_task(parent_id, &[TaskStatus::Merging], |t| t.merge_attempts = MAX_MERGE_ATTEMPTS)
            .unwrap();

        let outcome = integrate_parent(&store, &clock, parent_id, Path::new("/nonexistent"), &crate::NoopCollaborator)
            .await
            .unwrap();

        assert_eq!(outcome, IntegrationOutcome::MaxAttemptsExceeded);
        let parent = store.get_task(parent_id).unwrap().unwrap();
        assert_eq!(parent.status, TaskStatus::Failed);
        assert_eq!(parent.error.as_deref(), Some("Max merge attempts exceeded"));
    }

    #[tokio::test]
    async fn conflicting_branch_is_requeued_and_parent_returns_to_in_progress() {
        let (_origin, work) = init_repo_with_origin();
        branch_with_file(work.path(), "feature/a", "README.md", "branch a change\n");
        std::fs::write(work.path().join("README.md"), "main diverges too\n").unwrap();
        git(work.path(), &["add", "."]);
        git(work.path(), &["commit", "-q", "-m", "main diverges"]);

        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let (parent_id, child_id) = merging_parent_with_subtask(&store, &clock, "feature/a");

        let outcome = integrate_parent(&store, &clock, parent_id, work.path(), &crate::NoopCollaborator)
            .await
            .unwrap();

        match outcome {
            IntegrationOutcome::MergeConflict { requeued } => assert_eq!(requeued, vec![child_id]),
            other => panic!("expected a merge conflict, got {other:?}"),
        }

        let parent = store.get_task(parent_id).unwrap().unwrap();
        assert_eq!(parent.status, TaskStatus::InProgress);
        assert_eq!(parent.merge_attempts, 1);

        let child = store.get_task(child_id).unwrap().unwrap();
        assert_eq!(child.status, TaskStatus::Pending);
        assert!(child.review_feedback.contains("Merge Conflict (attempt 1)"));
    }

    #[tokio::test]
    async fn clean_merge_pushes_and_completes_the_parent() {
        let (origin, work) = init_repo_with_origin();
        branch_with_file(work.path(), "feature/b", "feature.txt", "new file\n");

        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let (parent_id, child_id) = merging_parent_with_subtask(&store, &clock, "feature/b");

        let outcome = integrate_parent(&store, &clock, parent_id, work.path(), &crate::NoopCollaborator)
            .await
            .unwrap();

        assert_eq!(outcome, IntegrationOutcome::Completed { pr_url: None });
        let parent = store.get_task(parent_id).unwrap().unwrap();
        assert_eq!(parent.status, TaskStatus::Completed);
        assert!(parent.completed_at.is_some());

        // Subtask itself is untouched by the success path (no requeue).
        let child = store.get_task(child_id).unwrap().unwrap();
        assert_eq!(child.status, TaskStatus::Completed);

        // The integration branch actually landed in the "origin" bare repo.
        let prefix: String = parent_id.to_string().chars().take(8).collect();
        let branch_ref = format!("integrate/{prefix}");
        let branches = Command::new("git")
            .args(["branch", "--list", branch_ref.as_str()])
            .current_dir(origin.path())
            .output()
            .unwrap();
        assert!(String::from_utf8_lossy(&branches.stdout).contains(&prefix));
    }

    #[tokio::test]
    async fn failing_test_command_requeues_with_a_test_failure_heading_not_a_merge_conflict_one() {
        let (_origin, work) = init_repo_with_origin();
        branch_with_file(work.path(), "feature/c", "feature.txt", "new file\n");

        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let (parent_id, child_id) = merging_parent_with_subtask(&store, &clock, "feature/c");
        store
            .transition_task(parent_id, &[TaskStatus::Merging], |t| t.test_command = Some("exit 1".into()))
            .unwrap();

        let outcome = integrate_parent(&store, &clock, parent_id, work.path(), &crate::NoopCollaborator)
            .await
            .unwrap();

        match outcome {
            IntegrationOutcome::TestFailed { requeued } => assert_eq!(requeued, vec![child_id]),
            other => panic!("expected a test failure, got {other:?}"),
        }
        let parent = store.get_task(parent_id).unwrap().unwrap();
        assert_eq!(parent.status, TaskStatus::InProgress);

        let child = store.get_task(child_id).unwrap().unwrap();
        assert_eq!(child.status, TaskStatus::Pending);
        assert!(child.review_feedback.contains("## Test Failure (attempt 1)"));
        assert!(!child.review_feedback.contains("Merge Conflict"));
    }

    #[tokio::test]
    async fn a_parent_no_longer_in_merging_loses_the_race() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let parent = create_task(&store, &clock, NewTask::default()).unwrap();

        let outcome = integrate_parent(&store, &clock, parent.id, Path::new("/nonexistent"), &crate::NoopCollaborator)
            .await
            .unwrap();
        assert_eq!(outcome, IntegrationOutcome::LostRace);
    }
}
