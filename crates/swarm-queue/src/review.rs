//! Review and rejection (spec.md §4.2.5). `PendingReview` is a terminal
//! waypoint for the external reviewer: accept completes the task, reject
//! either requeues it with feedback appended to the work instructions or,
//! at the third rejection, fails it outright.

use swarm_model::TaskStatus;
use swarm_model::{LamportClock, ReviewStatus};
use swarm_store::Store;
use uuid::Uuid;

use crate::error::QueueResult;

const REJECTION_LIMIT: u32 = 3;

/// Reviewer accepted the task's completion.
pub fn accept_review(store: &Store, clock: &LamportClock, task_id: Uuid, feedback: &str) -> QueueResult<bool> {
    let now = chrono::Utc::now();
    let ts = clock.tick();
    let feedback = feedback.to_string();
    store.transition_task(task_id, &[TaskStatus::PendingReview], move |task| {
        task.status = TaskStatus::Completed;
        task.review_status = ReviewStatus::Accepted;
        task.review_feedback = feedback;
        task.completed_at = Some(now);
        task.updated_at = now;
        task.lamport_ts = ts;
    })
}

/// Reviewer rejected the task. Below [`REJECTION_LIMIT`] the task is
/// requeued to `Pending` with the feedback appended to its work
/// instructions; at the limit it fails outright.
pub fn reject_review(store: &Store, clock: &LamportClock, task_id: Uuid, feedback: &str) -> QueueResult<bool> {
    let now = chrono::Utc::now();
    let ts = clock.tick();
    let feedback = feedback.to_string();
    store.transition_task(task_id, &[TaskStatus::PendingReview], move |task| {
        let rejection_number = task.rejection_count() + 1;
        let marker = format!("[Rejection {rejection_number}] {feedback}\n");
        task.review_feedback.push_str(&marker);
        task.review_status = ReviewStatus::Rejected;
        task.updated_at = now;
        task.lamport_ts = ts;

        if rejection_number >= REJECTION_LIMIT {
            task.status = TaskStatus::Failed;
            task.error = Some(format!("Rejected {REJECTION_LIMIT} times"));
            task.completed_at = Some(now);
        } else {
            task.status = TaskStatus::Pending;
            task.work_instructions.push_str("\n\n");
            task.work_instructions.push_str(&marker);
            task.assigned_agent_id = None;
            task.assigned_node_id = None;
            task.claimed_at = None;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::{create_task, NewTask};

    fn pending_review_task(store: &Store, clock: &LamportClock) -> Uuid {
        let task = create_task(
            store,
            clock,
            NewTask {
                acceptance_criteria: "must pass".into(),
                ..Default::default()
            },
        )
        .unwrap();
        store
            .transition_task(task.id, &[TaskStatus::Pending], |t| t.status = TaskStatus::PendingReview)
            .unwrap();
        task.id
    }

    #[test]
    fn accept_completes_the_task() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let id = pending_review_task(&store, &clock);

        assert!(accept_review(&store, &clock, id, "looks good").unwrap());
        let got = store.get_task(id).unwrap().unwrap();
        assert_eq!(got.status, TaskStatus::Completed);
        assert_eq!(got.review_feedback, "looks good");
    }

    #[test]
    fn first_rejection_requeues_to_pending_with_feedback() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let id = pending_review_task(&store, &clock);

        assert!(reject_review(&store, &clock, id, "missing tests").unwrap());
        let got = store.get_task(id).unwrap().unwrap();
        assert_eq!(got.status, TaskStatus::Pending);
        assert!(got.review_feedback.contains("[Rejection 1]"));
        assert!(got.work_instructions.contains("missing tests"));
        assert_eq!(got.rejection_count(), 1);
    }

    #[test]
    fn third_rejection_fails_the_task() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let id = pending_review_task(&store, &clock);

        for _ in 0..2 {
            reject_review(&store, &clock, id, "still broken").unwrap();
            store
                .transition_task(id, &[TaskStatus::Pending], |t| t.status = TaskStatus::PendingReview)
                .unwrap();
        }
        reject_review(&store, &clock, id, "still broken").unwrap();

        let got = store.get_task(id).unwrap().unwrap();
        assert_eq!(got.status, TaskStatus::Failed);
        assert_eq!(got.rejection_count(), 3);
    }
}
