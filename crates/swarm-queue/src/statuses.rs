use swarm_model::TaskStatus;

/// Every non-terminal status a task can be CAS'd out of. Shared by the
/// "accept with warning" fallback path (reports, reviews, aggregation) so a
/// mutation is always blocked from landing on an already-terminal task.
pub const ALL_NON_TERMINAL: &[TaskStatus] = &[
    TaskStatus::Pending,
    TaskStatus::Planning,
    TaskStatus::Blocked,
    TaskStatus::Claimed,
    TaskStatus::InProgress,
    TaskStatus::WaitingInput,
    TaskStatus::PendingReview,
    TaskStatus::Merging,
];
