use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("store error: {0}")]
    Store(#[from] swarm_store::StoreError),

    #[error("task not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("dependency cycle detected starting at {0}")]
    DependencyCycle(uuid::Uuid),
}

pub type QueueResult<T> = Result<T, QueueError>;
