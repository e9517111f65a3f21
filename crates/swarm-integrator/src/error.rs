use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegratorError {
    #[error("queue error: {0}")]
    Queue(#[from] swarm_queue::QueueError),

    #[error("store error: {0}")]
    Store(#[from] swarm_store::StoreError),

    #[error("parent task {0} not found")]
    ParentNotFound(uuid::Uuid),

    #[error("git operation failed: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IntegratorResult<T> = Result<T, IntegratorError>;
