use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("queue error: {0}")]
    Queue(#[from] swarm_queue::QueueError),

    #[error("store error: {0}")]
    Store(#[from] swarm_store::StoreError),

    #[error("net error: {0}")]
    Net(#[from] swarm_net::NetError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("local delivery failed: {0}")]
    Delivery(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
