#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Store(#[from] swarm_store::StoreError),
    #[error(transparent)]
    Net(#[from] swarm_net::NetError),
    #[error(transparent)]
    Queue(#[from] swarm_queue::QueueError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
