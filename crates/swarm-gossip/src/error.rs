use thiserror::Error;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("store error: {0}")]
    Store(#[from] swarm_store::StoreError),

    #[error("net error: {0}")]
    Net(#[from] swarm_net::NetError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type GossipResult<T> = Result<T, GossipError>;
