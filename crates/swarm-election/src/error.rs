use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error("net error: {0}")]
    Net(#[from] swarm_net::NetError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type ElectionResult<T> = Result<T, ElectionError>;
