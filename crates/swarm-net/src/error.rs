use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NetError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("dial error: {0}")]
    Dial(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("node already shut down")]
    Shutdown,

    #[error("io error: {0}")]
    Io(String),

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),
}

impl From<std::io::Error> for NetError {
    fn from(e: std::io::Error) -> Self {
        NetError::Io(e.to_string())
    }
}
