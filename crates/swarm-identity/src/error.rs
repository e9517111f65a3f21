use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("store error: {0}")]
    Store(#[from] swarm_store::StoreError),

    #[error("signature verification failed")]
    BadSignature,

    #[error("unknown issuer did: {0}")]
    UnknownIssuer(String),

    #[error("credential expired")]
    Expired,

    #[error("challenge is stale")]
    StaleChallenge,

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("malformed key material")]
    MalformedKey,
}

pub type IdentityResult<T> = Result<T, IdentityError>;
