//! Decentralized identity for a swarm node: an Ed25519 keypair, a DID
//! derived from it, signed credentials, and challenge-response peer
//! authentication.
//!
//! The keypair's secret never leaves [`keypair::NodeKeypair`] except as a
//! signature — every other module only ever sees `sign`/`public_key`.

pub mod auth;
pub mod challenge;
pub mod credential;
pub mod did;
pub mod error;
pub mod export;
pub mod keypair;

pub use auth::VerifiedPeers;
pub use challenge::{Challenge, ChallengeStore, CHALLENGE_FRESHNESS_WINDOW, CHALLENGE_TTL};
pub use credential::{issue_credential, verify_credential};
pub use did::{load_or_generate, NodeIdentity};
pub use error::{IdentityError, IdentityResult};
pub use export::{export_identity, import_identity, IdentityDocument};
pub use keypair::{verify, NodeKeypair};
