//! Post-HELLO challenge-response peer authentication (spec.md §4.8).
//!
//! One side issues a [`Challenge`] with a fresh 16-byte nonce; the other
//! side signs the canonical challenge string and returns the signature plus
//! its claimed DID. The verifier checks freshness, nonce pending-ness, and
//! the signature before marking the connection identity-verified.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, IdentityResult};
use crate::keypair::{verify, NodeKeypair};

/// A signature is only accepted within this window of the challenge being
/// issued (spec.md §4.8: "≤ 5 min window").
pub const CHALLENGE_FRESHNESS_WINDOW: Duration = Duration::minutes(5);

/// Pending challenges are swept after this long regardless of freshness
/// checks on the signature itself (spec.md §5's "absolute TTLs").
pub const CHALLENGE_TTL: StdDuration = StdDuration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Challenge {
    pub nonce_hex: String,
    pub issued_at: DateTime<Utc>,
}

impl Challenge {
    pub fn new() -> Self {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            nonce_hex: hex::encode(nonce),
            issued_at: Utc::now(),
        }
    }

    /// The exact bytes a responder signs: nonce concatenated with the
    /// issue timestamp, so a replayed signature from a different issuance
    /// can't be confused with a fresh one.
    pub fn canonical_string(&self) -> String {
        format!("{}:{}", self.nonce_hex, self.issued_at.to_rfc3339())
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.issued_at) <= CHALLENGE_FRESHNESS_WINDOW
    }
}

impl Default for Challenge {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign a challenge as the responding side of the handshake.
pub fn respond(challenge: &Challenge, responder: &NodeKeypair) -> String {
    responder.sign(challenge.canonical_string().as_bytes())
}

/// Verify a response: freshness, then signature against the claimed
/// issuer's known public key.
pub fn verify_response(
    challenge: &Challenge,
    signature_hex: &str,
    responder_public_key_hex: &str,
    now: DateTime<Utc>,
) -> IdentityResult<()> {
    if !challenge.is_fresh_at(now) {
        return Err(IdentityError::StaleChallenge);
    }
    let ok = verify(responder_public_key_hex, challenge.canonical_string().as_bytes(), signature_hex)?;
    if !ok {
        return Err(IdentityError::BadSignature);
    }
    Ok(())
}

/// Tracks challenges this node has issued and is waiting on a response
/// for, keyed by peer node-id. Swept periodically on [`CHALLENGE_TTL`] so a
/// peer that never responds doesn't leak memory.
#[derive(Default)]
pub struct ChallengeStore {
    pending: HashMap<String, (Challenge, std::time::Instant)>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, peer_node_id: impl Into<String>) -> Challenge {
        let challenge = Challenge::new();
        self.pending
            .insert(peer_node_id.into(), (challenge.clone(), std::time::Instant::now()));
        challenge
    }

    /// Take back the pending challenge for a peer, if one is outstanding.
    /// Consumes it — a response can only be checked against it once.
    pub fn take(&mut self, peer_node_id: &str) -> Option<Challenge> {
        self.pending.remove(peer_node_id).map(|(c, _)| c)
    }

    pub fn sweep_expired(&mut self) {
        let now = std::time::Instant::now();
        self.pending.retain(|_, (_, issued)| now.duration_since(*issued) < CHALLENGE_TTL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_response_verifies() {
        let responder = NodeKeypair::generate();
        let challenge = Challenge::new();
        let sig = respond(&challenge, &responder);
        verify_response(&challenge, &sig, &responder.public_key_hex(), Utc::now()).unwrap();
    }

    #[test]
    fn stale_challenge_is_rejected() {
        let responder = NodeKeypair::generate();
        let challenge = Challenge::new();
        let sig = respond(&challenge, &responder);
        let later = Utc::now() + Duration::minutes(6);
        let err = verify_response(&challenge, &sig, &responder.public_key_hex(), later).unwrap_err();
        assert!(matches!(err, IdentityError::StaleChallenge));
    }

    #[test]
    fn wrong_signer_is_rejected() {
        let responder = NodeKeypair::generate();
        let impostor = NodeKeypair::generate();
        let challenge = Challenge::new();
        let sig = respond(&challenge, &impostor);
        let err = verify_response(&challenge, &sig, &responder.public_key_hex(), Utc::now()).unwrap_err();
        assert!(matches!(err, IdentityError::BadSignature));
    }

    #[test]
    fn challenge_store_take_consumes_it() {
        let mut store = ChallengeStore::new();
        store.issue("peer-a");
        assert!(store.take("peer-a").is_some());
        assert!(store.take("peer-a").is_none());
    }

    #[test]
    fn nonce_is_unique_per_issuance() {
        let a = Challenge::new();
        let b = Challenge::new();
        assert_ne!(a.nonce_hex, b.nonce_hex);
    }
}
