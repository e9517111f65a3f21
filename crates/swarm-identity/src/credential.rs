//! Credential issuance and verification. A credential is a signed claim one
//! DID makes about another (or itself); the root of trust is the emperor's
//! self-issued `emperor_trust` credential (spec.md §4.8).

use chrono::{DateTime, Duration, Utc};
use swarm_model::Credential;
use uuid::Uuid;

use crate::error::{IdentityError, IdentityResult};
use crate::keypair::{verify, NodeKeypair};

/// Issue and sign a credential. `lamport_ts` is the caller's fresh tick —
/// credentials are immutable once gossiped, so the timestamp is fixed here.
pub fn issue_credential(
    issuer_did: &str,
    subject_did: &str,
    credential_type: &str,
    claims: serde_json::Map<String, serde_json::Value>,
    validity: Duration,
    signer: &NodeKeypair,
    lamport_ts: u64,
) -> Credential {
    let issued_at = Utc::now();
    let mut cred = Credential {
        id: Uuid::new_v4(),
        issuer_did: issuer_did.to_string(),
        subject_did: subject_did.to_string(),
        credential_type: credential_type.to_string(),
        claims,
        signature_hex: String::new(),
        issued_at,
        expires_at: issued_at + validity,
        lamport_ts,
    };
    cred.signature_hex = signer.sign(&cred.canonical_bytes());
    cred
}

/// Verify a credential's signature against the issuer's known public key
/// and check it has not expired as of `now`. Per spec.md §4.5, an invalid
/// or expired credential is rejected, never silently patched up.
pub fn verify_credential(cred: &Credential, issuer_public_key_hex: &str, now: DateTime<Utc>) -> IdentityResult<()> {
    if cred.is_expired_at(now) {
        return Err(IdentityError::Expired);
    }
    let ok = verify(issuer_public_key_hex, &cred.canonical_bytes(), &cred.signature_hex)?;
    if !ok {
        return Err(IdentityError::BadSignature);
    }
    Ok(())
}
