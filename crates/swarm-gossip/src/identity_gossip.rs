//! Identity and credential gossip (spec.md §4.5, §4.8). Identity
//! announcements are LWW-merged like any other record. Credentials carry
//! their own signature, so a receiver verifies it against the issuer's
//! known public key before accepting — an issuer we haven't heard of yet,
//! or a signature that doesn't check out, results in the credential being
//! dropped silently rather than stored unverified.

use chrono::Utc;
use swarm_model::{Credential, IdentityRecord, LamportClock};
use swarm_net::{tag, NetHandle};
use swarm_store::Store;

use crate::error::GossipResult;
use crate::seen::SeenMessages;

pub async fn broadcast_identity_announce(
    net: &NetHandle,
    seen: &mut SeenMessages,
    record: &IdentityRecord,
) -> GossipResult<()> {
    seen.mark(&format!("identity:{}:{}", record.did, record.lamport_ts));
    net.broadcast(tag::IDENTITY_ANNOUNCE, serde_json::to_value(record)?, None).await?;
    Ok(())
}

pub async fn broadcast_credential(net: &NetHandle, seen: &mut SeenMessages, cred: &Credential) -> GossipResult<()> {
    seen.mark(&format!("credential:{}", cred.id));
    net.broadcast(tag::CREDENTIAL_ISSUE, serde_json::to_value(cred)?, None).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityGossipOutcome {
    Duplicate,
    IdentityApplied,
    CredentialAccepted,
    CredentialRejected,
    Ignored,
}

pub fn handle_identity_frame(
    store: &Store,
    clock: &LamportClock,
    seen: &mut SeenMessages,
    msg_type: u8,
    payload: serde_json::Value,
) -> GossipResult<IdentityGossipOutcome> {
    match msg_type {
        tag::IDENTITY_ANNOUNCE => {
            let incoming: IdentityRecord = serde_json::from_value(payload)?;
            let key = format!("identity:{}:{}", incoming.did, incoming.lamport_ts);
            if seen.contains(&key) {
                return Ok(IdentityGossipOutcome::Duplicate);
            }
            seen.mark(&key);
            clock.witness(incoming.lamport_ts);

            let should_apply = match store.get_identity(&incoming.did)? {
                None => true,
                Some(current) => incoming.lamport_ts > current.lamport_ts,
            };
            if should_apply {
                store.upsert_identity(&incoming)?;
            }
            Ok(IdentityGossipOutcome::IdentityApplied)
        }
        tag::CREDENTIAL_ISSUE => {
            let cred: Credential = serde_json::from_value(payload)?;
            let key = format!("credential:{}", cred.id);
            if seen.contains(&key) {
                return Ok(IdentityGossipOutcome::Duplicate);
            }
            seen.mark(&key);
            clock.witness(cred.lamport_ts);

            let Some(issuer) = store.get_identity(&cred.issuer_did)? else {
                tracing::debug!(issuer = %cred.issuer_did, "dropping credential from unknown issuer");
                return Ok(IdentityGossipOutcome::CredentialRejected);
            };
            if cred.is_expired_at(Utc::now()) {
                return Ok(IdentityGossipOutcome::CredentialRejected);
            }
            match swarm_identity::verify(&issuer.public_key_hex, &cred.canonical_bytes(), &cred.signature_hex) {
                Ok(true) => {
                    store.insert_credential(&cred)?;
                    Ok(IdentityGossipOutcome::CredentialAccepted)
                }
                _ => {
                    tracing::debug!(issuer = %cred.issuer_did, "dropping credential with invalid signature");
                    Ok(IdentityGossipOutcome::CredentialRejected)
                }
            }
        }
        _ => Ok(IdentityGossipOutcome::Ignored),
    }
}
