//! Wires post-HELLO challenge-response peer authentication (spec.md §4.8)
//! to a live `swarm_net::NetHandle`. The numerically lower node-id issues
//! the challenge as soon as a peer connects — mirroring the transport's own
//! lower-id-keeps-outbound tiebreak, so only one side ever issues — the
//! other side signs and replies, and the issuer verifies against the
//! public key in its identity store before marking the edge verified.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use swarm_net::{tag, NetEvent, NetHandle};
use swarm_store::Store;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::challenge::{respond, verify_response, Challenge, ChallengeStore, CHALLENGE_TTL};
use crate::did::NodeIdentity;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponsePayload {
    challenge: Challenge,
    signature_hex: String,
    did: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RejectPayload {
    reason: String,
}

/// Shared, clone-able view of which peers have completed challenge-response
/// so far. Authorisation checks elsewhere (credential issuance, gossip
/// acceptance) can consult this before trusting a connection.
#[derive(Clone, Default)]
pub struct VerifiedPeers {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl VerifiedPeers {
    pub fn is_verified(&self, node_id: &str) -> bool {
        self.inner.lock().expect("verified-peers mutex poisoned").contains(node_id)
    }

    fn mark(&self, node_id: &str) {
        self.inner.lock().expect("verified-peers mutex poisoned").insert(node_id.to_string());
    }

    fn forget(&self, node_id: &str) {
        self.inner.lock().expect("verified-peers mutex poisoned").remove(node_id);
    }
}

/// Spawns the auth loop. Returns a [`VerifiedPeers`] handle other modules
/// can poll; the loop itself runs for the lifetime of the process.
pub fn spawn(net: NetHandle, store: Arc<Store>, identity: Arc<NodeIdentity>, local_node_id: String) -> VerifiedPeers {
    let verified = VerifiedPeers::default();
    let handle = verified.clone();

    tokio::spawn(async move {
        let mut events = net.subscribe();
        let mut pending = ChallengeStore::new();
        let mut sweeper = interval(CHALLENGE_TTL);

        loop {
            tokio::select! {
                _ = sweeper.tick() => pending.sweep_expired(),
                event = events.recv() => {
                    let Ok(event) = event else { break };
                    match event {
                        NetEvent::PeerConnected { node_id } => {
                            if local_node_id < node_id {
                                let challenge = pending.issue(node_id.clone());
                                if let Ok(payload) = serde_json::to_value(&challenge) {
                                    let _ = net.send_to(node_id, tag::AUTH_CHALLENGE, payload).await;
                                }
                            }
                        }
                        NetEvent::PeerDisconnected { node_id } => verified.forget(&node_id),
                        NetEvent::Message { from, msg_type: tag::AUTH_CHALLENGE, payload } => {
                            let Ok(challenge) = serde_json::from_value::<Challenge>(payload) else { continue };
                            let signature_hex = respond(&challenge, &identity.keypair);
                            let response = ResponsePayload {
                                challenge,
                                signature_hex,
                                did: identity.did().to_string(),
                            };
                            if let Ok(payload) = serde_json::to_value(&response) {
                                let _ = net.send_to(from, tag::AUTH_RESPONSE, payload).await;
                            }
                        }
                        NetEvent::Message { from, msg_type: tag::AUTH_RESPONSE, payload } => {
                            let Ok(response) = serde_json::from_value::<ResponsePayload>(payload) else { continue };
                            let Some(issued) = pending.take(&from) else {
                                debug!(%from, "AUTH_RESPONSE with no outstanding challenge, dropping");
                                continue;
                            };
                            if issued != response.challenge {
                                debug!(%from, "AUTH_RESPONSE challenge mismatch, dropping");
                                continue;
                            }
                            let known_key = match store.get_identity(&response.did) {
                                Ok(Some(record)) => Some(record.public_key_hex),
                                Ok(None) => None,
                                Err(e) => {
                                    warn!(%from, error = %e, "identity store lookup failed during auth");
                                    None
                                }
                            };
                            let Some(public_key_hex) = known_key else {
                                debug!(%from, did = %response.did, "no known public key for claimed did yet, deferring");
                                continue;
                            };
                            match verify_response(&response.challenge, &response.signature_hex, &public_key_hex, chrono::Utc::now()) {
                                Ok(()) => {
                                    info!(%from, did = %response.did, "peer identity verified");
                                    verified.mark(&from);
                                }
                                Err(e) => {
                                    warn!(%from, error = %e, "peer failed challenge-response auth");
                                    let reject = RejectPayload { reason: e.to_string() };
                                    if let Ok(payload) = serde_json::to_value(&reject) {
                                        let _ = net.send_to(from, tag::AUTH_REJECT, payload).await;
                                    }
                                }
                            }
                        }
                        NetEvent::Message { from, msg_type: tag::AUTH_REJECT, payload } => {
                            if let Ok(reject) = serde_json::from_value::<RejectPayload>(payload) {
                                warn!(%from, reason = %reject.reason, "our challenge response was rejected");
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    });

    handle
}
