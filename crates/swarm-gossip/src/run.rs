//! Wires every gossip sub-module to a live [`swarm_net::NetHandle`]: a
//! single event loop dispatches incoming frames to the task/agent/identity
//! handlers, re-floods whatever they say to forward, and drives the pull
//! anti-entropy timer (spec.md §4.5).

use std::sync::Arc;
use std::time::Duration;

use swarm_model::LamportClock;
use swarm_net::{tag, NetEvent, NetHandle};
use swarm_store::Store;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::interval;
use tracing::warn;

use crate::agent_gossip::{handle_agent_frame, AgentGossipOutcome};
use crate::anti_entropy::{apply_sync_response, build_sync_response, initiate_sync, SyncResponse, Watermarks};
use crate::identity_gossip::handle_identity_frame;
use crate::seen::SeenMessages;
use crate::tombstone::TombstoneTracker;
use crate::task_gossip::{handle_task_frame, TaskGossipOutcome};

/// How often each node initiates a pull anti-entropy round with a random
/// peer (spec.md §4.5: "every 30-60 s").
const ANTI_ENTROPY_INTERVAL: Duration = Duration::from_secs(45);
const TOMBSTONE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const SEEN_CAPACITY: usize = 10_000;

fn local_watermarks(store: &Store) -> Watermarks {
    Watermarks {
        task: store.tasks_max_lamport_ts().unwrap_or(0),
        agent: store.agents_max_lamport_ts().unwrap_or(0),
        identity: store.identities_max_lamport_ts().unwrap_or(0),
        credential: store.credentials_max_lamport_ts().unwrap_or(0),
    }
}

/// Spawns the gossip loop. Runs for the lifetime of the process; there is
/// no handle to stop it individually, matching `swarm-election`'s and
/// `swarm-dispatcher`'s background loops — the whole node shuts down
/// together.
pub fn spawn(net: NetHandle, store: Arc<Store>, clock: Arc<LamportClock>) {
    tokio::spawn(async move {
        let mut events = net.subscribe();
        let mut seen = SeenMessages::new();
        let mut tombstones = TombstoneTracker::new();
        let mut sync_ticker = interval(ANTI_ENTROPY_INTERVAL);
        let mut tombstone_ticker = interval(TOMBSTONE_SWEEP_INTERVAL);

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => handle_event(&net, &store, &clock, &mut seen, &mut tombstones, event).await,
                        Err(RecvError::Lagged(skipped)) => warn!(skipped, "gossip loop lagged, dropped buffered net events"),
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = sync_ticker.tick() => {
                    if let Err(e) = initiate_sync(&net, local_watermarks(&store)).await {
                        warn!(error = %e, "anti-entropy round failed to start");
                    }
                }
                _ = tombstone_ticker.tick() => {
                    tombstones.sweep_expired();
                }
            }
        }
    });
}

async fn handle_event(
    net: &NetHandle,
    store: &Arc<Store>,
    clock: &Arc<LamportClock>,
    seen: &mut SeenMessages,
    tombstones: &mut TombstoneTracker,
    event: NetEvent,
) {
    let NetEvent::Message { from, msg_type, payload } = event else { return };

    match msg_type {
        tag::TASK_CREATE
        | tag::TASK_CLAIM
        | tag::TASK_UPDATE
        | tag::TASK_COMPLETE
        | tag::TASK_FAIL
        | tag::TASK_CANCEL
        | tag::TASK_ASSIGN
        | tag::TASK_ARCHIVE => match handle_task_frame(store, clock, seen, msg_type, payload.clone()) {
            Ok(TaskGossipOutcome::Forward { .. }) => {
                let _ = net.broadcast(msg_type, payload, Some(from)).await;
            }
            Ok(TaskGossipOutcome::Duplicate) => {}
            Err(e) => warn!(%from, error = %e, "failed to apply task gossip frame"),
        },

        tag::AGENT_REGISTER | tag::AGENT_HEARTBEAT | tag::AGENT_DEREGISTER => {
            match handle_agent_frame(store, clock, seen, tombstones, msg_type, payload.clone()) {
                Ok(AgentGossipOutcome::Forward { .. }) => {
                    let _ = net.broadcast(msg_type, payload, Some(from)).await;
                }
                Ok(AgentGossipOutcome::Duplicate | AgentGossipOutcome::Tombstoned) => {}
                Err(e) => warn!(%from, error = %e, "failed to apply agent gossip frame"),
            }
        }

        tag::IDENTITY_ANNOUNCE | tag::CREDENTIAL_ISSUE => {
            match handle_identity_frame(store, clock, seen, msg_type, payload.clone()) {
                Ok(outcome) if !matches!(outcome, crate::identity_gossip::IdentityGossipOutcome::Duplicate | crate::identity_gossip::IdentityGossipOutcome::CredentialRejected) => {
                    let _ = net.broadcast(msg_type, payload, Some(from)).await;
                }
                Ok(_) => {}
                Err(e) => warn!(%from, error = %e, "failed to apply identity gossip frame"),
            }
        }

        tag::SYNC_REQ => {
            let Ok(requested) = serde_json::from_value::<Watermarks>(payload) else { return };
            match build_sync_response(store, requested) {
                Ok(response) => {
                    if let Ok(value) = serde_json::to_value(&response) {
                        let _ = net.send_to(from, tag::SYNC_RSP, value).await;
                    }
                }
                Err(e) => warn!(%from, error = %e, "failed to build sync response"),
            }
        }

        tag::SYNC_RSP => {
            let Ok(response) = serde_json::from_value::<SyncResponse>(payload) else { return };
            if let Err(e) = apply_sync_response(store, clock, &response) {
                warn!(%from, error = %e, "failed to apply sync response");
            }
        }

        _ => {}
    }
}
