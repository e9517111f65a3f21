//! Wires [`crate::bully::Election`] to a live [`swarm_net::NetHandle`]:
//! subscribes to mesh events, ticks the heartbeat/timeout clock, and
//! broadcasts the three election tags over the wire.

use std::time::Instant;

use swarm_net::{tag, NetEvent, NetHandle};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::bully::{Election, ElectionAction, HEARTBEAT_INTERVAL};
use crate::error::ElectionResult;
use crate::messages::{ElectionStart, ElectionVictory, EmperorHeartbeat};

/// Cheap, clone-able read access to this node's emperor status, handed to
/// the dispatcher and integrator so they can gate emperor-only work without
/// touching the election loop itself.
#[derive(Clone)]
pub struct ElectionHandle {
    is_emperor: watch::Receiver<bool>,
}

impl ElectionHandle {
    pub fn is_emperor(&self) -> bool {
        *self.is_emperor.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.is_emperor.clone()
    }
}

async fn broadcast(net: &NetHandle, action: ElectionAction, local_node_id: &str) -> ElectionResult<()> {
    match action {
        ElectionAction::BroadcastElectionStart => {
            let payload = serde_json::to_value(ElectionStart {
                candidate_id: local_node_id.to_string(),
            })?;
            net.broadcast(tag::ELECTION_START, payload, None).await?;
        }
        ElectionAction::BroadcastVictory => {
            let payload = serde_json::to_value(ElectionVictory {
                node_id: local_node_id.to_string(),
            })?;
            net.broadcast(tag::ELECTION_VICTORY, payload, None).await?;
        }
    }
    Ok(())
}

/// Spawns the election loop and returns a handle other crates poll for
/// `isEmperor()`. `has_seed_peers` decides whether the node waits to be
/// challenged or declares itself emperor immediately on first boot (spec.md
/// §4.7: a lone founding node has nobody to contest the crown).
pub fn spawn(net: NetHandle, local_node_id: String, participates: bool, has_seed_peers: bool) -> ElectionHandle {
    let (tx, rx) = watch::channel(false);
    let handle = ElectionHandle { is_emperor: rx };

    tokio::spawn(async move {
        let mut election = Election::new(local_node_id.clone(), participates);
        if participates && !has_seed_peers {
            election.declare_self_emperor_uncontested();
            info!(node_id = %local_node_id, "no seed peers, assuming emperor uncontested");
        }
        let _ = tx.send(election.is_emperor());

        let mut events = net.subscribe();
        let mut ticker = interval(HEARTBEAT_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    if election.is_emperor() {
                        match serde_json::to_value(EmperorHeartbeat { node_id: local_node_id.clone() }) {
                            Ok(payload) => {
                                if let Err(e) = net.broadcast(tag::EMPEROR_HEARTBEAT, payload, None).await {
                                    warn!(error = %e, "failed to broadcast emperor heartbeat");
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to encode heartbeat"),
                        }
                    }
                    if let Some(action) = election.check_timeouts(now) {
                        debug!(?action, "election timeout fired");
                        let _ = broadcast(&net, action, &local_node_id).await;
                    }
                    let _ = tx.send(election.is_emperor());
                }
                event = events.recv() => {
                    let Ok(event) = event else { break };
                    let NetEvent::Message { from, msg_type, payload } = event else { continue };
                    let now = Instant::now();
                    match msg_type {
                        tag::EMPEROR_HEARTBEAT => {
                            if let Ok(hb) = serde_json::from_value::<EmperorHeartbeat>(payload) {
                                election.on_heartbeat(&hb.node_id, now);
                            }
                        }
                        tag::ELECTION_START => {
                            if let Ok(start) = serde_json::from_value::<ElectionStart>(payload) {
                                if let Some(action) = election.on_election_start(&start.candidate_id, now) {
                                    let _ = broadcast(&net, action, &local_node_id).await;
                                }
                            }
                        }
                        tag::ELECTION_VICTORY => {
                            if let Ok(victory) = serde_json::from_value::<ElectionVictory>(payload) {
                                info!(winner = %victory.node_id, "new emperor elected");
                                election.on_victory(&victory.node_id, now);
                            }
                        }
                        _ => {
                            let _ = from;
                        }
                    }
                    let _ = tx.send(election.is_emperor());
                }
            }
        }
    });

    handle
}
