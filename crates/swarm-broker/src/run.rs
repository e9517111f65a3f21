//! The broker's event loop: reacts to `RELAY` pushes and `SYNC_REQ/RSP`
//! anti-entropy on the federated mesh, and sweeps expired bounties on a
//! timer (spec.md §4.5 pattern, §4.6).

use std::sync::Arc;
use std::time::Duration;

use swarm_net::{broker_tag, NetEvent, NetHandle};
use tracing::{debug, warn};

use crate::board::Board;
use crate::relay::RelayEnvelope;
use crate::sync::{apply_sync_response, build_sync_response, initiate_sync, local_watermarks, BrokerSyncResponse, BrokerWatermarks};

const SYNC_INTERVAL: Duration = Duration::from_secs(45);
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const SEEN_CAPACITY: usize = 10_000;

/// Spawns the broker's background loop. Returns immediately; the loop runs
/// for the lifetime of the process.
pub fn spawn(board: Arc<Board>, net: NetHandle) {
    let mut events = net.subscribe();
    let loop_board = board.clone();
    let loop_net = net.clone();
    tokio::spawn(async move {
        let mut seen = swarm_gossip::SeenMessages::with_capacity(SEEN_CAPACITY);
        loop {
            match events.recv().await {
                Ok(NetEvent::Message { from, msg_type, payload }) => {
                    handle_message(&loop_board, &loop_net, &mut seen, from, msg_type, payload).await;
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "broker event loop lagged, dropped buffered net events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    spawn_sync_timer(board.clone(), net.clone());
    spawn_expiry_sweep(board);
}

async fn handle_message(
    board: &Arc<Board>,
    net: &NetHandle,
    seen: &mut swarm_gossip::SeenMessages,
    from: String,
    msg_type: u8,
    payload: serde_json::Value,
) {
    match msg_type {
        broker_tag::RELAY => {
            let Ok(envelope) = serde_json::from_value::<RelayEnvelope>(payload) else {
                debug!(%from, "dropped malformed RELAY envelope");
                return;
            };
            if seen.contains(&envelope.dedup_key()) {
                return;
            }
            seen.mark(&envelope.dedup_key());
            match board.merge_relay(&envelope.record) {
                Ok(true) => {
                    if let Ok(reflood) = serde_json::to_value(&envelope) {
                        let _ = net.broadcast(broker_tag::RELAY, reflood, Some(from)).await;
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(%from, error = %e, "failed to merge relayed record"),
            }
        }
        broker_tag::SYNC_REQ => {
            let Ok(requested) = serde_json::from_value::<BrokerWatermarks>(payload) else {
                return;
            };
            match build_sync_response(&board.store, requested) {
                Ok(response) => {
                    if let Ok(value) = serde_json::to_value(&response) {
                        let _ = net.send_to(from, broker_tag::SYNC_RSP, value).await;
                    }
                }
                Err(e) => warn!(%from, error = %e, "failed to build broker sync response"),
            }
        }
        broker_tag::SYNC_RSP => {
            let Ok(response) = serde_json::from_value::<BrokerSyncResponse>(payload) else {
                return;
            };
            if let Err(e) = apply_sync_response(&board.store, &board.clock, &response) {
                warn!(%from, error = %e, "failed to apply broker sync response");
            }
        }
        _ => {}
    }
}

fn spawn_sync_timer(board: Arc<Board>, net: NetHandle) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SYNC_INTERVAL);
        loop {
            ticker.tick().await;
            let Ok(watermarks) = local_watermarks(&board.store) else { continue };
            if let Err(e) = initiate_sync(&net, watermarks).await {
                warn!(error = %e, "broker anti-entropy round failed to start");
            }
        }
    });
}

fn spawn_expiry_sweep(board: Arc<Board>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match board.expire_stale_bounties(chrono::Utc::now()) {
                Ok(n) if n > 0 => debug!(count = n, "expired stale bounties"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "bounty expiry sweep failed"),
            }
        }
    });
}
