//! LAN UDP discovery beacon (spec.md §4.1: "LAN UDP beacons ... discovery
//! candidates the peer manager dials").
//!
//! Every node with `lan_discovery` enabled periodically broadcasts a small
//! JSON datagram advertising its node-id and TCP listen port on
//! [`BEACON_PORT`], and listens for the same from other nodes on the local
//! network. Heard beacons are published into the node's [`DiscoveryProvider`]
//! exactly like a peer-exchange address would be; the regular discovery-poll
//! timer dials them. This is best-effort: a dropped or malformed datagram is
//! silently ignored, since anti-entropy and PEX provide the same peers
//! through other channels.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::discovery::DiscoveryProvider;
use crate::protocol::types::PeerAddr;

/// Fixed well-known port for the LAN discovery beacon, disjoint from the
/// mesh and broker TCP port ranges.
pub const BEACON_PORT: u16 = 7777;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Beacon {
    node_id: String,
    tcp_port: u16,
}

/// Spawn the send and receive halves of the LAN beacon. Returns immediately;
/// failures to bind the UDP socket are logged and the beacon is skipped
/// rather than failing node startup (spec.md treats discovery backends as
/// best-effort candidate sources, never required for liveness).
pub fn spawn(node_id: String, tcp_port: u16, discovery: Arc<dyn DiscoveryProvider>, interval: Duration) {
    tokio::spawn(async move {
        let socket = match bind_broadcast_socket().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "LAN beacon disabled: failed to bind UDP socket");
                return;
            }
        };
        let socket = Arc::new(socket);

        let send_socket = socket.clone();
        let send_node_id = node_id.clone();
        tokio::spawn(async move {
            send_loop(send_socket, send_node_id, tcp_port, interval).await;
        });

        recv_loop(socket, node_id, discovery).await;
    });
}

async fn bind_broadcast_socket() -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind(("0.0.0.0", BEACON_PORT)).await?;
    socket.set_broadcast(true)?;
    Ok(socket)
}

async fn send_loop(socket: Arc<UdpSocket>, node_id: String, tcp_port: u16, interval: Duration) {
    let beacon = Beacon { node_id, tcp_port };
    let Ok(payload) = serde_json::to_vec(&beacon) else { return };
    let dest: SocketAddr = ([255, 255, 255, 255], BEACON_PORT).into();

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if let Err(e) = socket.send_to(&payload, dest).await {
            debug!(error = %e, "LAN beacon broadcast failed");
        }
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, my_node_id: String, discovery: Arc<dyn DiscoveryProvider>) {
    let mut buf = [0u8; 512];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(error = %e, "LAN beacon recv error");
                continue;
            }
        };
        let Ok(beacon) = serde_json::from_slice::<Beacon>(&buf[..len]) else {
            continue;
        };
        if beacon.node_id == my_node_id {
            continue;
        }
        let addr = SocketAddr::new(from.ip(), beacon.tcp_port);
        if let Err(e) = discovery.publish(PeerAddr {
            node_id: beacon.node_id,
            addr: addr.to_string(),
        }) {
            debug!(error = %e, "failed to publish LAN-discovered peer");
        }
    }
}
