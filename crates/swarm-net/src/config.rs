use std::{sync::Arc, time::Duration};

use crate::discovery::DiscoveryProvider;

/// Configuration for a transport node. Decoupled from `swarm-config`'s
/// on-disk schema so this crate has no upward dependency on it; the
/// binary that assembles a node converts `swarm_config::NetConfig` into
/// this shape.
pub struct TransportConfig {
    /// Local bind address, e.g. `0.0.0.0:7420`.
    pub bind_addr: std::net::SocketAddr,

    /// This node's stable identifier, used in the HELLO handshake and as
    /// the key for the deterministic edge tiebreak.
    pub node_id: String,

    /// Static seed peers dialed on startup and whenever the connection
    /// count drops below `max_connections`.
    pub seed_peers: Vec<String>,

    /// Provider backing the WAN peer table (seed list plus anything
    /// learned via peer-exchange).
    pub discovery: Arc<dyn DiscoveryProvider>,

    /// Hard cap on simultaneous connections.
    pub max_connections: usize,

    /// Interval between keepalive PINGs sent to each connected peer.
    pub keepalive_interval: Duration,

    /// Whether to run the LAN UDP discovery beacon.
    pub lan_discovery: bool,

    /// How often to poll `discovery` and dial any peer not already
    /// connected, up to `max_connections`.
    pub discovery_poll_interval: Duration,

    /// How often to broadcast a peer-exchange batch of known addresses to
    /// every connected peer.
    pub pex_interval: Duration,

    /// How often the LAN UDP beacon broadcasts, when `lan_discovery` is on.
    pub beacon_interval: Duration,
}

impl TransportConfig {
    pub fn new(
        bind_addr: std::net::SocketAddr,
        node_id: String,
        discovery: Arc<dyn DiscoveryProvider>,
    ) -> Self {
        Self {
            bind_addr,
            node_id,
            seed_peers: Vec::new(),
            discovery,
            max_connections: 20,
            keepalive_interval: Duration::from_secs(15),
            lan_discovery: true,
            discovery_poll_interval: Duration::from_secs(10),
            pex_interval: Duration::from_secs(60),
            beacon_interval: Duration::from_secs(20),
        }
    }
}
