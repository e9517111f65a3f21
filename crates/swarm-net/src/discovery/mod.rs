//! Peer-discovery abstraction.
//!
//! `DiscoveryProvider` is the seam between the transport and whatever
//! backs the WAN peer table (a static seed list, an in-memory map for
//! tests, the DHT layer). The event loop polls it on a timer in addition
//! to the LAN beacon and peer-exchange gossip it runs itself.

pub mod memory;

use crate::error::NetError;
use crate::protocol::types::PeerAddr;

/// Backend-agnostic discovery interface. All methods are synchronous;
/// the event loop runs them inline since known implementations never
/// block on I/O (the DHT-backed one, if added, would use
/// `spawn_blocking` for any disk access).
pub trait DiscoveryProvider: Send + Sync + 'static {
    /// Record that `peer` is reachable, learned via PEX or a direct dial.
    fn publish(&self, peer: PeerAddr) -> Result<(), NetError>;

    /// Every peer address currently known to this provider.
    fn fetch_all(&self) -> Result<Vec<PeerAddr>, NetError>;

    /// Drop a peer this node no longer believes is reachable.
    fn remove(&self, node_id: &str) -> Result<(), NetError>;
}
