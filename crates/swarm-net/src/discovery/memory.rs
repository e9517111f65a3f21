//! In-memory `DiscoveryProvider` — zero dependencies, used for the static
//! seed list and in-process multi-node tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::error::NetError;
use crate::protocol::types::PeerAddr;

use super::DiscoveryProvider;

/// Thread-safe in-memory peer table. Multiple clones share the same
/// underlying map, so nodes constructed in the same test process can
/// observe each other's published addresses.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDiscovery {
    inner: Arc<Mutex<HashMap<String, PeerAddr>>>,
}

impl InMemoryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(peers: impl IntoIterator<Item = PeerAddr>) -> Self {
        let map = peers.into_iter().map(|p| (p.node_id.clone(), p)).collect();
        Self {
            inner: Arc::new(Mutex::new(map)),
        }
    }
}

impl DiscoveryProvider for InMemoryDiscovery {
    fn publish(&self, peer: PeerAddr) -> Result<(), NetError> {
        self.inner
            .lock()
            .map_err(|_| NetError::Discovery("poisoned lock".into()))?
            .insert(peer.node_id.clone(), peer);
        Ok(())
    }

    fn fetch_all(&self) -> Result<Vec<PeerAddr>, NetError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| NetError::Discovery("poisoned lock".into()))?
            .values()
            .cloned()
            .collect())
    }

    fn remove(&self, node_id: &str) -> Result<(), NetError> {
        self.inner
            .lock()
            .map_err(|_| NetError::Discovery("poisoned lock".into()))?
            .remove(node_id);
        Ok(())
    }
}
