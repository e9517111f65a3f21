//! The shared bounty board: local mutations stamp a Lamport tick, persist
//! through `swarm-store`, and go out wrapped in a fresh `RELAY` envelope.
//! Inbound relays merge under the same last-writer-wins discipline as the
//! intra-swarm gossip plane (spec.md §4.6, §8 P3).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use swarm_model::{lww_wins, Bounty, BountyStatus, CapabilityProfile, LamportClock};
use swarm_net::{broker_tag, NetHandle};
use swarm_store::Store;
use uuid::Uuid;

use crate::error::BrokerResult;
use crate::relay::{RelayEnvelope, RelayRecord};

pub struct Board {
    pub(crate) store: Arc<Store>,
    pub(crate) clock: Arc<LamportClock>,
    pub(crate) net: NetHandle,
    pub(crate) swarm_id: String,
}

impl Board {
    pub fn new(store: Arc<Store>, clock: Arc<LamportClock>, net: NetHandle, swarm_id: String) -> Self {
        Self { store, clock, net, swarm_id }
    }

    /// Post a bounty for remote swarms to pick up. `ttl` bounds how long it
    /// stays `Open` before anti-entropy sweeps mark it `Expired`.
    pub async fn post_bounty(
        &self,
        task_summary: String,
        required_capabilities: Vec<String>,
        reputation_floor: f64,
        ttl: chrono::Duration,
    ) -> BrokerResult<Bounty> {
        let now = Utc::now();
        let bounty = Bounty {
            id: Uuid::new_v4(),
            swarm_id: self.swarm_id.clone(),
            task_summary,
            required_capabilities,
            reputation_floor,
            status: BountyStatus::Open,
            claimed_by_swarm: None,
            posted_at: now,
            expires_at: now + ttl,
            lamport_ts: self.clock.tick(),
        };
        self.store.upsert_bounty(&bounty)?;
        self.relay(RelayRecord::Bounty(bounty.clone())).await?;
        Ok(bounty)
    }

    /// Claim an open bounty on behalf of `claimant_swarm`. CAS'd the same
    /// way a task claim is: a lost race returns `false` silently.
    pub async fn claim_bounty(&self, id: Uuid, claimant_swarm: &str) -> BrokerResult<bool> {
        let ts = self.clock.tick();
        let applied = self.store.transition_bounty(id, &[BountyStatus::Open], |b| {
            b.status = BountyStatus::Claimed;
            b.claimed_by_swarm = Some(claimant_swarm.to_string());
            b.lamport_ts = ts;
        })?;
        if applied {
            if let Some(bounty) = self.store.get_bounty(id)? {
                self.relay(RelayRecord::Bounty(bounty)).await?;
            }
        }
        Ok(applied)
    }

    pub async fn resolve_bounty(&self, id: Uuid, status: BountyStatus) -> BrokerResult<bool> {
        debug_assert!(matches!(status, BountyStatus::Completed | BountyStatus::Cancelled));
        let ts = self.clock.tick();
        let applied = self.store.transition_bounty(id, &[BountyStatus::Claimed, BountyStatus::Open], |b| {
            b.status = status;
            b.lamport_ts = ts;
        })?;
        if applied {
            if let Some(bounty) = self.store.get_bounty(id)? {
                self.relay(RelayRecord::Bounty(bounty)).await?;
            }
        }
        Ok(applied)
    }

    /// Sweep bounties whose TTL has lapsed without a claim. Run this
    /// alongside anti-entropy; expiry is locally derived, not gossiped, so
    /// every node that still sees the stale `Open` record converges on its
    /// own (spec.md §9 open question: "offering-withdrawal gossip ... or
    /// TTL expiry suffices" — both paths are valid here for symmetry).
    pub fn expire_stale_bounties(&self, now: DateTime<Utc>) -> BrokerResult<usize> {
        let mut expired = 0;
        for bounty in self.store.list_open_bounties()? {
            if bounty.is_expired(now) {
                let ts = self.clock.tick();
                if self.store.transition_bounty(bounty.id, &[BountyStatus::Open], |b| {
                    b.status = BountyStatus::Expired;
                    b.lamport_ts = ts;
                })? {
                    expired += 1;
                }
            }
        }
        Ok(expired)
    }

    /// Advertise (or refresh) this swarm's capacity to the federation.
    pub async fn advertise_capability(&self, mut profile: CapabilityProfile) -> BrokerResult<()> {
        profile.lamport_ts = self.clock.tick();
        self.store.upsert_offering(&profile)?;
        self.relay(RelayRecord::CapabilityProfile(profile)).await
    }

    pub fn withdraw_capability(&self, node_id: &str) -> BrokerResult<()> {
        self.store.remove_offering(node_id)?;
        Ok(())
    }

    async fn relay(&self, record: RelayRecord) -> BrokerResult<()> {
        let envelope = RelayEnvelope::wrap(record);
        let payload = serde_json::to_value(&envelope)?;
        self.net.broadcast(broker_tag::RELAY, payload, None).await?;
        Ok(())
    }

    /// Merge an inbound `RELAY` payload. Returns `true` if the record was
    /// newer than what this broker already held (and so worth re-flooding).
    pub fn merge_relay(&self, record: &RelayRecord) -> BrokerResult<bool> {
        match record {
            RelayRecord::Bounty(bounty) => {
                self.clock.witness(bounty.lamport_ts);
                let should_apply = match self.store.get_bounty(bounty.id)? {
                    None => true,
                    Some(current) => lww_wins(bounty.lamport_ts, &bounty.swarm_id, current.lamport_ts, &current.swarm_id),
                };
                if should_apply {
                    self.store.upsert_bounty(bounty)?;
                }
                Ok(should_apply)
            }
            RelayRecord::CapabilityProfile(profile) => {
                self.clock.witness(profile.lamport_ts);
                self.store.upsert_offering(profile)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swarm_net::discovery::memory::InMemoryDiscovery;
    use swarm_net::{NetNode, TransportConfig};

    async fn board(swarm_id: &str, port: u16) -> Board {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(LamportClock::new(0));
        let config = TransportConfig::new(
            format!("127.0.0.1:{port}").parse().unwrap(),
            swarm_id.to_string(),
            Arc::new(InMemoryDiscovery::new()),
        );
        let net = NetNode::spawn(config).await.unwrap();
        Board::new(store, clock, net, swarm_id.to_string())
    }

    #[tokio::test]
    async fn posting_a_bounty_persists_it_open() {
        let b = board("swarm-a", 19510).await;
        let bounty = b
            .post_bounty("fix ci".into(), vec![], 0.3, chrono::Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(bounty.status, BountyStatus::Open);
        assert_eq!(b.store.list_open_bounties().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claiming_an_open_bounty_once_succeeds_twice_fails() {
        let b = board("swarm-b", 19511).await;
        let bounty = b
            .post_bounty("fix ci".into(), vec![], 0.3, chrono::Duration::minutes(10))
            .await
            .unwrap();
        assert!(b.claim_bounty(bounty.id, "swarm-c").await.unwrap());
        assert!(!b.claim_bounty(bounty.id, "swarm-d").await.unwrap());
    }

    #[tokio::test]
    async fn expire_stale_bounties_only_touches_lapsed_open_ones() {
        let b = board("swarm-e", 19512).await;
        let fresh = b.post_bounty("keep".into(), vec![], 0.0, chrono::Duration::hours(1)).await.unwrap();
        let stale = b.post_bounty("drop".into(), vec![], 0.0, chrono::Duration::seconds(-1)).await.unwrap();

        let expired = b.expire_stale_bounties(Utc::now()).unwrap();
        assert_eq!(expired, 1);
        assert_eq!(b.store.get_bounty(fresh.id).unwrap().unwrap().status, BountyStatus::Open);
        assert_eq!(b.store.get_bounty(stale.id).unwrap().unwrap().status, BountyStatus::Expired);
    }

    #[test]
    fn merge_relay_drops_stale_capability_write_for_older_bounty_but_not_profile() {
        // CapabilityProfile always applies (pure LWW summary, never read back
        // for equality); Bounty merge additionally checks the tiebreak.
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let b = board("swarm-f", 19513).await;
            let bounty = Bounty {
                id: Uuid::new_v4(),
                swarm_id: "swarm-z".into(),
                task_summary: "x".into(),
                required_capabilities: vec![],
                reputation_floor: 0.0,
                status: BountyStatus::Open,
                claimed_by_swarm: None,
                posted_at: Utc::now(),
                expires_at: Utc::now() + chrono::Duration::minutes(5),
                lamport_ts: 5,
            };
            b.store.upsert_bounty(&bounty).unwrap();

            let mut stale = bounty.clone();
            stale.lamport_ts = 2;
            stale.status = BountyStatus::Cancelled;
            let applied = b.merge_relay(&RelayRecord::Bounty(stale)).unwrap();
            assert!(!applied);
            assert_eq!(b.store.get_bounty(bounty.id).unwrap().unwrap().status, BountyStatus::Open);
        });
    }
}
