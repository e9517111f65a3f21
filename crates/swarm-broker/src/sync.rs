//! Pull anti-entropy for the broker mesh (spec.md §4.5 pattern, reused for
//! §4.6): every sync interval a broker picks a random federated peer and
//! exchanges bounty/offering watermarks, reconciling whatever the `RELAY`
//! push layer dropped.

use rand::Rng;
use serde::{Deserialize, Serialize};
use swarm_model::{Bounty, CapabilityProfile, LamportClock};
use swarm_net::{broker_tag, NetHandle};
use swarm_store::Store;

use crate::error::BrokerResult;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BrokerWatermarks {
    pub bounty: u64,
    pub offering: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSyncResponse {
    pub bounties: Vec<Bounty>,
    pub offerings: Vec<CapabilityProfile>,
}

pub fn local_watermarks(store: &Store) -> BrokerResult<BrokerWatermarks> {
    Ok(BrokerWatermarks {
        bounty: store.bounties_max_lamport_ts()?,
        offering: store.offerings_max_lamport_ts()?,
    })
}

pub async fn initiate_sync(net: &NetHandle, watermarks: BrokerWatermarks) -> BrokerResult<bool> {
    let peers = net.connected_peers().await?;
    if peers.is_empty() {
        return Ok(false);
    }
    let index = rand::thread_rng().gen_range(0..peers.len());
    let peer = &peers[index];
    let sent = net
        .send_to(peer.clone(), broker_tag::SYNC_REQ, serde_json::to_value(watermarks)?)
        .await?;
    Ok(sent)
}

pub fn build_sync_response(store: &Store, requested: BrokerWatermarks) -> BrokerResult<BrokerSyncResponse> {
    Ok(BrokerSyncResponse {
        bounties: store.bounties_since(requested.bounty)?,
        offerings: store.offerings_since(requested.offering)?,
    })
}

/// Merge a `SYNC_RSP` under the same LWW rule `Board::merge_relay` uses for
/// pushed records, without re-emitting another `RELAY` for each.
pub fn apply_sync_response(store: &Store, clock: &LamportClock, response: &BrokerSyncResponse) -> BrokerResult<usize> {
    let mut applied = 0;
    for bounty in &response.bounties {
        clock.witness(bounty.lamport_ts);
        let should_apply = match store.get_bounty(bounty.id)? {
            None => true,
            Some(current) => bounty.lamport_ts > current.lamport_ts,
        };
        if should_apply {
            store.upsert_bounty(bounty)?;
            applied += 1;
        }
    }
    for profile in &response.offerings {
        clock.witness(profile.lamport_ts);
        store.upsert_offering(profile)?;
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use swarm_model::BountyStatus;
    use uuid::Uuid;

    fn bounty(lamport_ts: u64) -> Bounty {
        Bounty {
            id: Uuid::new_v4(),
            swarm_id: "s1".into(),
            task_summary: "x".into(),
            required_capabilities: vec![],
            reputation_floor: 0.0,
            status: BountyStatus::Open,
            claimed_by_swarm: None,
            posted_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
            lamport_ts,
        }
    }

    #[test]
    fn build_sync_response_respects_watermark() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_bounty(&bounty(3)).unwrap();
        store.upsert_bounty(&bounty(9)).unwrap();

        let response = build_sync_response(&store, BrokerWatermarks { bounty: 5, offering: 0 }).unwrap();
        assert_eq!(response.bounties.len(), 1);
        assert_eq!(response.bounties[0].lamport_ts, 9);
    }

    #[test]
    fn apply_sync_response_skips_records_no_newer_than_local() {
        let store = Store::open_in_memory().unwrap();
        let clock = LamportClock::new(0);
        let b = bounty(10);
        store.upsert_bounty(&b).unwrap();

        let mut stale = b.clone();
        stale.status = BountyStatus::Cancelled;
        stale.lamport_ts = 4;
        let response = BrokerSyncResponse { bounties: vec![stale], offerings: vec![] };
        let applied = apply_sync_response(&store, &clock, &response).unwrap();
        assert_eq!(applied, 0);
        assert_eq!(store.get_bounty(b.id).unwrap().unwrap().status, BountyStatus::Open);
    }
}
