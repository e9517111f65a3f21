//! Reputation bookkeeping for remote swarms (spec.md §4.6, §8 P6): four
//! running counters per peer feed `swarm_model::reputation_score`, and a
//! wallet ledger records the token-unit settlement of completed bounties.
//! Non-goal: linearizable balances or cryptocurrency semantics — the
//! ledger is an additive log, read back as a sum.

use std::sync::Arc;

use chrono::Utc;
use swarm_store::{ReputationComponents, Store};

use crate::error::BrokerResult;

pub struct ReputationLedger {
    store: Arc<Store>,
    swarm_id: String,
}

impl ReputationLedger {
    pub fn new(store: Arc<Store>, swarm_id: String) -> Self {
        Self { store, swarm_id }
    }

    pub fn score_of(&self, peer_swarm: &str) -> BrokerResult<f64> {
        Ok(self.store.reputation_of(&self.swarm_id, peer_swarm, Utc::now())?)
    }

    /// `true` iff the peer's current score clears `floor`. Unknown peers
    /// score the neutral 0.5 (spec.md §4.6), so a floor above that
    /// excludes strangers until they build history.
    pub fn meets_floor(&self, peer_swarm: &str, floor: f64) -> BrokerResult<bool> {
        Ok(self.score_of(peer_swarm)? >= floor)
    }

    pub fn record_completion(&self, peer_swarm: &str, completion_rate: f64, reliability: f64, speed_score: f64) -> BrokerResult<()> {
        self.store.record_reputation(
            &self.swarm_id,
            peer_swarm,
            ReputationComponents { completion_rate, reliability, speed_score, last_seen: Utc::now() },
        )?;
        self.store.record_wallet_entry(&self.swarm_id, 1.0, "bounty_completed", Utc::now())?;
        Ok(())
    }

    /// Debit reputation and the wallet after a `failed` or `expired`
    /// bounty resolution (spec.md §4.6: "reputation is debited").
    pub fn record_failure(&self, peer_swarm: &str, reason: &str) -> BrokerResult<()> {
        let current = self.store.reputation_of(&self.swarm_id, peer_swarm, Utc::now())?;
        self.store.record_reputation(
            &self.swarm_id,
            peer_swarm,
            ReputationComponents {
                completion_rate: (current - 0.1).max(0.0),
                reliability: (current - 0.2).max(0.0),
                speed_score: current,
                last_seen: Utc::now(),
            },
        )?;
        self.store.record_wallet_entry(&self.swarm_id, -1.0, reason, Utc::now())?;
        Ok(())
    }

    pub fn wallet_balance(&self) -> BrokerResult<f64> {
        Ok(self.store.wallet_balance(&self.swarm_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_peer_meets_any_floor_at_or_below_neutral() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let ledger = ReputationLedger::new(store, "s1".into());
        assert!(ledger.meets_floor("stranger", 0.5).unwrap());
        assert!(!ledger.meets_floor("stranger", 0.6).unwrap());
    }

    #[test]
    fn record_failure_debits_the_wallet() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let ledger = ReputationLedger::new(store, "s1".into());
        ledger.record_completion("peer", 1.0, 1.0, 1.0).unwrap();
        assert_eq!(ledger.wallet_balance().unwrap(), 1.0);
        ledger.record_failure("peer", "bounty_expired").unwrap();
        assert_eq!(ledger.wallet_balance().unwrap(), 0.0);
    }
}
