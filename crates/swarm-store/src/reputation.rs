//! Peer reputation tracking: the raw components feeding
//! `swarm_model::reputation_score`, persisted per (swarm, node) pair so the
//! time-decay term can be recomputed on read rather than stored stale.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use swarm_model::{reputation_score, UNKNOWN_PEER_REPUTATION};

use crate::error::StoreResult;
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct ReputationComponents {
    pub completion_rate: f64,
    pub reliability: f64,
    pub speed_score: f64,
    pub last_seen: DateTime<Utc>,
}

impl Store {
    pub fn record_reputation(&self, swarm_id: &str, node_id: &str, components: ReputationComponents) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reputation (swarm_id, node_id, completion_rate, reliability, speed_score, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(swarm_id, node_id) DO UPDATE SET
                    completion_rate = excluded.completion_rate,
                    reliability = excluded.reliability,
                    speed_score = excluded.speed_score,
                    last_seen = excluded.last_seen",
                params![
                    swarm_id,
                    node_id,
                    components.completion_rate,
                    components.reliability,
                    components.speed_score,
                    components.last_seen.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    /// Current reputation score for a peer, decayed against `now`. Peers
    /// never observed score the neutral floor rather than zero.
    pub fn reputation_of(&self, swarm_id: &str, node_id: &str, now: DateTime<Utc>) -> StoreResult<f64> {
        let row: Option<(f64, f64, f64, String)> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT completion_rate, reliability, speed_score, last_seen FROM reputation WHERE swarm_id = ?1 AND node_id = ?2",
                params![swarm_id, node_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()
            .map_err(Into::into)
        })?;

        let Some((completion_rate, reliability, speed_score, last_seen)) = row else {
            return Ok(UNKNOWN_PEER_REPUTATION);
        };
        let last_seen = DateTime::parse_from_rfc3339(&last_seen)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        let hours_since_last_seen = (now - last_seen).num_seconds().max(0) as f64 / 3600.0;
        Ok(reputation_score(completion_rate, reliability, speed_score, hours_since_last_seen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_peer_gets_neutral_score() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.reputation_of("s1", "ghost", Utc::now()).unwrap(), UNKNOWN_PEER_REPUTATION);
    }

    #[test]
    fn known_peer_score_decays_with_staleness() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .record_reputation(
                "s1",
                "n1",
                ReputationComponents {
                    completion_rate: 1.0,
                    reliability: 1.0,
                    speed_score: 1.0,
                    last_seen: now - chrono::Duration::hours(48),
                },
            )
            .unwrap();
        let fresh_score = reputation_score(1.0, 1.0, 1.0, 0.0);
        let stored_score = store.reputation_of("s1", "n1", now).unwrap();
        assert!(stored_score < fresh_score);
    }

    #[test]
    fn updating_reputation_overwrites_components() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store
            .record_reputation("s1", "n1", ReputationComponents { completion_rate: 0.2, reliability: 0.2, speed_score: 0.2, last_seen: now })
            .unwrap();
        store
            .record_reputation("s1", "n1", ReputationComponents { completion_rate: 1.0, reliability: 1.0, speed_score: 1.0, last_seen: now })
            .unwrap();
        let score = store.reputation_of("s1", "n1", now).unwrap();
        assert!((score - reputation_score(1.0, 1.0, 1.0, 0.0)).abs() < 1e-9);
    }
}
