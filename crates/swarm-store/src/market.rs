use rusqlite::{params, OptionalExtension};
use swarm_model::{Bounty, BountyStatus, CapabilityProfile, Post, Tribute};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

fn bounty_status_str(status: BountyStatus) -> &'static str {
    match status {
        BountyStatus::Open => "open",
        BountyStatus::Claimed => "claimed",
        BountyStatus::Completed => "completed",
        BountyStatus::Cancelled => "cancelled",
        BountyStatus::Expired => "expired",
    }
}

impl Store {
    pub fn upsert_bounty(&self, bounty: &Bounty) -> StoreResult<()> {
        let data = serde_json::to_string(bounty)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bounties (id, data, status, lamport_ts) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, status = excluded.status, lamport_ts = excluded.lamport_ts",
                params![bounty.id.to_string(), data, bounty_status_str(bounty.status), bounty.lamport_ts as i64],
            )?;
            Ok(())
        })
    }

    pub fn list_open_bounties(&self) -> StoreResult<Vec<Bounty>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM bounties WHERE status = 'open'")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(|d| serde_json::from_str(&d).map_err(StoreError::from)).collect()
        })
    }

    pub fn get_bounty(&self, id: Uuid) -> StoreResult<Option<Bounty>> {
        self.with_conn(|conn| {
            let data: Option<String> = conn
                .query_row("SELECT data FROM bounties WHERE id = ?1", [id.to_string()], |r| r.get(0))
                .optional()?;
            Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
        })
    }

    /// Bounties mutated since `lamport_watermark`, for broker anti-entropy.
    pub fn bounties_since(&self, lamport_watermark: u64) -> StoreResult<Vec<Bounty>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM bounties WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC")?;
            let rows = stmt
                .query_map([lamport_watermark as i64], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(|d| serde_json::from_str(&d).map_err(StoreError::from)).collect()
        })
    }

    pub fn bounties_max_lamport_ts(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let max: i64 = conn.query_row("SELECT COALESCE(MAX(lamport_ts), 0) FROM bounties", [], |r| r.get(0))?;
            Ok(max as u64)
        })
    }

    /// Offerings (capability profiles) mutated since `lamport_watermark`.
    pub fn offerings_since(&self, lamport_watermark: u64) -> StoreResult<Vec<CapabilityProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM offerings WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC")?;
            let rows = stmt
                .query_map([lamport_watermark as i64], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(|d| serde_json::from_str(&d).map_err(StoreError::from)).collect()
        })
    }

    pub fn offerings_max_lamport_ts(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let max: i64 = conn.query_row("SELECT COALESCE(MAX(lamport_ts), 0) FROM offerings", [], |r| r.get(0))?;
            Ok(max as u64)
        })
    }

    /// Transition a bounty compare-and-swap style on its status, same
    /// discipline as the task queue's CAS transition.
    pub fn transition_bounty(
        &self,
        id: Uuid,
        allowed_from: &[BountyStatus],
        mutate: impl FnOnce(&mut Bounty),
    ) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let data: Option<String> = tx
                .query_row("SELECT data FROM bounties WHERE id = ?1", [id.to_string()], |r| r.get(0))
                .optional()?;
            let Some(data) = data else { return Ok(false) };
            let mut bounty: Bounty = serde_json::from_str(&data)?;
            if !allowed_from.contains(&bounty.status) {
                return Ok(false);
            }
            mutate(&mut bounty);
            let updated = serde_json::to_string(&bounty)?;
            tx.execute(
                "UPDATE bounties SET data = ?1, status = ?2, lamport_ts = ?3 WHERE id = ?4",
                params![updated, bounty_status_str(bounty.status), bounty.lamport_ts as i64, id.to_string()],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn insert_tribute(&self, tribute: &Tribute) -> StoreResult<()> {
        let data = serde_json::to_string(tribute)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO tributes (id, data, lamport_ts) VALUES (?1, ?2, ?3)",
                params![tribute.id.to_string(), data, tribute.lamport_ts as i64],
            )?;
            Ok(())
        })
    }

    pub fn upsert_post(&self, post: &Post) -> StoreResult<()> {
        let data = serde_json::to_string(post)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, data, lamport_ts) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, lamport_ts = excluded.lamport_ts",
                params![post.id.to_string(), data, post.lamport_ts as i64],
            )?;
            Ok(())
        })
    }

    pub fn list_posts(&self) -> StoreResult<Vec<Post>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM messages ORDER BY lamport_ts ASC")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(|d| serde_json::from_str(&d).map_err(StoreError::from)).collect()
        })
    }

    /// Upsert a peer's capability profile, last-writer-wins on `lamport_ts`.
    pub fn upsert_offering(&self, profile: &CapabilityProfile) -> StoreResult<()> {
        let data = serde_json::to_string(profile)?;
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT lamport_ts FROM offerings WHERE id = ?1",
                    [&profile.node_id],
                    |r| r.get(0),
                )
                .optional()?;
            if let Some(existing_ts) = existing {
                if existing_ts as u64 >= profile.lamport_ts {
                    return Ok(());
                }
            }
            conn.execute(
                "INSERT INTO offerings (id, data, lamport_ts) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data, lamport_ts = excluded.lamport_ts",
                params![profile.node_id, data, profile.lamport_ts as i64],
            )?;
            Ok(())
        })
    }

    pub fn list_offerings(&self) -> StoreResult<Vec<CapabilityProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM offerings")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(|d| serde_json::from_str(&d).map_err(StoreError::from)).collect()
        })
    }

    pub fn remove_offering(&self, node_id: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM offerings WHERE id = ?1", [node_id])?;
            Ok(())
        })
    }

    pub fn record_wallet_entry(&self, swarm_id: &str, delta: f64, reason: &str, recorded_at: chrono::DateTime<chrono::Utc>) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO wallet_ledger (id, swarm_id, delta, reason, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![Uuid::new_v4().to_string(), swarm_id, delta, reason, recorded_at.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn wallet_balance(&self, swarm_id: &str) -> StoreResult<f64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COALESCE(SUM(delta), 0.0) FROM wallet_ledger WHERE swarm_id = ?1",
                [swarm_id],
                |r| r.get(0),
            )?)
        })
    }
}
