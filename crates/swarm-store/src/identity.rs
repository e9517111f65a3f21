use rusqlite::{params, OptionalExtension};
use swarm_model::{Credential, IdentityRecord};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

impl Store {
    pub fn upsert_identity(&self, identity: &IdentityRecord) -> StoreResult<()> {
        let data = serde_json::to_string(identity)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO identities (did, data, lamport_ts) VALUES (?1, ?2, ?3)
                 ON CONFLICT(did) DO UPDATE SET data = excluded.data, lamport_ts = excluded.lamport_ts",
                params![identity.did, data, identity.lamport_ts as i64],
            )?;
            Ok(())
        })
    }

    pub fn get_identity(&self, did: &str) -> StoreResult<Option<IdentityRecord>> {
        self.with_conn(|conn| {
            let data: Option<String> = conn
                .query_row("SELECT data FROM identities WHERE did = ?1", [did], |r| r.get(0))
                .optional()?;
            Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
        })
    }

    /// Identity records announced since `lamport_watermark`, for
    /// anti-entropy pull sync.
    pub fn identities_since(&self, lamport_watermark: u64) -> StoreResult<Vec<IdentityRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM identities WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC")?;
            let rows = stmt
                .query_map([lamport_watermark as i64], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }

    /// Credentials issued since `lamport_watermark`, for anti-entropy pull
    /// sync.
    pub fn credentials_since(&self, lamport_watermark: u64) -> StoreResult<Vec<Credential>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT data FROM credentials WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC")?;
            let rows = stmt
                .query_map([lamport_watermark as i64], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }

    pub fn identities_max_lamport_ts(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let max: i64 = conn.query_row("SELECT COALESCE(MAX(lamport_ts), 0) FROM identities", [], |r| r.get(0))?;
            Ok(max as u64)
        })
    }

    pub fn credentials_max_lamport_ts(&self) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let max: i64 = conn.query_row("SELECT COALESCE(MAX(lamport_ts), 0) FROM credentials", [], |r| r.get(0))?;
            Ok(max as u64)
        })
    }

    /// Insert a credential. Credentials are immutable once gossiped, so
    /// this is append-only: a conflicting id is left untouched rather than
    /// overwritten.
    pub fn insert_credential(&self, cred: &Credential) -> StoreResult<()> {
        let data = serde_json::to_string(cred)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO credentials (id, data, subject_did, type, lamport_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    cred.id.to_string(),
                    data,
                    cred.subject_did,
                    cred.credential_type,
                    cred.lamport_ts as i64,
                ],
            )?;
            Ok(())
        })
    }

    pub fn credentials_for_subject(&self, subject_did: &str, credential_type: Option<&str>) -> StoreResult<Vec<Credential>> {
        self.with_conn(|conn| {
            let rows: Vec<String> = match credential_type {
                Some(t) => {
                    let mut stmt = conn.prepare(
                        "SELECT data FROM credentials WHERE subject_did = ?1 AND type = ?2",
                    )?;
                    stmt.query_map(params![subject_did, t], |r| r.get(0))?
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare("SELECT data FROM credentials WHERE subject_did = ?1")?;
                    stmt.query_map(params![subject_did], |r| r.get(0))?
                        .collect::<Result<Vec<_>, _>>()?
                }
            };
            rows.into_iter()
                .map(|d| serde_json::from_str(&d).map_err(StoreError::from))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use swarm_model::NodeRole;
    use uuid::Uuid;

    fn sample_credential() -> Credential {
        Credential {
            id: Uuid::new_v4(),
            issuer_did: "did:swarm:emperor".into(),
            subject_did: "did:swarm:worker1".into(),
            credential_type: "worker_trust".into(),
            claims: Default::default(),
            signature_hex: "ab".into(),
            issued_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::days(1),
            lamport_ts: 1,
        }
    }

    #[test]
    fn credential_insert_is_append_only() {
        let store = Store::open_in_memory().unwrap();
        let mut cred = sample_credential();
        store.insert_credential(&cred).unwrap();
        cred.signature_hex = "changed".into();
        store.insert_credential(&cred).unwrap();

        let found = store.credentials_for_subject("did:swarm:worker1", None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signature_hex, "ab");
    }

    #[test]
    fn filters_by_type() {
        let store = Store::open_in_memory().unwrap();
        store.insert_credential(&sample_credential()).unwrap();
        assert_eq!(store.credentials_for_subject("did:swarm:worker1", Some("worker_trust")).unwrap().len(), 1);
        assert_eq!(store.credentials_for_subject("did:swarm:worker1", Some("other")).unwrap().len(), 0);
    }

    #[test]
    fn max_lamport_ts_tracks_highest_seen_stamp() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.identities_max_lamport_ts().unwrap(), 0);
        assert_eq!(store.credentials_max_lamport_ts().unwrap(), 0);

        store
            .upsert_identity(&IdentityRecord {
                did: "did:swarm:n1".into(),
                node_id: "n1".into(),
                public_key_hex: "ab".into(),
                role: NodeRole::Worker,
                created_at: Utc::now(),
                lamport_ts: 7,
            })
            .unwrap();
        assert_eq!(store.identities_max_lamport_ts().unwrap(), 7);

        let mut cred = sample_credential();
        cred.lamport_ts = 12;
        store.insert_credential(&cred).unwrap();
        assert_eq!(store.credentials_max_lamport_ts().unwrap(), 12);
    }
}
