//! The `swarm_state` key-value table: node-id, Lamport counter checkpoint,
//! and the identity secret key handle, persisted so a restart resumes
//! without re-rolling identity.

use crate::error::StoreResult;
use crate::store::Store;

impl Store {
    pub fn get_state(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT value FROM swarm_state WHERE key = ?1", [key], |r| r.get(0))
                .ok())
        })
    }

    pub fn set_state(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO swarm_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, value],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let store = Store::open_in_memory().unwrap();
        store.set_state("node_id", "abc123").unwrap();
        assert_eq!(store.get_state("node_id").unwrap(), Some("abc123".to_string()));
    }

    #[test]
    fn missing_key_returns_none() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_state("nope").unwrap(), None);
    }

    #[test]
    fn set_overwrites_existing_value() {
        let store = Store::open_in_memory().unwrap();
        store.set_state("k", "1").unwrap();
        store.set_state("k", "2").unwrap();
        assert_eq!(store.get_state("k").unwrap(), Some("2".to_string()));
    }
}
