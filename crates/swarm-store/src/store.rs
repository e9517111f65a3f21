use std::{path::Path, sync::Mutex};

use rusqlite::Connection;

use crate::error::StoreResult;
use crate::migrate;

/// The single local store for one node. All mutable state — tasks, agents,
/// identities, credentials, marketplace entities, the Lamport counter —
/// lives here; it is the only thing shared across the event-loop tasks
/// that make up a running node.
///
/// Wrapped in a `Mutex` rather than left bare: although the concurrency
/// model is cooperative single-threaded-per-coroutine, `tokio`'s default
/// runtime schedules tasks across OS threads, so the connection itself
/// still needs `Send + Sync` access discipline. Transactions are held only
/// across synchronous SQL statements, never across an `.await`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrate::run(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        migrate::run(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        f(&conn)
    }
}
