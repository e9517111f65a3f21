//! Forward-only schema migrations. Each entry runs exactly once, recorded
//! in `schema_version`, so the store can gain columns/tables across
//! releases without a destructive reset.

use rusqlite::Connection;

use crate::error::StoreResult;

const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE IF NOT EXISTS swarm_state (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id                   TEXT PRIMARY KEY,
            data                 TEXT NOT NULL,
            status               TEXT NOT NULL,
            priority             INTEGER NOT NULL,
            created_at           TEXT NOT NULL,
            parent_id            TEXT,
            lamport_ts           INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        CREATE INDEX IF NOT EXISTS idx_tasks_priority ON tasks(priority DESC, created_at ASC);
        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_lamport ON tasks(lamport_ts);

        CREATE TABLE IF NOT EXISTS agents (
            id         TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            node_id    TEXT NOT NULL,
            status     TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_agents_node_status ON agents(node_id, status);

        CREATE TABLE IF NOT EXISTS identities (
            did        TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS credentials (
            id          TEXT PRIMARY KEY,
            data        TEXT NOT NULL,
            subject_did TEXT NOT NULL,
            type        TEXT NOT NULL,
            lamport_ts  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credentials_subject_type ON credentials(subject_did, type);

        CREATE TABLE IF NOT EXISTS offerings (
            id         TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tributes (
            id         TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bounties (
            id         TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            status     TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id         TEXT PRIMARY KEY,
            data       TEXT NOT NULL,
            lamport_ts INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS wallet_ledger (
            id          TEXT PRIMARY KEY,
            swarm_id    TEXT NOT NULL,
            delta       REAL NOT NULL,
            reason      TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reputation (
            swarm_id              TEXT NOT NULL,
            node_id               TEXT NOT NULL,
            completion_rate       REAL NOT NULL,
            reliability           REAL NOT NULL,
            speed_score           REAL NOT NULL,
            last_seen             TEXT NOT NULL,
            PRIMARY KEY (swarm_id, node_id)
        );
        "#,
    ),
];

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;
    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    for (version, sql) in MIGRATIONS {
        if *version > current {
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        }
    }
    Ok(())
}
