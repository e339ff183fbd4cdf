//! SQLite-backed storage adapter.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{check_capacity, entry_size, KeyValueStore, StorageResult, DEFAULT_CAPACITY_BYTES};

/// Schema for the key/value table.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Key/value storage in a single SQLite table.
pub struct SqliteStorage {
    conn: Connection,
    capacity: usize,
}

impl SqliteStorage {
    /// Open storage at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create in-memory storage (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            capacity: DEFAULT_CAPACITY_BYTES,
        })
    }

    /// Bound the storage to `capacity` bytes.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn used_bytes(conn: &Connection) -> StorageResult<usize> {
    let used: i64 = conn.query_row(
        "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0) FROM kv_store",
        [],
        |row| row.get(0),
    )?;
    Ok(used.max(0) as usize)
}

fn get_value(conn: &Connection, key: &str) -> StorageResult<Option<String>> {
    conn.query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(Into::into)
}

impl KeyValueStore for SqliteStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        get_value(&self.conn, key)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let capacity = self.capacity;
        let tx = self.conn.transaction()?;

        let old_size = get_value(&tx, key)?
            .map(|old| entry_size(key, &old))
            .unwrap_or(0);
        check_capacity(used_bytes(&tx)?, old_size, entry_size(key, value), capacity)?;

        tx.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn used_bytes(&self) -> StorageResult<usize> {
        used_bytes(&self.conn)
    }

    fn capacity_bytes(&self) -> usize {
        self.capacity
    }
}
