//! File-backed shared store.
//!
//! Several OS processes opening the same database file see one medium, which
//! is how independent contexts share state outside a single process.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::{expiry, SlotStore, StoreError};
use crate::util::Clock;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS slot_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);";

/// SQLite-backed slot store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
    /// Path to the database file
    pub path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store at the specified path
    pub fn open(path: PathBuf, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(2))?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
            path,
        })
    }

    /// Open the store in the default location (~/.trailmark/slots.db)
    pub fn open_default(clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        Self::open(crate::util::store_path(), clock)
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn).map_err(StoreError::Sqlite)
    }

    fn now(&self) -> i64 {
        self.clock.now_ms() as i64
    }
}

impl SlotStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.now();
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM slot_store WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()
        })
    }

    fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = expiry(self.clock.now_ms(), ttl) as i64;
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO slot_store (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute("DELETE FROM slot_store WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    fn touch(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = self.now();
        let expires_at = expiry(self.clock.now_ms(), ttl) as i64;
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE slot_store SET expires_at = ?1 WHERE key = ?2 AND expires_at > ?3",
                params![expires_at, key, now],
            )?;
            Ok(updated > 0)
        })
    }

    fn scan_all(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let now = self.now();
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM slot_store
                 WHERE substr(key, 1, length(?1)) = ?1 AND expires_at > ?2
                 ORDER BY key",
            )?;
            let rows = stmt
                .query_map(params![prefix, now], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
            Ok(rows)
        })
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish()
    }
}
