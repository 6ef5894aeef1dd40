//! Shared slot storage.
//!
//! The medium every execution context can see: small string values under
//! string keys, with a per-write time-to-live. There is no compare-and-swap;
//! concurrent writers to one key resolve as last-write-wins.

mod memory;
mod sqlite;

use std::time::Duration;

use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to create store directory: {0}")]
    CreateDir(std::io::Error),
    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Key-value medium shared by all contexts.
pub trait SlotStore: Send + Sync {
    /// Current value under `key`, or `None` if absent or expired.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Extend the lifetime of a live entry without changing its value.
    /// Returns false if the entry is absent or expired.
    fn touch(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Every live entry whose key starts with `prefix`.
    fn scan_all(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

fn expiry(now_ms: u64, ttl: Duration) -> u64 {
    now_ms.saturating_add(ttl.as_millis().min(u64::MAX as u128) as u64)
}
