//! Durable key-value store for last-known-good quotes.
//!
//! Backed by a local SQLite database so cached quotes survive process
//! restarts. Entries are keyed `"quote_" + symbol` and written only on a
//! successful fetch; the client reads them only when a live fetch fails.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::warn;
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::StoreError;

/// SQLite-backed quote cache.
///
/// A single connection guarded by a mutex is sufficient here: the store is
/// touched once per fetch, and concurrent writers for the same key are
/// last-writer-wins by contract.
pub struct QuoteStore {
    conn: Mutex<Connection>,
}

impl QuoteStore {
    /// Open (or create) the store at the given path.
    ///
    /// Parent directories are created as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// In-memory store; contents do not survive the process.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS quote_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from poison if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("quote store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Read the serialized value for a key, if present.
    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock_conn();
        let value = conn
            .query_row(
                "SELECT value FROM quote_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or replace the serialized value for a key.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO quote_cache (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key_returns_none() {
        let store = QuoteStore::open_in_memory().unwrap();
        assert!(store.get("quote_AAPL").unwrap().is_none());
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let store = QuoteStore::open_in_memory().unwrap();
        store.set("quote_AAPL", r#"{"price":"175.50"}"#).unwrap();

        let value = store.get("quote_AAPL").unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"price":"175.50"}"#));
    }

    #[test]
    fn test_set_overwrites_existing_value() {
        let store = QuoteStore::open_in_memory().unwrap();
        store.set("quote_AAPL", "old").unwrap();
        store.set("quote_AAPL", "new").unwrap();

        assert_eq!(store.get("quote_AAPL").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.sqlite");

        {
            let store = QuoteStore::open(&path).unwrap();
            store.set("quote_MSFT", "cached").unwrap();
        }

        let store = QuoteStore::open(&path).unwrap();
        assert_eq!(store.get("quote_MSFT").unwrap().as_deref(), Some("cached"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("quotes.sqlite");
        let store = QuoteStore::open(&path).unwrap();
        store.set("quote_IBM", "x").unwrap();
        assert!(path.exists());
    }
}
