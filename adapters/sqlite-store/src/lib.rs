//! sqlite-store: SQLite implementation of the `KeyValueStore` port.
//!
//! Purpose
//! - Give the local backend a file that survives restarts, standing in for the
//!   browser-style key-value storage the mock backend was designed around.
//! - One table, one row per key; values are opaque strings (the backend stores
//!   JSON text).
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - `set` is an upsert: last write wins, no versioning.

use std::path::Path;

use domain::{CoreError, KeyValueStore};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

/// Default database location.
pub const DEFAULT_PATH: &str = "./data/referrals.db";

/// SQLite-backed key-value store.
pub struct SqliteStore {
    conn: std::sync::Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path.as_ref()).map_err(map_sqerr)?;
        init_schema(&conn)?;
        debug!(path = %path.as_ref().display(), "sqlite store opened");
        Ok(Self { conn: std::sync::Mutex::new(conn) })
    }

    /// Open a private in-memory database (nothing touches disk).
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: std::sync::Mutex::new(conn) })
    }

    /// Like `new`, creating missing parent directories first.
    pub fn open_creating_dirs<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| CoreError::Store(format!("create {}: {e}", dir.display())))?;
            }
        }
        Self::new(path)
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<usize, CoreError> {
        let conn = self.conn.lock().map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .map_err(map_sqerr)?;
        Ok(n as usize)
    }

    pub fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.len()? == 0)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Store(format!("sqlite error: {e}"))
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let conn = self.conn.lock().map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(map_sqerr)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let conn = self.conn.lock().map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        conn.execute(
            "INSERT INTO kv(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(map_sqerr)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        let conn = self.conn.lock().map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(map_sqerr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_db() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let store = SqliteStore::new(path).unwrap();
        (store, dir)
    }

    #[test]
    fn set_get_roundtrip() {
        let (store, _dir) = tmp_db();
        store.set("mock_sellers", r#"[{"id":"vendedor-1"}]"#).unwrap();
        let got = store.get("mock_sellers").unwrap().unwrap();
        assert_eq!(got, r#"[{"id":"vendedor-1"}]"#);
    }

    #[test]
    fn missing_key_is_none() {
        let (store, _dir) = tmp_db();
        assert_eq!(store.get("mock_users").unwrap(), None);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn set_overwrites_last_write_wins() {
        let (store, _dir) = tmp_db();
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn remove_deletes_and_tolerates_missing() {
        let (store, _dir) = tmp_db();
        store.set("mock_user", "{}").unwrap();
        store.remove("mock_user").unwrap();
        store.remove("mock_user").unwrap();
        assert_eq!(store.get("mock_user").unwrap(), None);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("t.db");
        {
            let store = SqliteStore::open_creating_dirs(&path).unwrap();
            store.set("mock_indications", "[]").unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.get("mock_indications").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn in_memory_store_works() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("a", "b").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("b"));
    }
}
