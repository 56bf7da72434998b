// Durable session store backed by SQLite

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::{Slot, StoreError, TokenStore};

/// Key/value store over a single SQLite table
///
/// Survives process restarts within the same profile directory, which is the
/// durability contract the session layer needs. The connection is serialized
/// behind a mutex; slot operations are short single-statement transactions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;

        tracing::debug!(path = %path.display(), "Opened session store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory SQLite database, used by tests that need the real backend
    /// without touching the filesystem
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl TokenStore for SqliteStore {
    fn get(&self, slot: Slot) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let value = conn
            .query_row(
                "SELECT value FROM session_kv WHERE key = ?",
                [slot.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, slot: Slot, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO session_kv (key, value) VALUES (?, ?)",
            [slot.key(), value],
        )?;
        Ok(())
    }

    fn delete(&self, slot: Slot) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM session_kv WHERE key = ?", [slot.key()])?;
        Ok(())
    }
}
