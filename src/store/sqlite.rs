//! `SQLite`-based session storage.
//!
//! All sessions share one database at `<state_dir>/commit-gate.sqlite3`, one
//! row per session. The state column holds the same JSON as the file backend,
//! so a corrupt row only affects its own session.

use crate::error::{Error, Result};
use crate::session::SessionState;
use crate::traits::SessionStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long a writer waits for a concurrent invocation's lock.
const BUSY_TIMEOUT: Duration = Duration::from_millis(500);

/// SQLite-based session store.
///
/// Each operation opens a new connection to the database file. Hook
/// invocations are short-lived processes, so there is nothing to pool.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    /// Path to the database file.
    db_path: PathBuf,
}

impl SqliteSessionStore {
    /// Create a store with a specific database path, initializing the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn with_path(db_path: PathBuf) -> Result<Self> {
        let store = Self { db_path };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the database.
    fn open(&self) -> Result<Connection> {
        // Ensure parent directory exists
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(conn)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.open()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions (updated_at);
            ",
        )?;

        Ok(())
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        let conn = self.open()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| Error::InvalidSessionRecord {
                path: self.db_path.clone(),
                reason: format!("session {session_id}: {e}"),
            })
        })
        .transpose()
    }

    fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        let conn = self.open()?;
        let json = serde_json::to_string(state)?;
        let updated_at = state.updated_at.unwrap_or_else(Utc::now).timestamp();
        conn.execute(
            "INSERT INTO sessions (session_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
                 state = excluded.state,
                 updated_at = excluded.updated_at",
            params![session_id, json, updated_at],
        )?;
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<bool> {
        let conn = self.open()?;
        let deleted =
            conn.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
        Ok(deleted > 0)
    }

    fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.open()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE updated_at < ?1",
            params![cutoff.timestamp()],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CheckKind;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteSessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteSessionStore::with_path(dir.path().join("state/gate.sqlite3")).unwrap();
        (dir, store)
    }

    fn stamped(days_ago: i64) -> SessionState {
        SessionState {
            updated_at: Some(Utc::now() - ChronoDuration::days(days_ago)),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_store_creates_database() {
        let (_dir, store) = create_test_store();
        assert!(store.db_path().exists());
    }

    #[test]
    fn test_load_missing_session() {
        let (_dir, store) = create_test_store();
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_and_overwrite() {
        let (_dir, store) = create_test_store();
        let mut state = SessionState::default();
        state.record_checks(&[CheckKind::lint()]);
        store.save("s1", &state).unwrap();
        assert_eq!(store.load("s1").unwrap(), Some(state.clone()));

        state.record_warning("format,test");
        store.save("s1", &state).unwrap();
        assert_eq!(store.load("s1").unwrap(), Some(state));
    }

    #[test]
    fn test_corrupt_row_only_affects_its_session() {
        let (_dir, store) = create_test_store();
        store.save("good", &SessionState::default()).unwrap();
        let conn = Connection::open(store.db_path()).unwrap();
        conn.execute(
            "INSERT INTO sessions (session_id, state, updated_at) VALUES ('bad', 'oops', 0)",
            [],
        )
        .unwrap();

        assert!(matches!(store.load("bad"), Err(Error::InvalidSessionRecord { .. })));
        assert!(store.load("good").unwrap().is_some());
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = create_test_store();
        store.save("s1", &SessionState::default()).unwrap();
        assert!(store.remove("s1").unwrap());
        assert!(!store.remove("s1").unwrap());
    }

    #[test]
    fn test_sweep_uses_updated_at() {
        let (_dir, store) = create_test_store();
        store.save("old", &stamped(45)).unwrap();
        store.save("recent", &stamped(2)).unwrap();

        let removed = store.sweep(Utc::now() - ChronoDuration::days(30)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.load("old").unwrap().is_none());
        assert!(store.load("recent").unwrap().is_some());
    }

    #[test]
    fn test_open_fails_when_path_is_directory() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("gate.sqlite3");
        std::fs::create_dir_all(&db_path).unwrap();

        assert!(SqliteSessionStore::with_path(db_path).is_err());
    }
}
