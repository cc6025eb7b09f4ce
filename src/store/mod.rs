//! Durable session state storage.
//!
//! Two backends implement [`SessionStore`]: one JSON file per session (the
//! default) and a `SQLite` table with one row per session.

mod file;
mod sqlite;

pub use file::FileSessionStore;
pub use sqlite::SqliteSessionStore;

use crate::config::{GateConfig, StorageBackend};
use crate::error::{Error, Result};
use crate::paths;
use crate::session::SessionState;
use crate::traits::SessionStore;
use chrono::{DateTime, Utc};

/// Open the store the config selects.
///
/// # Errors
///
/// Returns an error if no state directory can be determined or the database
/// cannot be initialized.
pub fn open(config: &GateConfig) -> Result<Box<dyn SessionStore>> {
    let state_dir = config.resolve_state_dir()?;
    match config.storage {
        StorageBackend::File => {
            Ok(Box::new(FileSessionStore::new(paths::sessions_dir(&state_dir))))
        }
        StorageBackend::Sqlite => {
            Ok(Box::new(SqliteSessionStore::with_path(paths::database_path(&state_dir))?))
        }
    }
}

/// Open the configured store, or one that fails every operation with the
/// reason it could not be opened.
///
/// Hooks use this so an unusable state directory behaves like unreadable
/// state instead of skipping the gate.
pub fn open_or_unavailable(config: &GateConfig) -> Box<dyn SessionStore> {
    open(config).unwrap_or_else(|e| Box::new(UnavailableStore { reason: e.to_string() }))
}

/// A store that could not be opened.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    fn error(&self) -> Error {
        Error::Io(std::io::Error::other(format!("session store unavailable: {}", self.reason)))
    }
}

impl SessionStore for UnavailableStore {
    fn load(&self, _session_id: &str) -> Result<Option<SessionState>> {
        Err(self.error())
    }

    fn save(&self, _session_id: &str, _state: &SessionState) -> Result<()> {
        Err(self.error())
    }

    fn remove(&self, _session_id: &str) -> Result<bool> {
        Err(self.error())
    }

    fn sweep(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CheckKind;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir, storage: StorageBackend) -> GateConfig {
        GateConfig { state_dir: Some(dir.path().to_path_buf()), storage, ..Default::default() }
    }

    #[test]
    fn test_open_file_store() {
        let dir = TempDir::new().unwrap();
        let store = open(&config_for(&dir, StorageBackend::File)).unwrap();

        let mut state = SessionState::default();
        state.record_checks(&[CheckKind::test()]);
        store.save("s1", &state).unwrap();

        assert!(dir.path().join(paths::SESSIONS_DIR_NAME).exists());
        assert_eq!(store.load("s1").unwrap(), Some(state));
    }

    #[test]
    fn test_open_sqlite_store() {
        let dir = TempDir::new().unwrap();
        let store = open(&config_for(&dir, StorageBackend::Sqlite)).unwrap();

        store.save("s1", &SessionState::default()).unwrap();

        assert!(dir.path().join(paths::DATABASE_FILENAME).exists());
        assert!(store.load("s1").unwrap().is_some());
    }

    #[test]
    fn test_unopenable_store_fails_every_operation() {
        let dir = TempDir::new().unwrap();
        // A file where the database directory would go
        let blocker = dir.path().join("state");
        std::fs::write(&blocker, "not a directory").unwrap();
        let config = GateConfig {
            state_dir: Some(blocker),
            storage: StorageBackend::Sqlite,
            ..Default::default()
        };

        assert!(open(&config).is_err());
        let store = open_or_unavailable(&config);
        let err = store.load("s").unwrap_err();
        assert!(err.to_string().contains("session store unavailable"), "{err}");
        assert!(store.save("s", &SessionState::default()).is_err());
        assert!(store.remove("s").is_err());
        assert!(store.sweep(Utc::now()).is_err());
    }
}
