//! One JSON file per session.

use crate::error::{Error, Result};
use crate::paths;
use crate::session::SessionState;
use crate::traits::SessionStore;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of in-flight writes; renamed into place once complete.
const TEMP_SUFFIX: &str = "tmp";

/// File-based session store.
///
/// Records live in `<dir>/<session-file-name>.json`. Writes go to a temporary
/// file first and are renamed into place, so a concurrent reader sees either
/// the old or the new record, never a partial one.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a session's record.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(paths::session_file_name(session_id))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let state = serde_json::from_str(&content)
            .map_err(|e| Error::InvalidSessionRecord { path, reason: e.to_string() })?;
        Ok(Some(state))
    }

    fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(session_id);
        let temp_path = path.with_extension(format!(
            "{}.{}.{TEMP_SUFFIX}",
            paths::SESSION_FILE_EXTENSION,
            std::process::id()
        ));

        let json = serde_json::to_string_pretty(state)?;
        fs::write(&temp_path, json)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<bool> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let extension = path.extension().and_then(|e| e.to_str());
            if extension != Some(paths::SESSION_FILE_EXTENSION) && extension != Some(TEMP_SUFFIX) {
                continue;
            }

            // Staleness is judged by mtime so unreadable records are swept too
            let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) else {
                continue;
            };
            if DateTime::<Utc>::from(modified) < cutoff && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}
