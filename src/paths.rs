//! Path utilities for determining data storage locations.
//!
//! Session state is stored in `~/.commit-gate/` unless the project config
//! names another directory. Each session maps to a file name derived from its
//! id: a readable prefix plus a hash suffix, so arbitrary ids never escape the
//! sessions directory and similar ids never collide.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// The base directory name for commit-gate data.
const DATA_DIR_NAME: &str = ".commit-gate";

/// Subdirectory of the state dir holding one file per session.
pub const SESSIONS_DIR_NAME: &str = "sessions";

/// The database filename used by the `SQLite` backend.
pub const DATABASE_FILENAME: &str = "commit-gate.sqlite3";

/// Extension of session record files.
pub const SESSION_FILE_EXTENSION: &str = "json";

/// Longest readable prefix kept from a session id.
const MAX_PREFIX_LEN: usize = 48;

/// Get the base data directory for commit-gate.
///
/// Returns `~/.commit-gate/` or `None` if the home directory
/// cannot be determined.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME))
}

/// Directory holding per-session record files.
pub fn sessions_dir(state_dir: &Path) -> PathBuf {
    state_dir.join(SESSIONS_DIR_NAME)
}

/// Path of the `SQLite` database.
pub fn database_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DATABASE_FILENAME)
}

/// File name for a session's record.
///
/// Format: `<sanitized-id>-<hash>.json` e.g., `s1-a1b2c3d4e5f60718.json`
pub fn session_file_name(session_id: &str) -> String {
    let prefix: String = session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .take(MAX_PREFIX_LEN)
        .collect();
    let prefix = prefix.trim_matches('-');
    let prefix = if prefix.is_empty() { "session" } else { prefix };

    format!("{prefix}-{:016x}.{SESSION_FILE_EXTENSION}", hash_id(session_id))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

/// Compute a stable hash of a session id.
fn hash_id(session_id: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    hasher.finish()
}
