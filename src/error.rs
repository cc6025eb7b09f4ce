//! Error types for `commit_gate`.

use std::path::PathBuf;

/// Errors that can occur in the commit gate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON parsing error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error occurred.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SQLite` database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A regex error occurred.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A stored session record could not be decoded.
    #[error("Invalid session record at {path}: {reason}")]
    InvalidSessionRecord {
        /// Where the record lives (file path or database path).
        path: PathBuf,
        /// Why decoding failed.
        reason: String,
    },

    /// The configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// No directory is available for storing session state.
    #[error("Could not determine a state directory (no home directory and no state_dir configured)")]
    NoStateDir,

    /// A template error occurred.
    #[error("Template error: {0}")]
    Template(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_session_record_display() {
        let err = Error::InvalidSessionRecord {
            path: PathBuf::from("/tmp/s1.json"),
            reason: "expected value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/s1.json"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
