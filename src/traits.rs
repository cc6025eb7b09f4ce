//! Core traits for testability and abstraction.

use crate::error::Result;
use crate::session::SessionState;
use chrono::{DateTime, Utc};

/// Durable key-value storage of session state, keyed by session id.
///
/// Implementations keep one independent record per session so that a corrupt
/// record never affects another session.
pub trait SessionStore {
    /// Load a session's state.
    ///
    /// Returns `Ok(None)` if nothing has been stored for the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or decoded.
    fn load(&self, session_id: &str) -> Result<Option<SessionState>>;

    /// Store a session's state, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn save(&self, session_id: &str, state: &SessionState) -> Result<()>;

    /// Delete a session's record. Returns true if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be removed.
    fn remove(&self, session_id: &str) -> Result<bool>;

    /// Delete every record last written before `cutoff`. Returns how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be scanned at all. Failures on
    /// individual records are skipped.
    fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
