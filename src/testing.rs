//! Testing utilities and mock implementations.
//!
//! These types are provided for use in tests. They may appear unused in
//! the library itself but are consumed by unit tests.

#![allow(dead_code)]

use crate::error::{Error, Result};
use crate::hooks::{HookInput, ToolInput, ToolResponse};
use crate::session::SessionState;
use crate::traits::SessionStore;
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
enum Record {
    Valid(SessionState),
    Corrupt,
}

/// An in-memory session store.
///
/// Records can be marked corrupt to exercise the fail-open read path; a
/// later save replaces the corrupt record as a real backend would.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: RefCell<HashMap<String, Record>>,
    saves: Cell<usize>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored state for a session, if it is present and valid.
    pub fn get(&self, session_id: &str) -> Option<SessionState> {
        match self.records.borrow().get(session_id) {
            Some(Record::Valid(state)) => Some(state.clone()),
            _ => None,
        }
    }

    /// Make the session's record undecodable.
    pub fn corrupt(&self, session_id: &str) {
        self.records.borrow_mut().insert(session_id.to_string(), Record::Corrupt);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        match self.records.borrow().get(session_id) {
            None => Ok(None),
            Some(Record::Valid(state)) => Ok(Some(state.clone())),
            Some(Record::Corrupt) => Err(Error::InvalidSessionRecord {
                path: PathBuf::from(format!("memory://{session_id}")),
                reason: "corrupt record".to_string(),
            }),
        }
    }

    fn save(&self, session_id: &str, state: &SessionState) -> Result<()> {
        self.records.borrow_mut().insert(session_id.to_string(), Record::Valid(state.clone()));
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }

    fn remove(&self, session_id: &str) -> Result<bool> {
        Ok(self.records.borrow_mut().remove(session_id).is_some())
    }

    fn sweep(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|_, record| match record {
            Record::Valid(state) => state.updated_at.is_some_and(|at| at >= cutoff),
            Record::Corrupt => false,
        });
        Ok(before - records.len())
    }
}

/// A store whose every operation fails, as with an unwritable state directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSessionStore;

impl FailingSessionStore {
    fn error() -> Error {
        Error::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "store unavailable"))
    }
}

impl SessionStore for FailingSessionStore {
    fn load(&self, _session_id: &str) -> Result<Option<SessionState>> {
        Err(Self::error())
    }

    fn save(&self, _session_id: &str, _state: &SessionState) -> Result<()> {
        Err(Self::error())
    }

    fn remove(&self, _session_id: &str) -> Result<bool> {
        Err(Self::error())
    }

    fn sweep(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
        Err(Self::error())
    }
}

/// Build the hook input for a Bash command in a session.
pub fn bash_input(session_id: &str, command: &str) -> HookInput {
    HookInput {
        session_id: Some(session_id.to_string()),
        tool_name: Some("Bash".to_string()),
        tool_input: Some(ToolInput { command: Some(command.to_string()) }),
        tool_response: None,
    }
}

/// Build the post-tool-use input for a Bash command that produced `response`.
pub fn bash_result(session_id: &str, command: &str, response: ToolResponse) -> HookInput {
    HookInput { tool_response: Some(response), ..bash_input(session_id, command) }
}
