//! Per-session gate state.
//!
//! A session accumulates the check kinds it has seen run and the warning
//! signatures it has already been blocked for. Both sets only grow until a
//! reset (normally a successful commit) clears them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Session id used when the hook input does not carry one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Signature recorded by the warn-once policy, standing for "any gap".
pub const ANY_MISSING_SIGNATURE: &str = "*";

/// A category of verification the gate wants evidence of (`test`, `lint`, ...).
///
/// Kinds are open-ended so that configuration can add tags such as `docs`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckKind(String);

impl CheckKind {
    /// Create a check kind from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The `test` kind.
    pub fn test() -> Self {
        Self::new("test")
    }

    /// The `lint` kind.
    pub fn lint() -> Self {
        Self::new("lint")
    }

    /// The `format` kind.
    pub fn format() -> Self {
        Self::new("format")
    }

    /// The kind's name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckKind {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A git operation the gate can hold back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatingKind {
    /// `git commit`
    Commit,
    /// `git push`
    Push,
}

impl GatingKind {
    /// The git invocation this kind stands for.
    pub const fn command(self) -> &'static str {
        match self {
            Self::Commit => "git commit",
            Self::Push => "git push",
        }
    }
}

impl fmt::Display for GatingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => f.write_str("commit"),
            Self::Push => f.write_str("push"),
        }
    }
}

/// Durable state for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Check kinds observed as executed this session.
    #[serde(default)]
    pub satisfied_checks: BTreeSet<CheckKind>,
    /// Missing-set signatures the session has already been blocked for.
    #[serde(default)]
    pub warned_signatures: BTreeSet<String>,
    /// When the record was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Union `kinds` into the satisfied set. Returns true if anything was added.
    pub fn record_checks<'a>(&mut self, kinds: impl IntoIterator<Item = &'a CheckKind>) -> bool {
        let before = self.satisfied_checks.len();
        self.satisfied_checks.extend(kinds.into_iter().cloned());
        self.satisfied_checks.len() != before
    }

    /// Required kinds that have not been satisfied yet.
    pub fn missing(&self, required: &BTreeSet<CheckKind>) -> MissingChecks {
        MissingChecks(required.difference(&self.satisfied_checks).cloned().collect())
    }

    /// Whether the session was already blocked for `signature`.
    pub fn has_warned(&self, signature: &str) -> bool {
        self.warned_signatures.contains(signature)
    }

    /// Record a warning signature. Returns true if it was new.
    pub fn record_warning(&mut self, signature: impl Into<String>) -> bool {
        self.warned_signatures.insert(signature.into())
    }

    /// Start a fresh verification cycle.
    pub fn reset(&mut self) {
        self.satisfied_checks.clear();
        self.warned_signatures.clear();
    }

    /// True when neither set holds anything.
    pub fn is_empty(&self) -> bool {
        self.satisfied_checks.is_empty() && self.warned_signatures.is_empty()
    }
}

/// Required check kinds a session has not satisfied, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingChecks(BTreeSet<CheckKind>);

impl MissingChecks {
    /// True when nothing is missing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of missing kinds.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate the missing kinds in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &CheckKind> {
        self.0.iter()
    }

    /// Whether `kind` is among the missing ones.
    pub fn contains(&self, kind: &CheckKind) -> bool {
        self.0.contains(kind)
    }

    /// Stable encoding of this exact gap, e.g. `format,test`.
    pub fn signature(&self) -> String {
        self.0.iter().map(CheckKind::as_str).collect::<Vec<_>>().join(",")
    }
}

impl FromIterator<CheckKind> for MissingChecks {
    fn from_iter<I: IntoIterator<Item = CheckKind>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> BTreeSet<CheckKind> {
        [CheckKind::test(), CheckKind::lint(), CheckKind::format()].into_iter().collect()
    }

    #[test]
    fn test_record_checks_reports_change() {
        let mut state = SessionState::default();
        assert!(state.record_checks(&[CheckKind::lint()]));
        assert!(!state.record_checks(&[CheckKind::lint()]));
        assert_eq!(state.satisfied_checks.len(), 1);
    }

    #[test]
    fn test_missing_is_required_minus_satisfied() {
        let mut state = SessionState::default();
        state.record_checks(&[CheckKind::lint(), CheckKind::new("docs")]);

        let missing = state.missing(&required());
        assert_eq!(missing.len(), 2);
        assert!(missing.contains(&CheckKind::test()));
        assert!(missing.contains(&CheckKind::format()));
        assert!(!missing.contains(&CheckKind::lint()));
    }

    #[test]
    fn test_signature_is_sorted_and_stable() {
        let a: MissingChecks = [CheckKind::test(), CheckKind::format()].into_iter().collect();
        let b: MissingChecks = [CheckKind::format(), CheckKind::test()].into_iter().collect();
        assert_eq!(a.signature(), "format,test");
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_empty_missing_signature() {
        assert_eq!(MissingChecks::default().signature(), "");
        assert!(MissingChecks::default().is_empty());
    }

    #[test]
    fn test_reset_clears_both_sets() {
        let mut state = SessionState::default();
        state.record_checks(&[CheckKind::test()]);
        state.record_warning("lint");
        assert!(!state.is_empty());

        state.reset();
        assert!(state.is_empty());
    }

    #[test]
    fn test_record_warning_is_idempotent() {
        let mut state = SessionState::default();
        assert!(state.record_warning("format,test"));
        assert!(!state.record_warning("format,test"));
        assert!(state.has_warned("format,test"));
        assert!(!state.has_warned("test"));
    }

    #[test]
    fn test_state_json_shape() {
        let mut state = SessionState::default();
        state.record_checks(&[CheckKind::test()]);
        state.record_warning("format,lint");

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["satisfied_checks"], serde_json::json!(["test"]));
        assert_eq!(json["warned_signatures"], serde_json::json!(["format,lint"]));
        assert!(json.get("updated_at").is_none());
    }

    #[test]
    fn test_state_parses_with_missing_fields() {
        let state: SessionState = serde_json::from_str("{}").unwrap();
        assert!(state.is_empty());
        assert!(state.updated_at.is_none());
    }

    #[test]
    fn test_gating_kind_display_and_command() {
        assert_eq!(GatingKind::Commit.to_string(), "commit");
        assert_eq!(GatingKind::Push.command(), "git push");
        let json = serde_json::to_string(&GatingKind::Push).unwrap();
        assert_eq!(json, "\"push\"");
    }
}
