//! The session gate: records checks and decides on gating commands.
//!
//! The gate is the only stateful component. It is handed a [`SessionStore`]
//! and a config, loads the session's record on every event, and writes it
//! back only when something changed. Storage failures never change the
//! decision: an unreadable record is treated as empty (so the session may be
//! asked again, never waved through) and a failed write is reported in
//! [`GateOutcome::storage_errors`] for logging.

use crate::classifier::Classification;
use crate::config::{GateConfig, ResetPolicy};
use crate::error::{Error, Result};
use crate::session::{GatingKind, MissingChecks, SessionState};
use crate::traits::SessionStore;
use chrono::Utc;
use std::collections::BTreeSet;

/// What to do with the intercepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Let the command run.
    Allow,
    /// Let the command run although checks are missing, because the session
    /// was already warned about this gap.
    AllowWarned {
        /// The checks still missing.
        missing: MissingChecks,
    },
    /// Hold the command back and show the advisory.
    Block {
        /// The checks that have not run.
        missing: MissingChecks,
    },
}

impl GateDecision {
    /// Check if this is a block decision.
    pub const fn is_block(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    /// Short name for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::AllowWarned { .. } => "allow-warned",
            Self::Block { .. } => "block",
        }
    }
}

/// Result of handling one event.
#[derive(Debug)]
pub struct GateOutcome {
    /// The decision.
    pub decision: GateDecision,
    /// Storage failures that were worked around.
    pub storage_errors: Vec<Error>,
}

/// Per-session state machine over an injected store.
pub struct SessionGate<'a> {
    store: &'a dyn SessionStore,
    config: &'a GateConfig,
}

impl<'a> SessionGate<'a> {
    /// Create a gate over `store` with the given policy.
    pub fn new(store: &'a dyn SessionStore, config: &'a GateConfig) -> Self {
        Self { store, config }
    }

    /// Handle an intercepted command.
    ///
    /// Checks the command runs are recorded first; if it is also gating, the
    /// decision is made against the updated state, so `make test && git commit`
    /// counts its own test run.
    pub fn handle_command(&self, session_id: &str, classification: &Classification) -> GateOutcome {
        let mut storage_errors = Vec::new();
        let mut state = self.load_or_empty(session_id, &mut storage_errors);

        let mut dirty = state.record_checks(&classification.matched_checks);

        let decision = if classification.is_gating() {
            self.decide(&mut state, &classification.gating, &mut dirty)
        } else {
            GateDecision::Allow
        };

        if dirty {
            if let Err(e) = self.persist(session_id, &mut state) {
                storage_errors.push(e);
            }
        }

        GateOutcome { decision, storage_errors }
    }

    /// Reset the session after a gating command completed successfully.
    ///
    /// Does nothing unless the reset policy is `on-success` and one of
    /// `completed` is listed in `reset_on`. Returns true if the session was
    /// reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleared state cannot be written.
    pub fn reset_after_success(
        &self,
        session_id: &str,
        completed: &BTreeSet<GatingKind>,
    ) -> Result<bool> {
        if self.config.reset != ResetPolicy::OnSuccess || !self.triggers_reset(completed) {
            return Ok(false);
        }

        // Nothing to clear; avoid creating records for idle sessions
        if let Ok(state) = self.store.load(session_id) {
            if state.as_ref().map_or(true, SessionState::is_empty) {
                return Ok(false);
            }
        }

        self.reset(session_id)?;
        Ok(true)
    }

    /// Clear a session's satisfied checks and warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleared state cannot be written.
    pub fn reset(&self, session_id: &str) -> Result<()> {
        self.persist(session_id, &mut SessionState::default())
    }

    /// The session's stored state, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub fn status(&self, session_id: &str) -> Result<Option<SessionState>> {
        self.store.load(session_id)
    }

    fn decide(
        &self,
        state: &mut SessionState,
        gating: &BTreeSet<GatingKind>,
        dirty: &mut bool,
    ) -> GateDecision {
        let missing = state.missing(&self.config.required_checks);

        let decision = if missing.is_empty() {
            GateDecision::Allow
        } else {
            match self.config.policy.signature_for(&missing) {
                None => GateDecision::Block { missing },
                Some(signature) if state.has_warned(&signature) => {
                    GateDecision::AllowWarned { missing }
                }
                Some(signature) => {
                    state.record_warning(signature);
                    *dirty = true;
                    GateDecision::Block { missing }
                }
            }
        };

        if !decision.is_block()
            && self.config.reset == ResetPolicy::OnAttempt
            && self.triggers_reset(gating)
            && !state.is_empty()
        {
            state.reset();
            *dirty = true;
        }

        decision
    }

    fn triggers_reset(&self, kinds: &BTreeSet<GatingKind>) -> bool {
        kinds.iter().any(|kind| self.config.resets_on(*kind))
    }

    fn load_or_empty(&self, session_id: &str, errors: &mut Vec<Error>) -> SessionState {
        match self.store.load(session_id) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                errors.push(e);
                SessionState::default()
            }
        }
    }

    fn persist(&self, session_id: &str, state: &mut SessionState) -> Result<()> {
        state.updated_at = Some(Utc::now());
        self.store.save(session_id, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CommandClassifier;
    use crate::config::WarningPolicy;
    use crate::session::CheckKind;
    use crate::testing::{FailingSessionStore, MemorySessionStore};

    fn run(gate: &SessionGate<'_>, session: &str, command: &str) -> GateDecision {
        let classifier = CommandClassifier::default();
        gate.handle_command(session, &classifier.classify(command)).decision
    }

    fn commit_kinds() -> BTreeSet<GatingKind> {
        BTreeSet::from([GatingKind::Commit])
    }

    #[test]
    fn test_check_command_is_allowed_and_recorded() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        assert_eq!(run(&gate, "s", "make lint"), GateDecision::Allow);
        let state = store.get("s").unwrap();
        assert!(state.satisfied_checks.contains(&CheckKind::lint()));
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn test_unrelated_command_writes_nothing() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        assert_eq!(run(&gate, "s", "ls"), GateDecision::Allow);
        assert!(store.get("s").is_none());
    }

    #[test]
    fn test_block_then_allow_for_same_gap() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s1", "make lint");
        let first = run(&gate, "s1", "git commit -m x");
        let GateDecision::Block { missing } = first else {
            panic!("expected block, got {first:?}");
        };
        assert_eq!(missing.signature(), "format,test");

        let second = run(&gate, "s1", "git commit -m x");
        assert!(matches!(second, GateDecision::AllowWarned { .. }));
    }

    #[test]
    fn test_all_checks_allow_commit() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s2", "go test ./...");
        run(&gate, "s2", "make lint");
        run(&gate, "s2", "make fmt");
        assert_eq!(run(&gate, "s2", "git commit -m y"), GateDecision::Allow);
    }

    #[test]
    fn test_compound_command_satisfies_its_own_gate() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        let decision = run(&gate, "s", "make fmt && make lint && go test ./... && git commit -m x");
        assert_eq!(decision, GateDecision::Allow);
    }

    #[test]
    fn test_new_gap_blocks_again() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        // Gap {format, lint, test} warned
        assert!(run(&gate, "s", "git commit -m x").is_block());
        // Gap shrinks to {format, test}: a different signature
        run(&gate, "s", "make lint");
        assert!(run(&gate, "s", "git commit -m x").is_block());
        assert!(!run(&gate, "s", "git commit -m x").is_block());
    }

    #[test]
    fn test_warn_once_policy_allows_any_later_gap() {
        let store = MemorySessionStore::new();
        let config = GateConfig { policy: WarningPolicy::WarnOnce, ..Default::default() };
        let gate = SessionGate::new(&store, &config);

        assert!(run(&gate, "s", "git commit -m x").is_block());
        run(&gate, "s", "make lint");
        assert!(!run(&gate, "s", "git commit -m x").is_block());
        assert!(store.get("s").unwrap().has_warned("*"));
    }

    #[test]
    fn test_strict_policy_always_blocks() {
        let store = MemorySessionStore::new();
        let config = GateConfig { policy: WarningPolicy::Strict, ..Default::default() };
        let gate = SessionGate::new(&store, &config);

        assert!(run(&gate, "s", "git commit -m x").is_block());
        assert!(run(&gate, "s", "git commit -m x").is_block());
        assert!(store.get("s").is_none());
    }

    #[test]
    fn test_repeated_check_event_is_idempotent() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s", "make lint");
        let after_first = store.get("s").unwrap();
        let writes = store.save_count();

        run(&gate, "s", "make lint");
        assert_eq!(store.save_count(), writes);
        assert_eq!(store.get("s").unwrap(), after_first);
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        run(&gate, "a", "go test ./... && make lint && make fmt");
        assert_eq!(run(&gate, "a", "git commit -m x"), GateDecision::Allow);
        assert!(run(&gate, "b", "git commit -m x").is_block());
    }

    #[test]
    fn test_read_failure_fails_open_to_empty_state() {
        let store = FailingSessionStore;
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        let commit = CommandClassifier::default().classify("git commit");
        let outcome = gate.handle_command("s", &commit);
        assert!(outcome.decision.is_block());
        // One failed load, one failed save of the warning
        assert_eq!(outcome.storage_errors.len(), 2);
    }

    #[test]
    fn test_check_event_with_failing_store_still_allows() {
        let store = FailingSessionStore;
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        let outcome = gate.handle_command("s", &CommandClassifier::default().classify("make lint"));
        assert_eq!(outcome.decision, GateDecision::Allow);
        assert!(!outcome.storage_errors.is_empty());
    }

    #[test]
    fn test_corrupt_record_behaves_as_empty() {
        let store = MemorySessionStore::new();
        store.corrupt("s");
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        let commit = CommandClassifier::default().classify("git commit");
        let outcome = gate.handle_command("s", &commit);
        assert!(outcome.decision.is_block());
        assert_eq!(outcome.storage_errors.len(), 1);
        // The rewrite replaced the corrupt record
        assert!(store.get("s").is_some());
    }

    #[test]
    fn test_reset_after_success_clears_state() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s3", "go test ./... && make lint && make fmt");
        assert_eq!(run(&gate, "s3", "git commit -m z"), GateDecision::Allow);

        assert!(gate.reset_after_success("s3", &commit_kinds()).unwrap());
        assert!(store.get("s3").unwrap().is_empty());
        assert!(run(&gate, "s3", "git commit -m z").is_block());
    }

    #[test]
    fn test_reset_after_success_ignores_non_reset_kinds() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s", "make lint");
        assert!(!gate.reset_after_success("s", &BTreeSet::from([GatingKind::Push])).unwrap());
        assert!(!store.get("s").unwrap().is_empty());
    }

    #[test]
    fn test_reset_after_success_respects_policy() {
        let store = MemorySessionStore::new();
        let config = GateConfig { reset: ResetPolicy::Never, ..Default::default() };
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s", "make lint");
        assert!(!gate.reset_after_success("s", &commit_kinds()).unwrap());
        assert!(!store.get("s").unwrap().is_empty());
    }

    #[test]
    fn test_reset_after_success_skips_unknown_session() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        assert!(!gate.reset_after_success("ghost", &commit_kinds()).unwrap());
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn test_reset_on_attempt() {
        let store = MemorySessionStore::new();
        let config = GateConfig { reset: ResetPolicy::OnAttempt, ..Default::default() };
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s", "go test ./... && make lint && make fmt");
        assert_eq!(run(&gate, "s", "git commit -m x"), GateDecision::Allow);
        // The allowed attempt started a fresh cycle
        assert!(store.get("s").unwrap().is_empty());
        assert!(run(&gate, "s", "git commit -m x").is_block());
    }

    #[test]
    fn test_reset_on_attempt_not_after_block() {
        let store = MemorySessionStore::new();
        let config = GateConfig { reset: ResetPolicy::OnAttempt, ..Default::default() };
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s", "make lint");
        assert!(run(&gate, "s", "git commit -m x").is_block());
        let state = store.get("s").unwrap();
        assert!(state.satisfied_checks.contains(&CheckKind::lint()));
        assert!(state.has_warned("format,test"));
    }

    #[test]
    fn test_explicit_reset_and_status() {
        let store = MemorySessionStore::new();
        let config = GateConfig::default();
        let gate = SessionGate::new(&store, &config);

        run(&gate, "s", "make lint");
        assert!(gate.status("s").unwrap().is_some());
        gate.reset("s").unwrap();
        assert!(gate.status("s").unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(GateDecision::Allow.label(), "allow");
        assert_eq!(GateDecision::Block { missing: MissingChecks::default() }.label(), "block");
        assert_eq!(
            GateDecision::AllowWarned { missing: MissingChecks::default() }.label(),
            "allow-warned"
        );
    }
}
