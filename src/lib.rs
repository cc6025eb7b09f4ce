//! # `commit_gate`
//!
//! A Claude Code hook that holds back `git commit` until the session has run
//! the project's tests, linter and formatter.
//!
//! The [`classifier`] maps a shell command to the checks it runs and whether
//! it commits; the [`gate`] keeps per-session state in a [`SessionStore`]
//! and decides whether a commit may proceed. The [`hooks`] glue both to the
//! hook protocol.

pub mod classifier;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod hook_logging;
pub mod hooks;
pub mod paths;
pub mod session;
pub mod store;
pub mod sweep;
pub mod templates;
pub mod testing;
pub mod traits;

pub use classifier::{Classification, CommandClassifier};
pub use config::GateConfig;
pub use error::{Error, Result};
pub use gate::{GateDecision, GateOutcome, SessionGate};
pub use session::{CheckKind, GatingKind, MissingChecks, SessionState};
pub use traits::SessionStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
