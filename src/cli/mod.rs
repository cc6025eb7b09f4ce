//! CLI for commit-gate.
//!
//! Hook commands read the hook JSON from stdin; the rest are maintenance
//! commands for inspecting and clearing session state by hand.

mod run;


pub use run::{run, run_in, CliOutput};

use crate::session::DEFAULT_SESSION_ID;
use clap::{Parser, Subcommand};

/// Commit gate - hold back `git commit` until tests, lint and format have run.
///
/// Install `pre-tool-use` and `post-tool-use` as Claude Code hooks for the
/// Bash tool. Settings live in `.claude/commit-gate.yaml`.
#[derive(Parser, Debug)]
#[command(name = "commit-gate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show how a shell command is classified.
    ///
    /// Prints the check kinds the command satisfies and whether it is a
    /// gating command, as JSON.
    Classify {
        /// The shell command to classify
        command: String,
    },

    /// Show the stored state of a session.
    Status {
        /// Session identifier
        #[arg(long, default_value = DEFAULT_SESSION_ID)]
        session: String,

        /// Print the raw state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear a session's satisfied checks and warnings.
    Reset {
        /// Session identifier
        #[arg(long, default_value = DEFAULT_SESSION_ID)]
        session: String,

        /// Delete the record instead of clearing it
        #[arg(long)]
        forget: bool,
    },

    /// Delete session records older than the retention window.
    Sweep,

    // === Utility Commands ===
    /// Show version information.
    Version,

    /// Ensure config file exists (create with defaults if not).
    #[command(name = "ensure-config")]
    EnsureConfig,

    /// Print the effective config as YAML and report problems with it.
    #[command(name = "show-config")]
    ShowConfig,

    // === Hook Commands (receive JSON from stdin) ===
    /// Run the pre-tool-use hook (stdin: JSON hook input).
    ///
    /// Records check commands and blocks commits with missing checks.
    /// Not intended for direct use.
    #[command(name = "pre-tool-use", hide = true)]
    PreToolUse,

    /// Run the post-tool-use hook (stdin: JSON hook input).
    ///
    /// Resets the session after a successful commit.
    /// Not intended for direct use.
    #[command(name = "post-tool-use", hide = true)]
    PostToolUse,
}

impl Command {
    /// Returns true if this command requires stdin input.
    #[must_use]
    pub const fn needs_stdin(&self) -> bool {
        self.is_hook()
    }

    /// Returns true if this is a hook command (invoked by the plugin system).
    #[must_use]
    pub const fn is_hook(&self) -> bool {
        matches!(self, Self::PreToolUse | Self::PostToolUse)
    }

    /// Returns the hook type name for logging, or None for non-hook commands.
    #[must_use]
    pub const fn hook_type(&self) -> Option<&'static str> {
        match self {
            Self::PreToolUse => Some("pre-tool-use"),
            Self::PostToolUse => Some("post-tool-use"),
            _ => None,
        }
    }
}
