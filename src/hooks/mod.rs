//! Hook implementations for Claude Code.
//!
//! Input is decoded once into [`HookInput`]; every field is optional and a
//! missing field maps to a documented default. Hooks only act on the Bash
//! tool.

mod advisory;
mod post_tool_use;
mod pre_tool_use;

pub use advisory::render_advisory;
pub use post_tool_use::{command_succeeded, run_post_tool_use};
pub use pre_tool_use::run_pre_tool_use;

use crate::classifier::CommandClassifier;
use crate::config::GateConfig;
use crate::error::Result;
use crate::hook_logging::HookEventLog;
use crate::session::DEFAULT_SESSION_ID;
use crate::traits::SessionStore;
use serde::Deserialize;

/// The tool whose commands the gate inspects.
pub const BASH_TOOL: &str = "Bash";

/// Exit code that blocks the tool call and shows stderr to the agent.
pub const BLOCK_EXIT_CODE: i32 = 2;

/// Environment variable that turns every hook into a no-op.
pub const DISABLE_ENV_VAR: &str = "COMMIT_GATE_DISABLE";

/// Input provided to hooks by Claude Code.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HookInput {
    /// Session identifier; `"default"` when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// The tool being called.
    #[serde(default)]
    pub tool_name: Option<String>,
    /// The tool input.
    #[serde(default)]
    pub tool_input: Option<ToolInput>,
    /// What the tool produced (`PostToolUse` only).
    #[serde(default, alias = "tool_result")]
    pub tool_response: Option<ToolResponse>,
}

impl HookInput {
    /// The session id, defaulting to `"default"` when absent or empty.
    pub fn session_id(&self) -> &str {
        self.session_id.as_deref().filter(|id| !id.is_empty()).unwrap_or(DEFAULT_SESSION_ID)
    }

    /// The shell command, if this is a Bash call that carries one.
    pub fn bash_command(&self) -> Option<&str> {
        if self.tool_name.as_deref() != Some(BASH_TOOL) {
            return None;
        }
        self.tool_input.as_ref().and_then(|ti| ti.command.as_deref())
    }
}

/// Tool input for the Bash tool.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolInput {
    /// The command being executed.
    #[serde(default)]
    pub command: Option<String>,
}

/// Captured result of a Bash command.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct BashOutput {
    /// Standard output.
    #[serde(default)]
    pub stdout: String,
    /// Standard error.
    #[serde(default)]
    pub stderr: String,
    /// Exit status, when the host reports one.
    #[serde(default, alias = "exitCode", alias = "exit_status")]
    pub exit_code: Option<i32>,
    /// Whether the command was interrupted.
    #[serde(default)]
    pub interrupted: bool,
}

/// The tool response, in whichever shape the host sent it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResponse {
    /// Structured output.
    Output(BashOutput),
    /// Plain text, treated as stdout.
    Text(String),
    /// Anything else; carries no evidence either way.
    Other(serde_json::Value),
}

impl ToolResponse {
    /// Structured view of the response.
    pub fn output(&self) -> BashOutput {
        match self {
            Self::Output(output) => output.clone(),
            Self::Text(text) => BashOutput { stdout: text.clone(), ..Default::default() },
            Self::Other(_) => BashOutput::default(),
        }
    }
}

/// Result of running a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutcome {
    /// Process exit code: 0 to proceed, [`BLOCK_EXIT_CODE`] to block.
    pub exit_code: i32,
    /// Messages to display (to stderr).
    pub messages: Vec<String>,
}

impl HookOutcome {
    /// Let the tool call proceed silently.
    pub const fn allow() -> Self {
        Self { exit_code: 0, messages: Vec::new() }
    }

    /// Block the tool call with an advisory.
    pub fn block(advisory: String) -> Self {
        Self { exit_code: BLOCK_EXIT_CODE, messages: vec![advisory] }
    }

    /// Check if this is a block decision.
    pub const fn is_block(&self) -> bool {
        self.exit_code == BLOCK_EXIT_CODE
    }
}

/// Everything a hook needs, owned by the caller for one invocation.
pub struct GateContext<'a> {
    /// Effective configuration.
    pub config: &'a GateConfig,
    /// Classifier built from the configuration.
    pub classifier: &'a CommandClassifier,
    /// Session state storage.
    pub store: &'a dyn SessionStore,
    /// Debug event log.
    pub events: &'a HookEventLog,
}

/// Parse hook input from stdin.
///
/// # Errors
///
/// Returns an error if the input cannot be parsed as JSON.
pub fn parse_hook_input(input: &str) -> Result<HookInput> {
    if input.trim().is_empty() {
        return Ok(HookInput::default());
    }
    let parsed: HookInput = serde_json::from_str(input)?;
    Ok(parsed)
}

/// Whether hooks are switched off through [`DISABLE_ENV_VAR`].
pub fn is_disabled() -> bool {
    std::env::var(DISABLE_ENV_VAR).is_ok_and(|v| !v.is_empty())
}
