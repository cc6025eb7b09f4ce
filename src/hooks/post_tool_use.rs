//! `PostToolUse` hook: start a fresh cycle after a successful commit.
//!
//! The hook never blocks; it only decides whether the command that just ran
//! succeeded and, if so, asks the gate to reset the session.

use crate::classifier::detect_gating_kinds;
use crate::gate::SessionGate;
use crate::hooks::{GateContext, HookInput, HookOutcome, ToolResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

/// Output lines that only appear when a commit or push went through.
static SUCCESS_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // [main abc1234] message, [main (root-commit) abc1234] message
        Regex::new(r"(?m)^\[[^\]\s]+(?: \([^)]*\))? [0-9a-f]{4,40}\]").unwrap(),
        // abc1234..def5678  main -> main
        Regex::new(r"(?m)^\s*\+?[0-9a-f]{4,40}\.\.\.?[0-9a-f]{4,40}\s+\S+\s+->\s+\S+").unwrap(),
        Regex::new(r"(?m)^\s*\*\s+\[new (?:branch|tag)\]").unwrap(),
        Regex::new(r"Everything up-to-date").unwrap(),
    ]
});

/// Output lines git prints when a commit or push failed.
static ERROR_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?m)^(?:error|fatal):").unwrap(),
        Regex::new(r"!\s+\[(?:rejected|remote rejected)\]").unwrap(),
    ]
});

/// Whether the command behind `response` succeeded.
///
/// An interrupted command has failed. A reported exit code is trusted next.
/// Without one, a success marker in the output decides; failing that, the
/// command succeeded unless the output carries an error marker.
pub fn command_succeeded(response: Option<&ToolResponse>) -> bool {
    let output = response.map(ToolResponse::output).unwrap_or_default();
    if output.interrupted {
        return false;
    }
    if let Some(code) = output.exit_code {
        return code == 0;
    }

    let text = format!("{}\n{}", output.stdout, output.stderr);
    if SUCCESS_MARKERS.iter().any(|re| re.is_match(&text)) {
        return true;
    }
    !ERROR_MARKERS.iter().any(|re| re.is_match(&text))
}

/// Run the result-driven reset for the given input.
///
/// Always lets the tool result through; a failed reset is logged and
/// otherwise ignored.
pub fn run_post_tool_use(input: &HookInput, ctx: &GateContext<'_>) -> HookOutcome {
    let Some(command) = input.bash_command() else {
        return HookOutcome::allow();
    };

    let completed = detect_gating_kinds(command);
    if completed.is_empty() {
        return HookOutcome::allow();
    }

    let succeeded = command_succeeded(input.tool_response.as_ref());
    let session_id = input.session_id();
    let mut reset = false;
    if succeeded {
        let gate = SessionGate::new(ctx.store, ctx.config);
        match gate.reset_after_success(session_id, &completed) {
            Ok(done) => reset = done,
            Err(e) => ctx.events.log_error("storage_error", session_id, &e),
        }
    }

    ctx.events.log_event(
        "result",
        &json!({
            "session_id": session_id,
            "command": command,
            "gating": completed,
            "succeeded": succeeded,
            "reset": reset,
        }),
    );

    HookOutcome::allow()
}
