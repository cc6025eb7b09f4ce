//! `PreToolUse` hook: record checks and gate commits.

use crate::gate::{GateDecision, SessionGate};
use crate::hooks::{render_advisory, GateContext, HookInput, HookOutcome};
use serde_json::json;

/// Run the commit gate for the given input.
///
/// Non-Bash tools and commands that neither run checks nor commit are allowed
/// without touching storage. Storage problems are logged to the debug log and
/// otherwise ignored.
pub fn run_pre_tool_use(input: &HookInput, ctx: &GateContext<'_>) -> HookOutcome {
    let Some(command) = input.bash_command() else {
        return HookOutcome::allow();
    };

    let classification = ctx.classifier.classify(command);
    if classification.is_empty() {
        return HookOutcome::allow();
    }

    let session_id = input.session_id();
    let gate = SessionGate::new(ctx.store, ctx.config);
    let outcome = gate.handle_command(session_id, &classification);

    for error in &outcome.storage_errors {
        ctx.events.log_error("storage_error", session_id, error);
    }
    ctx.events.log_event(
        "decision",
        &json!({
            "session_id": session_id,
            "command": command,
            "matched_checks": classification.matched_checks,
            "gating": classification.gating,
            "decision": outcome.decision.label(),
        }),
    );

    match outcome.decision {
        GateDecision::Block { missing } => {
            HookOutcome::block(render_advisory(ctx.config, &missing, &classification.gating))
        }
        GateDecision::Allow | GateDecision::AllowWarned { .. } => HookOutcome::allow(),
    }
}
