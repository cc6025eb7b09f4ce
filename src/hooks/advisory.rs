//! Advisory text shown when a gating command is blocked.

use crate::config::{GateConfig, WarningPolicy};
use crate::session::{GatingKind, MissingChecks};
use crate::templates;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use tera::Context;

/// Template used for the block advisory.
const BLOCK_TEMPLATE: &str = "messages/commit_gate_block.tera";

#[derive(Debug, Serialize)]
struct MissingCheckView {
    kind: String,
    remediation: String,
}

/// Render the advisory listing each missing check and how to run it.
///
/// Falls back to plain text if the template cannot be rendered.
pub fn render_advisory(
    config: &GateConfig,
    missing: &MissingChecks,
    gating: &BTreeSet<GatingKind>,
) -> String {
    let mut gating_command =
        gating.iter().map(|kind| kind.command()).collect::<Vec<_>>().join(" / ");
    if gating_command.is_empty() {
        gating_command = GatingKind::Commit.command().to_string();
    }
    let checks: Vec<MissingCheckView> = missing
        .iter()
        .map(|kind| MissingCheckView {
            kind: kind.to_string(),
            remediation: config.remediation_for(kind),
        })
        .collect();
    let will_proceed = config.policy != WarningPolicy::Strict;

    let mut ctx = Context::new();
    ctx.insert("gating_command", &gating_command);
    ctx.insert("missing", &checks);
    ctx.insert("will_proceed", &will_proceed);

    templates::render(BLOCK_TEMPLATE, &ctx)
        .unwrap_or_else(|_| plain_advisory(&gating_command, &checks, will_proceed))
}

fn plain_advisory(gating_command: &str, checks: &[MissingCheckView], will_proceed: bool) -> String {
    let mut text =
        format!("Blocked `{gating_command}`: these checks have not run in this session:\n");
    for check in checks {
        let _ = writeln!(text, "  - {}: run `{}`", check.kind, check.remediation);
    }
    if will_proceed {
        let _ = write!(text, "Re-issue `{gating_command}` to proceed without them.");
    } else {
        let _ = write!(text, "Run them before trying `{gating_command}` again.");
    }
    text
}
