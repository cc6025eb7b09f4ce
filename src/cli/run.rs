//! Command execution for the CLI.
//!
//! This module handles running CLI commands and producing output. Hook
//! commands never fail: every problem they meet is logged to the debug log
//! and the tool call is allowed.

use crate::classifier::CommandClassifier;
use crate::cli::Command;
use crate::config::{self, GateConfig, CONFIG_FILE_PATH};
use crate::gate::SessionGate;
use crate::hook_logging::HookEventLog;
use crate::hooks::{
    is_disabled, parse_hook_input, run_post_tool_use, run_pre_tool_use, GateContext, HookOutcome,
};
use crate::session::SessionState;
use crate::store;
use crate::sweep::{maybe_sweep, sweep_now};
use crate::templates::{self, TEMPLATES_DIR};
use serde_json::json;
use std::path::Path;
use std::process::ExitCode;
use tera::Context;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

impl CliOutput {
    const fn silent() -> Self {
        Self { exit_code: ExitCode::SUCCESS, stdout: vec![], stderr: vec![] }
    }

    fn stdout(message: String) -> Self {
        Self { exit_code: ExitCode::SUCCESS, stdout: vec![message], stderr: vec![] }
    }

    fn stderr(message: String) -> Self {
        Self { exit_code: ExitCode::SUCCESS, stdout: vec![], stderr: vec![message] }
    }
}

/// Run a CLI command with the given stdin input in the current directory.
pub fn run(command: Command, stdin: &str) -> CliOutput {
    run_in(command, stdin, Path::new("."))
}

/// Run a CLI command against the project rooted at `base_dir`.
pub fn run_in(command: Command, stdin: &str, base_dir: &Path) -> CliOutput {
    match command {
        Command::PreToolUse | Command::PostToolUse => run_hook(&command, stdin, base_dir),
        Command::Classify { command } => run_classify(&command, base_dir),
        Command::Status { session, json } => run_status(&session, json, base_dir),
        Command::Reset { session, forget } => run_reset(&session, forget, base_dir),
        Command::Sweep => run_sweep(base_dir),
        Command::Version => run_version(),
        Command::EnsureConfig => run_ensure_config(base_dir),
        Command::ShowConfig => run_show_config(base_dir),
    }
}

// === Hook Commands ===

fn run_hook(command: &Command, stdin: &str, base_dir: &Path) -> CliOutput {
    if is_disabled() {
        return CliOutput::silent();
    }

    let config = GateConfig::load_or_default(base_dir);
    let events = HookEventLog::for_config(&config);
    if let Some(hook_type) = command.hook_type() {
        events.log_hook_event(hook_type, stdin);
    }

    let input = match parse_hook_input(stdin) {
        Ok(input) => input,
        Err(e) => {
            events.log_event("parse_error", &json!({ "error": e.to_string() }));
            return CliOutput::silent();
        }
    };

    let store = store::open_or_unavailable(&config);
    let classifier = CommandClassifier::from_config(&config);
    let ctx = GateContext {
        config: &config,
        classifier: &classifier,
        store: store.as_ref(),
        events: &events,
    };

    let outcome = match command {
        Command::PostToolUse => run_post_tool_use(&input, &ctx),
        _ => run_pre_tool_use(&input, &ctx),
    };

    match maybe_sweep(store.as_ref(), &config, &mut rand::thread_rng()) {
        Some(Ok(removed)) => events.log_event("sweep", &json!({ "removed": removed })),
        Some(Err(e)) => events.log_error("sweep_error", input.session_id(), &e),
        None => {}
    }

    hook_output(outcome)
}

fn hook_output(outcome: HookOutcome) -> CliOutput {
    CliOutput {
        exit_code: exit_code_from_i32(outcome.exit_code),
        stdout: vec![],
        stderr: outcome.messages,
    }
}

// === Session Commands ===

fn run_classify(command: &str, base_dir: &Path) -> CliOutput {
    let config = match load_config(base_dir) {
        Ok(c) => c,
        Err(e) => return error_output(e),
    };
    let classification = CommandClassifier::from_config(&config).classify(command);
    match serde_json::to_string_pretty(&classification) {
        Ok(json) => CliOutput::stdout(json),
        Err(e) => error_output(format!("Error serializing classification: {e}")),
    }
}

fn run_status(session_id: &str, as_json: bool, base_dir: &Path) -> CliOutput {
    let config = match load_config(base_dir) {
        Ok(c) => c,
        Err(e) => return error_output(e),
    };
    let store = match store::open(&config) {
        Ok(s) => s,
        Err(e) => return error_output(format!("Error opening session store: {e}")),
    };
    let state = match SessionGate::new(store.as_ref(), &config).status(session_id) {
        Ok(s) => s,
        Err(e) => return error_output(format!("Error reading session {session_id}: {e}")),
    };

    if as_json {
        return match serde_json::to_string_pretty(&state) {
            Ok(json) => CliOutput::stdout(json),
            Err(e) => error_output(format!("Error serializing state: {e}")),
        };
    }

    let ctx = status_context(session_id, state, &config);
    match templates::render("messages/session_status.tera", &ctx) {
        Ok(text) => CliOutput::stdout(text),
        Err(e) => error_output(format!("Error rendering status: {e}")),
    }
}

fn status_context(session_id: &str, state: Option<SessionState>, config: &GateConfig) -> Context {
    let exists = state.is_some();
    let state = state.unwrap_or_default();
    let satisfied: Vec<String> = state.satisfied_checks.iter().map(ToString::to_string).collect();
    let missing: Vec<String> =
        state.missing(&config.required_checks).iter().map(ToString::to_string).collect();

    let mut ctx = Context::new();
    ctx.insert("session_id", session_id);
    ctx.insert("exists", &exists);
    ctx.insert(
        "updated_at",
        &state.updated_at.map_or_else(|| "never".to_string(), |at| at.to_rfc3339()),
    );
    ctx.insert("satisfied", &satisfied);
    ctx.insert("missing", &missing);
    ctx.insert("warned", &state.warned_signatures);
    ctx
}

fn run_reset(session_id: &str, forget: bool, base_dir: &Path) -> CliOutput {
    let config = match load_config(base_dir) {
        Ok(c) => c,
        Err(e) => return error_output(e),
    };
    let store = match store::open(&config) {
        Ok(s) => s,
        Err(e) => return error_output(format!("Error opening session store: {e}")),
    };

    if forget {
        return match store.remove(session_id) {
            Ok(true) => CliOutput::stderr(format!("Removed session {session_id}")),
            Ok(false) => CliOutput::stderr(format!("No state for session {session_id}")),
            Err(e) => error_output(format!("Error removing session {session_id}: {e}")),
        };
    }

    match SessionGate::new(store.as_ref(), &config).reset(session_id) {
        Ok(()) => CliOutput::stderr(format!("Reset session {session_id}")),
        Err(e) => error_output(format!("Error resetting session {session_id}: {e}")),
    }
}

fn run_sweep(base_dir: &Path) -> CliOutput {
    let config = match load_config(base_dir) {
        Ok(c) => c,
        Err(e) => return error_output(e),
    };
    let store = match store::open(&config) {
        Ok(s) => s,
        Err(e) => return error_output(format!("Error opening session store: {e}")),
    };

    match sweep_now(store.as_ref(), &config) {
        Ok(removed) => CliOutput::stderr(format!(
            "Removed {removed} session record(s) older than {} days",
            config.retention_days
        )),
        Err(e) => error_output(format!("Error sweeping session store: {e}")),
    }
}

// === Utility Commands ===

fn run_version() -> CliOutput {
    CliOutput::stderr(format!("commit-gate v{}", crate::VERSION))
}

fn run_ensure_config(base_dir: &Path) -> CliOutput {
    match config::ensure_config_in(base_dir) {
        Ok((config, created)) => {
            let verb = if created { "Created" } else { "Config ensured at" };
            let mut messages = vec![format!("{verb} {CONFIG_FILE_PATH}")];
            messages.push(format!("  policy: {}", config.policy));
            messages.push(format!("  reset: {}", config.reset));
            let required: Vec<String> =
                config.required_checks.iter().map(ToString::to_string).collect();
            messages.push(format!("  required_checks: {}", required.join(", ")));
            CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![], stderr: messages }
        }
        Err(e) => error_output(format!("Error ensuring config: {e}")),
    }
}

fn run_show_config(base_dir: &Path) -> CliOutput {
    let config = match load_config(base_dir) {
        Ok(c) => c,
        Err(e) => return error_output(e),
    };
    let yaml = match serde_yaml::to_string(&config) {
        Ok(y) => y,
        Err(e) => return error_output(format!("Error serializing config: {e}")),
    };
    let mut problems: Vec<String> =
        config.validate().into_iter().map(|p| format!("warning: {p}")).collect();
    if let Err(e) = templates::verify_templates(&base_dir.join(TEMPLATES_DIR)) {
        problems.push(format!("warning: {e}"));
    }
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![yaml], stderr: problems }
}

// === Helpers ===

/// Load config strictly: a missing file means defaults, a broken one is an
/// error.
fn load_config(base_dir: &Path) -> Result<GateConfig, String> {
    GateConfig::load_from(base_dir)
        .map(Option::unwrap_or_default)
        .map_err(|e| format!("Error loading {CONFIG_FILE_PATH}: {e}"))
}

fn error_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::from(1), stdout: vec![], stderr: vec![message] }
}

pub(crate) fn exit_code_from_i32(code: i32) -> ExitCode {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let code_u8 = if code < 0 {
        1u8
    } else if code > 255 {
        255u8
    } else {
        code as u8
    };
    ExitCode::from(code_u8)
}
