//! Debug hook event logging.
//!
//! When `debug_logging` is enabled in the project config, every hook
//! invocation and every gate decision is appended as a JSONL line to
//! `<state_dir>/hook-events.jsonl`. This allows debugging gate behavior by
//! inspecting exactly what events were received and what was decided.

use crate::config::GateConfig;
use serde_json::{json, Value};
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Log file name within the state directory.
pub const HOOK_EVENTS_FILE: &str = "hook-events.jsonl";

/// Append-only JSONL event log; a no-op when disabled.
///
/// Write errors are silently ignored.
#[derive(Debug, Clone, Default)]
pub struct HookEventLog {
    path: Option<PathBuf>,
}

impl HookEventLog {
    /// A log that records nothing.
    pub const fn disabled() -> Self {
        Self { path: None }
    }

    /// A log writing to `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()) }
    }

    /// The log the config asks for: enabled only with `debug_logging` and a
    /// resolvable state directory.
    pub fn for_config(config: &GateConfig) -> Self {
        if !config.debug_logging {
            return Self::disabled();
        }
        config
            .resolve_state_dir()
            .map_or_else(|_| Self::disabled(), |dir| Self::at(dir.join(HOOK_EVENTS_FILE)))
    }

    /// Whether anything will be written.
    pub const fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Where entries go, if enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record the raw input a hook received.
    pub fn log_hook_event(&self, hook_type: &str, raw_input: &str) {
        if !self.is_enabled() {
            return;
        }
        // Embed valid JSON as-is, anything else as a string
        let input: Value = serde_json::from_str(raw_input)
            .unwrap_or_else(|_| Value::String(raw_input.to_string()));
        self.append(&json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "hook_type": hook_type,
            "input": input,
        }));
    }

    /// Record a named event with structured data.
    pub fn log_event(&self, event: &str, data: &Value) {
        if !self.is_enabled() {
            return;
        }
        self.append(&json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        }));
    }

    /// Record an error that was worked around.
    pub fn log_error(&self, event: &str, session_id: &str, error: &dyn Display) {
        self.log_event(event, &json!({ "session_id": session_id, "error": error.to_string() }));
    }

    fn append(&self, entry: &Value) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) else {
            return;
        };
        let _ = writeln!(file, "{entry}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read_log_lines(path: &Path) -> Vec<Value> {
        if !path.exists() {
            return vec![];
        }
        let content = std::fs::read_to_string(path).unwrap();
        content
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_log_hook_event_when_enabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(HOOK_EVENTS_FILE);
        let log = HookEventLog::at(&path);

        let input = r#"{"tool_name": "Bash", "tool_input": {"command": "make lint"}}"#;
        log.log_hook_event("pre-tool-use", input);

        let lines = read_log_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["hook_type"], "pre-tool-use");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[0]["input"]["tool_input"]["command"], "make lint");
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let log = HookEventLog::disabled();
        assert!(!log.is_enabled());
        assert!(log.path().is_none());
        log.log_hook_event("pre-tool-use", "{}");
        log.log_event("decision", &json!({}));
    }

    #[test]
    fn test_for_config() {
        let dir = TempDir::new().unwrap();
        let config = GateConfig { state_dir: Some(dir.path().to_path_buf()), ..Default::default() };
        assert!(!HookEventLog::for_config(&config).is_enabled());

        let config = GateConfig { debug_logging: true, ..config };
        let log = HookEventLog::for_config(&config);
        assert_eq!(log.path(), Some(dir.path().join(HOOK_EVENTS_FILE).as_path()));
    }

    #[test]
    fn test_log_multiple_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(HOOK_EVENTS_FILE);
        let log = HookEventLog::at(&path);

        log.log_hook_event("pre-tool-use", r#"{"tool_name": "Bash"}"#);
        log.log_event("decision", &json!({"decision": "block"}));
        log.log_error("storage_error", "s1", &"permission denied");

        let lines = read_log_lines(&path);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["hook_type"], "pre-tool-use");
        assert_eq!(lines[1]["event"], "decision");
        assert_eq!(lines[1]["data"]["decision"], "block");
        assert_eq!(lines[2]["data"]["session_id"], "s1");
        assert_eq!(lines[2]["data"]["error"], "permission denied");
    }

    #[test]
    fn test_log_hook_event_invalid_json_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(HOOK_EVENTS_FILE);
        HookEventLog::at(&path).log_hook_event("post-tool-use", "not valid json");

        let lines = read_log_lines(&path);
        assert_eq!(lines.len(), 1);
        // Invalid JSON should be stored as a string
        assert_eq!(lines[0]["input"], "not valid json");
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(HOOK_EVENTS_FILE);
        HookEventLog::at(&path).log_event("decision", &json!({}));
        assert_eq!(read_log_lines(&path).len(), 1);
    }

    #[test]
    fn test_directory_creation_fails() {
        let dir = TempDir::new().unwrap();
        // A file where the directory would go, so create_dir_all fails
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "blocking file").unwrap();

        // Should not panic, just silently skip
        HookEventLog::at(blocker.join(HOOK_EVENTS_FILE)).log_event("decision", &json!({}));
        assert!(blocker.is_file());
    }

    #[test]
    fn test_file_open_fails() {
        let dir = TempDir::new().unwrap();
        // Log path is a directory so opening it fails
        let path = dir.path().join(HOOK_EVENTS_FILE);
        std::fs::create_dir(&path).unwrap();

        HookEventLog::at(&path).log_event("decision", &json!({}));
        assert!(path.is_dir());
    }

    #[test]
    fn test_entry_timestamp_is_rfc3339() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(HOOK_EVENTS_FILE);
        HookEventLog::at(&path).log_hook_event("pre-tool-use", "{}");

        let lines = read_log_lines(&path);
        let ts = lines[0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
