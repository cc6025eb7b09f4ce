//! Configuration management for commit-gate.
//!
//! This module handles the `.claude/commit-gate.yaml` file which stores
//! project-specific settings for the gate. Every field is optional; a missing
//! file means the defaults.

use crate::classifier::{default_remediation, CheckRule, CommandClassifier};
use crate::error::{Error, Result};
use crate::paths;
use crate::session::{CheckKind, GatingKind, ANY_MISSING_SIGNATURE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file path relative to project root.
pub const CONFIG_FILE_PATH: &str = ".claude/commit-gate.yaml";

/// Default retention window for session records.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Default fraction of hook invocations that run the retention sweep.
pub const DEFAULT_SWEEP_PROBABILITY: f64 = 0.1;

/// How often a session is blocked for missing checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WarningPolicy {
    /// Block once per distinct set of missing checks.
    #[default]
    PerMissingSet,
    /// Block the first gating attempt with anything missing, then allow.
    WarnOnce,
    /// Block every gating attempt while anything is missing.
    Strict,
}

impl WarningPolicy {
    /// The signature to record for `missing`, or `None` if this policy never
    /// records one.
    pub fn signature_for(self, missing: &crate::session::MissingChecks) -> Option<String> {
        match self {
            Self::PerMissingSet => Some(missing.signature()),
            Self::WarnOnce => Some(ANY_MISSING_SIGNATURE.to_string()),
            Self::Strict => None,
        }
    }

    /// The name used in the config file.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerMissingSet => "per-missing-set",
            Self::WarnOnce => "warn-once",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for WarningPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What starts a fresh verification cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// A gating command that completed successfully (post-tool-use).
    #[default]
    OnSuccess,
    /// A gating command that the gate allowed (pre-tool-use).
    OnAttempt,
    /// Never; checks stay satisfied for the whole session.
    Never,
}

impl ResetPolicy {
    /// The name used in the config file.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnSuccess => "on-success",
            Self::OnAttempt => "on-attempt",
            Self::Never => "never",
        }
    }
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where session state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per session.
    #[default]
    File,
    /// One row per session in a `SQLite` database.
    Sqlite,
}

/// An extra recognition rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckRuleConfig {
    /// Kinds granted when the pattern matches.
    pub kinds: Vec<CheckKind>,
    /// Case-sensitive regex matched against each command clause.
    pub pattern: String,
    /// Advice for the kinds this rule grants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// Project configuration for the gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Blocking granularity.
    pub policy: WarningPolicy,
    /// What resets a session.
    pub reset: ResetPolicy,
    /// Gating kinds whose success (or attempt) resets the session.
    pub reset_on: Vec<GatingKind>,
    /// Whether `git push` is held back as well as `git commit`.
    pub gate_push: bool,
    /// Check kinds that must have run before a gating command.
    pub required_checks: BTreeSet<CheckKind>,
    /// Session records untouched for longer than this are swept.
    pub retention_days: u32,
    /// Fraction of hook invocations that run the sweep.
    pub sweep_probability: f64,
    /// Storage backend.
    pub storage: StorageBackend,
    /// Directory for session state; defaults to `~/.commit-gate`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// Append hook events and decisions to `<state_dir>/hook-events.jsonl`.
    pub debug_logging: bool,
    /// Per-kind advice overrides.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub remediation: BTreeMap<CheckKind, String>,
    /// Rules added to the built-in ones.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckRuleConfig>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            policy: WarningPolicy::default(),
            reset: ResetPolicy::default(),
            reset_on: vec![GatingKind::Commit],
            gate_push: false,
            required_checks: [CheckKind::test(), CheckKind::lint(), CheckKind::format()]
                .into_iter()
                .collect(),
            retention_days: DEFAULT_RETENTION_DAYS,
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
            storage: StorageBackend::default(),
            state_dir: None,
            debug_logging: false,
            remediation: BTreeMap::new(),
            checks: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Load config from a specific base directory, returning None if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = Self::config_path(base_dir);
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)?;
        if content.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Load config for the hooks: any problem means defaults.
    pub fn load_or_default(base_dir: &Path) -> Self {
        Self::load_from(base_dir).ok().flatten().unwrap_or_default()
    }

    /// Save config to a specific base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(base_dir);

        // Ensure .claude directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config file path for a base directory.
    pub fn config_path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE_PATH)
    }

    /// The directory holding session state.
    ///
    /// # Errors
    ///
    /// Returns an error if no directory is configured and the home directory
    /// is unknown.
    pub fn resolve_state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(paths::expand_home(dir)),
            None => paths::data_dir().ok_or(Error::NoStateDir),
        }
    }

    /// Operations the gate holds back.
    pub fn gated_kinds(&self) -> BTreeSet<GatingKind> {
        let mut kinds = BTreeSet::from([GatingKind::Commit]);
        if self.gate_push {
            kinds.insert(GatingKind::Push);
        }
        kinds
    }

    /// Whether a completed or attempted `kind` resets the session.
    pub fn resets_on(&self, kind: GatingKind) -> bool {
        self.reset != ResetPolicy::Never && self.reset_on.contains(&kind)
    }

    /// Retention window for the sweep.
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    /// Advice for running a check of `kind`.
    ///
    /// Explicit overrides win, then advice attached to configured rules, then
    /// the built-in advice.
    pub fn remediation_for(&self, kind: &CheckKind) -> String {
        if let Some(advice) = self.remediation.get(kind) {
            return advice.clone();
        }
        let from_rule = self
            .checks
            .iter()
            .filter(|rule| rule.kinds.contains(kind))
            .find_map(|rule| rule.remediation.clone());
        from_rule
            .or_else(|| default_remediation(kind).map(str::to_string))
            .unwrap_or_else(|| format!("run the {kind} checks"))
    }

    /// Problems with this config that the hooks silently work around.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for rule in &self.checks {
            if let Err(e) = CheckRule::new(rule.kinds.clone(), &rule.pattern) {
                problems.push(format!("check pattern '{}' is invalid: {e}", rule.pattern));
            }
            if rule.kinds.is_empty() {
                problems.push(format!("check pattern '{}' grants no kinds", rule.pattern));
            }
        }

        if !(0.0..=1.0).contains(&self.sweep_probability) {
            problems.push(format!(
                "sweep_probability {} is outside 0.0..=1.0",
                self.sweep_probability
            ));
        }

        let classifier = CommandClassifier::from_config(self);
        for kind in &self.required_checks {
            if !classifier.recognizes(kind) {
                problems.push(format!("required check '{kind}' has no rule that recognizes it"));
            }
        }

        if chrono::Utc::now().checked_sub_signed(self.retention()).is_none() {
            problems.push(format!(
                "retention_days {} is beyond the supported date range; nothing will be swept",
                self.retention_days
            ));
        }

        if self.reset == ResetPolicy::Never && !self.reset_on.is_empty() {
            problems.push("reset_on is ignored because reset is 'never'".to_string());
        }

        problems
    }
}

/// Ensure config exists in a specific directory, creating it with defaults if not.
///
/// Returns the config and whether it was newly created.
///
/// # Errors
///
/// Returns an error if config cannot be loaded or saved.
pub fn ensure_config_in(base_dir: &Path) -> Result<(GateConfig, bool)> {
    if let Some(config) = GateConfig::load_from(base_dir)? {
        return Ok((config, false));
    }

    let config = GateConfig::default();
    config.save_to(base_dir)?;
    Ok((config, true))
}
