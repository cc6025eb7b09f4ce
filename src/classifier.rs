//! Shell command classification.
//!
//! Maps a raw Bash command to the check kinds it runs and the gating git
//! operations (commit, push) it contains. Commands are split into clauses on
//! top-level shell control operators; quoted text, command substitutions and
//! heredoc bodies never start a clause of their own. A clause that commits or
//! pushes never counts as a check, so `git commit -m "make lint"` does not
//! satisfy `lint` while `go test ./... && git commit -m x` satisfies `test`
//! and is gating.

use crate::config::GateConfig;
use crate::error::Result;
use crate::session::{CheckKind, GatingKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

/// Options git accepts before its subcommand, e.g. `git -C repo commit`.
const GIT_GLOBAL_OPTIONS: &str =
    r"(?:\s+(?:-[Cc]\s+\S+|--(?:git-dir|work-tree|namespace)(?:=|\s+)\S+|--?[A-Za-z][\w-]*))*";

/// Markers for gating git operations.
static GATING_PATTERNS: Lazy<Vec<(GatingKind, Regex)>> = Lazy::new(|| {
    vec![
        (GatingKind::Commit, git_subcommand("commit")),
        (GatingKind::Push, git_subcommand("push")),
    ]
});

fn git_subcommand(name: &str) -> Regex {
    Regex::new(&format!(r"\bgit{GIT_GLOBAL_OPTIONS}\s+{name}\b")).unwrap()
}

/// Built-in recognition rules: the kinds a match grants, and the pattern.
const DEFAULT_RULES: &[(&[&str], &str)] = &[
    // test
    (&["test"], r"\bgo\s+test\b"),
    (&["test"], r"\bmake\s+test\b"),
    (&["test"], r"\bcargo\s+(?:test|nextest)\b"),
    (&["test"], r"\b(?:npm|pnpm|yarn)\s+(?:run\s+)?test\b"),
    (&["test"], r"\bpytest\b"),
    (&["test"], r"\bjust\s+test\b"),
    // lint
    (&["lint"], r"\bmake\s+lint\b"),
    (&["lint"], r"\bgolangci-lint\s+run\b"),
    (&["lint"], r"\bgo\s+vet\b"),
    (&["lint"], r"\bcargo\s+clippy\b"),
    (&["lint"], r"\b(?:npm|pnpm|yarn)\s+(?:run\s+)?lint\b"),
    (&["lint"], r"\bruff\s+check\b"),
    (&["lint"], r"\bjust\s+lint\b"),
    // format
    (&["format"], r"\bmake\s+(?:fmt|format)\b"),
    (&["format"], r"\bgo\s+fmt\b"),
    (&["format"], r"\bgofmt\b"),
    (&["format"], r"\bgolangci-lint\s+fmt\b"),
    (&["format"], r"\bcargo\s+fmt\b"),
    (&["format"], r"\bprettier\b"),
    (&["format"], r"\bruff\s+format\b"),
    (&["format"], r"\bjust\s+fmt\b"),
    // golangci-lint with --fix also applies the configured formatters
    (&["lint", "format"], r"\bgolangci-lint\s+run\b.*\s--fix\b"),
];

/// Advice shown for the built-in kinds when a commit is blocked.
pub fn default_remediation(kind: &CheckKind) -> Option<&'static str> {
    match kind.as_str() {
        "test" => Some("go test ./..."),
        "lint" => Some("make lint"),
        "format" => Some("make fmt"),
        _ => None,
    }
}

/// A compiled recognition rule.
#[derive(Debug, Clone)]
pub struct CheckRule {
    kinds: Vec<CheckKind>,
    pattern: Regex,
}

impl CheckRule {
    /// Compile a rule granting `kinds` when `pattern` matches a clause.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regex.
    pub fn new(kinds: Vec<CheckKind>, pattern: &str) -> Result<Self> {
        Ok(Self { kinds, pattern: Regex::new(pattern)? })
    }

    /// The kinds this rule grants.
    pub fn kinds(&self) -> &[CheckKind] {
        &self.kinds
    }

    fn matches(&self, clause: &str) -> bool {
        self.pattern.is_match(clause)
    }
}

/// The built-in rules.
pub fn default_rules() -> Vec<CheckRule> {
    DEFAULT_RULES
        .iter()
        .map(|(kinds, pattern)| CheckRule {
            kinds: kinds.iter().copied().map(CheckKind::from).collect(),
            pattern: Regex::new(pattern).unwrap(),
        })
        .collect()
}

/// What a command does, as far as the gate cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Check kinds the command runs.
    pub matched_checks: BTreeSet<CheckKind>,
    /// Gated git operations the command performs.
    pub gating: BTreeSet<GatingKind>,
}

impl Classification {
    /// True if the command commits or pushes in a gated way.
    pub fn is_gating(&self) -> bool {
        !self.gating.is_empty()
    }

    /// True if the command is irrelevant to the gate.
    pub fn is_empty(&self) -> bool {
        self.matched_checks.is_empty() && self.gating.is_empty()
    }
}

/// Classifies shell commands against a set of rules.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    rules: Vec<CheckRule>,
    gated: BTreeSet<GatingKind>,
}

impl Default for CommandClassifier {
    fn default() -> Self {
        Self::new(default_rules(), [GatingKind::Commit].into_iter().collect())
    }
}

impl CommandClassifier {
    /// Create a classifier from explicit rules and gated operations.
    pub const fn new(rules: Vec<CheckRule>, gated: BTreeSet<GatingKind>) -> Self {
        Self { rules, gated }
    }

    /// Build the classifier described by `config`: the built-in rules plus any
    /// configured ones. Configured rules with invalid patterns are skipped;
    /// [`GateConfig::validate`] reports them.
    pub fn from_config(config: &GateConfig) -> Self {
        let mut rules = default_rules();
        rules.extend(
            config
                .checks
                .iter()
                .filter_map(|rule| CheckRule::new(rule.kinds.clone(), &rule.pattern).ok()),
        );
        Self::new(rules, config.gated_kinds())
    }

    /// Classify a raw command string. Never fails.
    pub fn classify(&self, command: &str) -> Classification {
        let mut result = Classification::default();

        for clause in clauses(command) {
            let gating = gating_in_clause(&clause);
            if gating.is_empty() {
                for rule in self.rules.iter().filter(|rule| rule.matches(&clause)) {
                    result.matched_checks.extend(rule.kinds.iter().cloned());
                }
            } else {
                result.gating.extend(gating.into_iter().filter(|kind| self.gated.contains(kind)));
            }
        }

        result
    }

    /// Whether any rule grants `kind`.
    pub fn recognizes(&self, kind: &CheckKind) -> bool {
        self.rules.iter().any(|rule| rule.kinds.contains(kind))
    }
}

/// Every gating git operation in `command`, whether or not it is gated.
///
/// Used when deciding on resets, where a push may matter even if pushes are
/// not held back.
pub fn detect_gating_kinds(command: &str) -> BTreeSet<GatingKind> {
    clauses(command).iter().flat_map(|clause| gating_in_clause(clause)).collect()
}

/// Where the scanner is while reading a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Inside `"..."`.
    DoubleQuoted,
    /// Inside `$(...)`, with the number of unclosed `(` seen within it.
    Substitution(usize),
}

/// A heredoc whose body starts after the current line.
#[derive(Debug)]
struct Heredoc {
    delimiter: String,
    strip_tabs: bool,
}

/// Split `command` into clauses at top-level `&&`, `||`, `;`, `|` and
/// newlines.
///
/// Quoted text and `$(...)` stay inside the clause they appear in, and
/// heredoc bodies are dropped, so a multi-line commit message stays part of
/// its commit.
fn clauses(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut heredocs: Vec<Heredoc> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if scopes.last() == Some(&Scope::DoubleQuoted) {
            match (c, next) {
                ('\\', Some(escaped)) => {
                    current.push(c);
                    current.push(escaped);
                    i += 2;
                    continue;
                }
                ('$', Some('(')) => {
                    scopes.push(Scope::Substitution(0));
                    current.push_str("$(");
                    i += 2;
                    continue;
                }
                ('"', _) => {
                    scopes.pop();
                }
                _ => {}
            }
            current.push(c);
            i += 1;
            continue;
        }

        let top_level = scopes.is_empty();
        match (c, next) {
            ('\\', Some(escaped)) => {
                current.push(c);
                current.push(escaped);
                i += 2;
                continue;
            }
            ('\'', _) => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == '\'')
                    .map_or(chars.len(), |offset| i + offset + 2);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            ('"', _) => scopes.push(Scope::DoubleQuoted),
            ('$', Some('(')) => {
                scopes.push(Scope::Substitution(0));
                current.push_str("$(");
                i += 2;
                continue;
            }
            ('(', _) => {
                if let Some(Scope::Substitution(depth)) = scopes.last_mut() {
                    *depth += 1;
                }
            }
            (')', _) => match scopes.last().copied() {
                Some(Scope::Substitution(0)) => {
                    scopes.pop();
                }
                Some(Scope::Substitution(depth)) => {
                    scopes.pop();
                    scopes.push(Scope::Substitution(depth - 1));
                }
                _ => {}
            },
            ('<', Some('<')) => {
                // <<< is a here-string, not a heredoc
                if chars.get(i + 2) == Some(&'<') {
                    current.push_str("<<<");
                    i += 3;
                    continue;
                }
                let (heredoc, end) = read_heredoc(&chars, i + 2);
                current.extend(&chars[i..end]);
                heredocs.extend(heredoc);
                i = end;
                continue;
            }
            ('\n', _) => {
                if top_level {
                    finish_clause(&mut clauses, &mut current);
                } else {
                    current.push(c);
                }
                i = skip_heredoc_bodies(&chars, i + 1, &mut heredocs);
                continue;
            }
            ('&', Some('&')) | ('|', Some('|')) if top_level => {
                finish_clause(&mut clauses, &mut current);
                i += 2;
                continue;
            }
            (';' | '|', _) if top_level => {
                finish_clause(&mut clauses, &mut current);
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }

    finish_clause(&mut clauses, &mut current);
    clauses
}

fn finish_clause(clauses: &mut Vec<String>, current: &mut String) {
    let clause = current.trim();
    if !clause.is_empty() {
        clauses.push(clause.to_string());
    }
    current.clear();
}

/// Read the delimiter following `<<` at `start`, returning the heredoc and
/// the index just past the delimiter word.
fn read_heredoc(chars: &[char], start: usize) -> (Option<Heredoc>, usize) {
    let mut i = start;
    let strip_tabs = chars.get(i) == Some(&'-');
    if strip_tabs {
        i += 1;
    }
    while matches!(chars.get(i), Some(' ' | '\t')) {
        i += 1;
    }

    let mut delimiter = String::new();
    let mut quote = None;
    while let Some(&c) = chars.get(i) {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => delimiter.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '\\' => {}
            None if c.is_whitespace() || ";|&<>()".contains(c) => break,
            None => delimiter.push(c),
        }
        i += 1;
    }

    let heredoc = (!delimiter.is_empty()).then_some(Heredoc { delimiter, strip_tabs });
    (heredoc, i)
}

/// Skip the bodies of pending heredocs starting at line `start`, returning
/// the index just past the last terminator line. An unterminated body runs
/// to the end of the command.
fn skip_heredoc_bodies(chars: &[char], start: usize, pending: &mut Vec<Heredoc>) -> usize {
    let mut i = start;
    for heredoc in pending.drain(..) {
        while i < chars.len() {
            let end = chars[i..].iter().position(|&c| c == '\n').map_or(chars.len(), |p| i + p);
            let line: String = chars[i..end].iter().collect();
            i = (end + 1).min(chars.len());
            let line =
                if heredoc.strip_tabs { line.trim_start_matches('\t') } else { line.as_str() };
            if line.trim_end() == heredoc.delimiter {
                break;
            }
        }
    }
    i
}

fn gating_in_clause(clause: &str) -> Vec<GatingKind> {
    GATING_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(clause))
        .map(|(kind, _)| *kind)
        .collect()
}
