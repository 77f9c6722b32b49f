//! Configuration validation with unknown field detection.

use serde_json::Value;
use std::collections::HashSet;

use super::Config;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "agent",
    "game",
    "provider",
    "retry",
    "compaction",
    "tools",
    "logging",
];

/// Known fields of the `game` section.
const KNOWN_GAME: &[&str] = &[
    "base_url",
    "family_a_path",
    "family_b_path",
    "session_header",
    "request_timeout_secs",
    "username",
    "password",
    "bootstrap_attempts",
    "bootstrap_base_delay_ms",
    "direct_commands",
    "direct_prefix",
    "routed_commands",
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

fn unknown_keys(
    obj: &serde_json::Map<String, Value>,
    known: &[&str],
    section: &str,
    out: &mut Vec<Diagnostic>,
) -> bool {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    let mut found = false;
    for key in obj.keys() {
        if !known_set.contains(key.as_str()) {
            found = true;
            let path = if section.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", section, key)
            };
            out.push(Diagnostic::new(
                DiagnosticLevel::Error,
                path,
                format!("Unknown field '{}'", key),
            ));
        }
    }
    found
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "",
                "Config must be a JSON object",
            ));
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let mut has_unknown = unknown_keys(obj, KNOWN_TOP_LEVEL, "", &mut diagnostics);
    if let Some(game) = obj.get("game").and_then(|v| v.as_object()) {
        has_unknown |= unknown_keys(game, KNOWN_GAME, "game", &mut diagnostics);
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    diagnostics
}

/// Semantic checks on a loaded configuration.
pub fn validate_semantics(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let game = &config.game;

    if game.username.is_some() != game.password.is_some() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "game.username",
            "username and password must be set together; sessions will stay anonymous",
        ));
    }

    for cmd in &game.direct_commands {
        if !cmd.starts_with(&game.direct_prefix) {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                "game.direct_commands",
                format!(
                    "'{}' does not start with direct_prefix '{}'",
                    cmd, game.direct_prefix
                ),
            ));
        }
        if game.routed_commands.contains(cmd) {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Warn,
                "game.routed_commands",
                format!("'{}' is both direct and routed; direct wins", cmd),
            ));
        }
    }

    if game.bootstrap_attempts == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "game.bootstrap_attempts",
            "must be at least 1",
        ));
    }

    let threshold = config.compaction.threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "compaction.threshold",
            format!("{} is outside (0.0, 1.0]", threshold),
        ));
    }

    if config.compaction.min_recent_messages == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "compaction.min_recent_messages",
            "must be at least 1",
        ));
    }

    if config.compaction.recent_budget_tokens == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "compaction.recent_budget_tokens",
            "must be greater than 0",
        ));
    }

    if config.provider.api_key.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "provider.api_key",
            "no API key configured; set GAMEPILOT_PROVIDER_API_KEY",
        ));
    }

    diagnostics
}
