//! Configuration type definitions for GamePilot
//!
//! This module defines all configuration structs used throughout the crate.
//! All types implement serde traits for JSON serialization and have sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration struct for GamePilot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent configuration (model, tokens, rounds)
    pub agent: AgentDefaults,
    /// Game server connection and command routing
    pub game: GameConfig,
    /// LLM provider credentials
    pub provider: ProviderConfig,
    /// Retry behavior for model calls
    pub retry: RetryConfig,
    /// Context compaction configuration
    pub compaction: CompactionConfig,
    /// Tool execution configuration
    pub tools: ToolsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Default agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Model to use
    pub model: String,
    /// Maximum tokens for responses
    pub max_tokens: u32,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum think/act rounds per turn
    pub max_rounds: u32,
    /// Hard wall-clock limit for a single model call, in seconds
    pub model_timeout_secs: u64,
    /// System prompt sent with every model call
    pub system_prompt: String,
    /// Initial instruction placed at index 0 of a new conversation
    pub instruction: String,
}

/// Default model compile-time configuration.
/// Set `GAMEPILOT_DEFAULT_MODEL` at compile time to override.
const COMPILE_TIME_DEFAULT_MODEL: &str = match option_env!("GAMEPILOT_DEFAULT_MODEL") {
    Some(v) => v,
    None => "claude-sonnet-4-5-20250929",
};

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: COMPILE_TIME_DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_rounds: 30,
            model_timeout_secs: 120,
            system_prompt: "You are an autonomous player of an online game. \
                Use the available tools to observe the game and act. \
                Keep notes of your goals with the notes tools."
                .to_string(),
            instruction: "Log in, check your status, and pursue your current goals.".to_string(),
        }
    }
}

// ============================================================================
// Game Configuration
// ============================================================================

/// Game server connection and command routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Base URL of the game server (scheme + host, no trailing slash)
    pub base_url: String,
    /// Path prefix of endpoint family A
    pub family_a_path: String,
    /// Path prefix of endpoint family B
    pub family_b_path: String,
    /// Header carrying the session id
    pub session_header: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Login username (optional; anonymous sessions are used without it)
    pub username: Option<String>,
    /// Login password
    pub password: Option<String>,
    /// Attempts for the create+login bootstrap before giving up
    pub bootstrap_attempts: u32,
    /// Base delay for bootstrap backoff, doubled per attempt
    pub bootstrap_base_delay_ms: u64,
    /// Commands sent straight to family B (prefix stripped)
    pub direct_commands: Vec<String>,
    /// Prefix stripped from direct commands when building the path
    pub direct_prefix: String,
    /// Commands routed to family B when the payload carries a string `action`
    pub routed_commands: Vec<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            family_a_path: "/api/v1".to_string(),
            family_b_path: "/api/v2".to_string(),
            session_header: "X-Session-Id".to_string(),
            request_timeout_secs: 30,
            username: None,
            password: None,
            bootstrap_attempts: 3,
            bootstrap_base_delay_ms: 1_000,
            direct_commands: vec![
                "v2_get_player".to_string(),
                "v2_get_ship".to_string(),
                "v2_get_cargo".to_string(),
                "v2_get_skills".to_string(),
            ],
            direct_prefix: "v2_".to_string(),
            routed_commands: vec![
                "storage".to_string(),
                "market".to_string(),
                "faction".to_string(),
            ],
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom API base URL
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Retry behavior for model calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds for exponential backoff.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

// ============================================================================
// Compaction Configuration
// ============================================================================

/// Context compaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Whether automatic context compaction is enabled.
    pub enabled: bool,
    /// Model context window size in tokens.
    pub context_window: usize,
    /// Fraction (0.0-1.0) of `context_window` that triggers compaction.
    pub threshold: f64,
    /// Token budget of the verbatim recent window kept after compaction.
    pub recent_budget_tokens: usize,
    /// Minimum number of trailing messages kept verbatim.
    pub min_recent_messages: usize,
    /// Output token cap of the summarization call.
    pub summary_max_tokens: u32,
    /// Wall-clock limit of the summarization call, in seconds.
    pub summary_timeout_secs: u64,
    /// Characters of each tool result rendered into the summary transcript.
    pub tool_result_chars: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_window: 200_000,
            threshold: 0.75,
            recent_budget_tokens: 20_000,
            min_recent_messages: 6,
            summary_max_tokens: 1024,
            summary_timeout_secs: 60,
            tool_result_chars: 500,
        }
    }
}

// ============================================================================
// Tools Configuration
// ============================================================================

/// Tool execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Maximum characters of a remote tool result before truncation.
    pub max_result_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_result_chars: 8_000,
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Single-line `target message {fields}` output
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter level when `RUST_LOG` is unset
    pub level: String,
    /// Optional file to append log lines to
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
        }
    }
}
