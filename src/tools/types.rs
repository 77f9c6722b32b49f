//! Tool types for GamePilot
//!
//! This module defines the core types for tool execution, including the `Tool` trait
//! that all tools must implement, and the `ToolContext` struct that provides
//! execution context to tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::session::ERROR_MARKER;

/// Where a tool does its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// In-process bookkeeping; never touches the network.
    Local,
    /// Dispatches a command to the game server.
    Game,
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Game => write!(f, "game"),
        }
    }
}

/// Result of one tool execution.
///
/// `for_llm` becomes the tool-result message. `notifications` are side-band
/// payloads (game events attached to a response) that never enter the
/// conversation directly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolOutput {
    /// Content sent to the LLM as the tool result. Always required.
    pub for_llm: String,
    /// Whether this result represents an error condition.
    pub is_error: bool,
    /// Out-of-band notifications to surface on the side channel.
    pub notifications: Vec<Value>,
}

impl ToolOutput {
    /// Plain successful result.
    pub fn llm_only(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            ..Default::default()
        }
    }

    /// Error result.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            is_error: true,
            ..Default::default()
        }
    }

    /// Attach notifications to this result.
    pub fn with_notifications(mut self, notifications: Vec<Value>) -> Self {
        self.notifications = notifications;
        self
    }

    /// Text of the tool-result message, with the error marker on failures.
    ///
    /// # Example
    /// ```
    /// use gamepilot::tools::ToolOutput;
    ///
    /// assert_eq!(ToolOutput::error("not docked").render(), "Error: not docked");
    /// assert_eq!(ToolOutput::llm_only("Docked.").render(), "Docked.");
    /// ```
    pub fn render(&self) -> String {
        if self.is_error && !self.for_llm.starts_with(ERROR_MARKER) {
            format!("{}{}", ERROR_MARKER, self.for_llm)
        } else {
            self.for_llm.clone()
        }
    }
}

/// Trait that all tools must implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use gamepilot::tools::{Tool, ToolCategory, ToolContext, ToolOutput};
/// use gamepilot::error::Result;
///
/// struct Clock;
///
/// #[async_trait]
/// impl Tool for Clock {
///     fn name(&self) -> &str { "clock" }
///     fn description(&self) -> &str { "Current local time" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({"type": "object", "properties": {}})
///     }
///     fn category(&self) -> ToolCategory { ToolCategory::Local }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
///         Ok(ToolOutput::llm_only(chrono::Local::now().to_rfc3339()))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the LLM uses to call the tool.
    fn name(&self) -> &str;

    /// Description sent to the LLM.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;

    /// Tool category.
    ///
    /// Defaults to [`ToolCategory::Game`]; only tools that are guaranteed
    /// network-free may report `Local`.
    fn category(&self) -> ToolCategory {
        ToolCategory::Game
    }
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Fires when the running turn is aborted
    pub cancel: CancellationToken,
    /// Id of the agent turn issuing the call
    pub turn_id: Option<String>,
}

impl ToolContext {
    /// Create a new context with a fresh, never-cancelled token.
    ///
    /// # Example
    /// ```
    /// use gamepilot::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new();
    /// assert!(!ctx.cancel.is_cancelled());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cancel` as the abort signal.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Tag calls with the issuing turn.
    pub fn with_turn(mut self, turn_id: &str) -> Self {
        self.turn_id = Some(turn_id.to_string());
        self
    }
}
