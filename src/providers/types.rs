//! Provider types for GamePilot
//!
//! This module defines the core types and traits for LLM providers,
//! including the `LLMProvider` trait, chat options, and response types.
//!
//! A response is an ordered list of [`ContentBlock`]s (text, tool calls,
//! reasoning) plus a [`StopReason`]. A response that stopped with
//! [`StopReason::Error`], or one with no blocks at all, is never a valid
//! turn. Refusals and context overflows are final and are not retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::session::Message;

/// Definition of a tool that can be called by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Example
    /// ```
    /// use gamepilot::providers::ToolDefinition;
    /// use serde_json::json;
    ///
    /// let tool = ToolDefinition::new(
    ///     "jump",
    ///     "Jump to a neighbouring system",
    ///     json!({
    ///         "type": "object",
    ///         "properties": {
    ///             "system": { "type": "string" }
    ///         },
    ///         "required": ["system"]
    ///     }),
    /// );
    /// assert_eq!(tool.name, "jump");
    /// ```
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Trait for LLM providers.
///
/// The provider translates between GamePilot's message format and the
/// provider's API format.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Send a chat completion request to the LLM.
    ///
    /// # Arguments
    /// * `messages` - The conversation history, system prompt first
    /// * `tools` - Available tools the LLM can call
    /// * `model` - Optional model override (uses default if None)
    /// * `options` - Token limit, temperature and cancellation
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// Options for chat completion requests.
///
/// Use the builder pattern to construct options.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,
    /// Cancels the call when fired
    pub cancel: Option<CancellationToken>,
}

impl ChatOptions {
    /// Create new default chat options.
    ///
    /// # Example
    /// ```
    /// use gamepilot::providers::ChatOptions;
    ///
    /// let options = ChatOptions::new().with_max_tokens(1000).with_temperature(0.2);
    /// assert_eq!(options.max_tokens, Some(1000));
    /// assert!(options.cancel.is_none());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// One block of model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Visible text
    Text { text: String },
    /// A request to run a tool
    ToolCall(LLMToolCall),
    /// Model reasoning ("thinking")
    Reasoning { text: String },
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of turn
    #[default]
    EndTurn,
    /// Stopped to let tools run
    ToolUse,
    /// Hit the output token limit
    MaxTokens,
    /// Hit a stop sequence
    StopSequence,
    /// The provider reported a failed generation
    Error,
    /// The model declined to answer
    Refusal,
    /// The request no longer fits the model's context window
    ContextWindowExceeded,
}

/// Response from an LLM chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Output blocks in emission order
    pub content: Vec<ContentBlock>,
    /// Why generation stopped
    pub stop_reason: StopReason,
    /// Token usage information (if available)
    pub usage: Option<Usage>,
}

impl LLMResponse {
    /// Create a simple text response with no tool calls.
    ///
    /// # Example
    /// ```
    /// use gamepilot::providers::LLMResponse;
    ///
    /// let response = LLMResponse::text("Docked at Sol.");
    /// assert_eq!(response.text_content(), "Docked at Sol.");
    /// assert!(!response.has_tool_calls());
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            content: vec![ContentBlock::Text {
                text: content.to_string(),
            }],
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }

    /// Create a response with tool calls (and optional leading text).
    ///
    /// # Example
    /// ```
    /// use gamepilot::providers::{LLMResponse, LLMToolCall};
    ///
    /// let call = LLMToolCall::new("call_1", "mine", r#"{"target": "belt"}"#);
    /// let response = LLMResponse::with_tools("Mining...", vec![call]);
    /// assert!(response.has_tool_calls());
    /// assert_eq!(response.tool_calls()[0].name, "mine");
    /// ```
    pub fn with_tools(content: &str, tool_calls: Vec<LLMToolCall>) -> Self {
        let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
        if !content.is_empty() {
            blocks.push(ContentBlock::Text {
                text: content.to_string(),
            });
        }
        blocks.extend(tool_calls.into_iter().map(ContentBlock::ToolCall));
        Self {
            content: blocks,
            stop_reason: StopReason::ToolUse,
            usage: None,
        }
    }

    /// Create a response from raw blocks.
    pub fn from_blocks(content: Vec<ContentBlock>, stop_reason: StopReason) -> Self {
        Self {
            content,
            stop_reason,
            usage: None,
        }
    }

    /// Text segments, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All text segments joined with newlines.
    pub fn text_content(&self) -> String {
        self.texts().join("\n")
    }

    /// Tool calls, in emission order.
    pub fn tool_calls(&self) -> Vec<&LLMToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Reasoning blocks joined, if any.
    pub fn reasoning(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Reasoning { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Check if this response contains any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolCall(_)))
    }

    /// Whether the response cannot be accepted as a turn and is worth
    /// asking for again.
    pub fn is_degenerate(&self) -> bool {
        match self.stop_reason {
            StopReason::Error => true,
            StopReason::Refusal | StopReason::ContextWindowExceeded => false,
            _ => self.content.is_empty(),
        }
    }

    /// Set usage information for this response.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A tool call made by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to execute
    pub name: String,
    /// JSON-encoded arguments for the tool
    pub arguments: String,
}

impl LLMToolCall {
    /// Create a new tool call.
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}

/// Token usage information from a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,
    /// Number of tokens in the completion
    pub completion_tokens: u32,
    /// Total tokens used (prompt + completion)
    pub total_tokens: u32,
}

impl Usage {
    /// Create new usage information.
    ///
    /// # Example
    /// ```
    /// use gamepilot::providers::Usage;
    ///
    /// let usage = Usage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}
