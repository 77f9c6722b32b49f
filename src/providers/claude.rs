//! Claude (Anthropic) LLM provider implementation
//!
//! This module implements the `LLMProvider` trait for Anthropic's Messages API,
//! handling message conversion, tool calls, thinking blocks and response parsing.
//!
//! # Example
//!
//! ```rust,ignore
//! use gamepilot::providers::{claude::ClaudeProvider, ChatOptions, LLMProvider};
//! use gamepilot::session::Message;
//!
//! async fn example() {
//!     let provider = ClaudeProvider::new("your-api-key");
//!     let messages = vec![
//!         Message::system("You play a space trading game."),
//!         Message::user("What should we do next?"),
//!     ];
//!     let response = provider
//!         .chat(messages, vec![], None, ChatOptions::default())
//!         .await
//!         .unwrap();
//!     println!("Claude: {}", response.text_content());
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PilotError, ProviderError, Result};
use crate::session::{Message, Role, ERROR_MARKER};

use super::{
    parse_provider_error, ChatOptions, ContentBlock, LLMProvider, LLMResponse, LLMToolCall,
    StopReason, ToolDefinition, Usage,
};

/// The default Anthropic API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// The default Claude model to use.
/// Can be overridden at compile time with `GAMEPILOT_CLAUDE_DEFAULT_MODEL` env var.
const DEFAULT_MODEL: &str = match option_env!("GAMEPILOT_CLAUDE_DEFAULT_MODEL") {
    Some(v) => v,
    None => "claude-sonnet-4-5-20250929",
};

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude/Anthropic LLM provider.
pub struct ClaudeProvider {
    /// API key for authentication
    api_key: String,
    /// Base URL, without the `/v1/messages` suffix
    api_base: String,
    /// HTTP client for making requests
    client: Client,
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    ///
    /// # Example
    /// ```
    /// use gamepilot::providers::claude::ClaudeProvider;
    /// use gamepilot::providers::LLMProvider;
    ///
    /// let provider = ClaudeProvider::new("sk-ant-api03-xxx");
    /// assert_eq!(provider.name(), "claude");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, Client::new())
    }

    /// Create a new Claude provider with a custom HTTP client.
    pub fn with_client(api_key: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            client,
        }
    }

    /// Point the provider at a different API base URL.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }
}

#[async_trait]
impl LLMProvider for ClaudeProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(DEFAULT_MODEL);
        let (system, claude_messages) = convert_messages(messages);

        let request = ClaudeRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(4096),
            messages: claude_messages,
            system,
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            temperature: options.temperature,
        };

        debug!(model, messages = request.messages.len(), "Sending Claude request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();

            let parsed = serde_json::from_str::<ClaudeErrorResponse>(&error_text).ok();
            if let Some(err) = &parsed {
                if err.error.r#type == "overloaded_error" {
                    return Err(PilotError::from(ProviderError::Overloaded(
                        err.error.message.clone(),
                    )));
                }
            }
            let body = match parsed {
                Some(err) => format!("Claude API error: {} - {}", err.error.r#type, err.error.message),
                None => format!("Claude API error: {}", error_text),
            };

            return Err(PilotError::from(parse_provider_error(status, &body)));
        }

        let claude_response: ClaudeResponse = response.json().await?;
        Ok(convert_response(claude_response))
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "claude"
    }
}

// ============================================================================
// Claude API Request Types
// ============================================================================

/// Claude API request body.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    /// System prompt (separate from messages in Claude API)
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A message in Claude's format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaudeMessage {
    /// Role: "user" or "assistant"
    role: String,
    content: ClaudeContent,
}

/// Claude message content - can be simple text or content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

/// A content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// Assistant requesting to call a tool
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Result of a tool execution, sent as user content
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Extended thinking output
    #[serde(rename = "thinking")]
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

/// Claude tool definition.
#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Claude API Response Types
// ============================================================================

/// Claude API response body.
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContentBlock>,
    usage: Option<ClaudeUsage>,
    /// e.g. "end_turn", "tool_use", "max_tokens"
    stop_reason: Option<String>,
}

/// Claude API error response.
#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    r#type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert GamePilot messages to Claude API format.
///
/// Returns the system prompt (if present) and the remaining messages.
/// Consecutive tool results are grouped into a single user message.
fn convert_messages(messages: Vec<Message>) -> (Option<String>, Vec<ClaudeMessage>) {
    let mut system: Option<String> = None;
    let mut claude_messages: Vec<ClaudeMessage> = Vec::new();
    let mut pending_tool_results: Vec<ClaudeContentBlock> = Vec::new();

    fn flush(pending: &mut Vec<ClaudeContentBlock>, out: &mut Vec<ClaudeMessage>) {
        if !pending.is_empty() {
            out.push(ClaudeMessage {
                role: "user".to_string(),
                content: ClaudeContent::Blocks(std::mem::take(pending)),
            });
        }
    }

    for msg in messages {
        match msg.role {
            Role::System => {
                system = Some(msg.content);
            }
            Role::User => {
                flush(&mut pending_tool_results, &mut claude_messages);
                claude_messages.push(ClaudeMessage {
                    role: "user".to_string(),
                    content: ClaudeContent::Text(msg.content),
                });
            }
            Role::Assistant => {
                flush(&mut pending_tool_results, &mut claude_messages);

                match msg.tool_calls {
                    Some(tool_calls) if !tool_calls.is_empty() => {
                        let mut blocks: Vec<ClaudeContentBlock> = Vec::new();
                        if !msg.content.is_empty() {
                            blocks.push(ClaudeContentBlock::Text { text: msg.content });
                        }
                        for tc in tool_calls {
                            let input: serde_json::Value = serde_json::from_str(&tc.arguments)
                                .unwrap_or(serde_json::json!({}));
                            blocks.push(ClaudeContentBlock::ToolUse {
                                id: tc.id,
                                name: tc.name,
                                input,
                            });
                        }
                        claude_messages.push(ClaudeMessage {
                            role: "assistant".to_string(),
                            content: ClaudeContent::Blocks(blocks),
                        });
                    }
                    _ => {
                        claude_messages.push(ClaudeMessage {
                            role: "assistant".to_string(),
                            content: ClaudeContent::Text(msg.content),
                        });
                    }
                }
            }
            Role::Tool => {
                if let Some(tool_call_id) = msg.tool_call_id {
                    let is_error = msg.content.starts_with(ERROR_MARKER);
                    pending_tool_results.push(ClaudeContentBlock::ToolResult {
                        tool_use_id: tool_call_id,
                        content: msg.content,
                        is_error: is_error.then_some(true),
                    });
                }
            }
        }
    }

    flush(&mut pending_tool_results, &mut claude_messages);
    (system, claude_messages)
}

/// Convert GamePilot tool definitions to Claude API format.
fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<ClaudeTool> {
    tools
        .into_iter()
        .map(|t| ClaudeTool {
            name: t.name,
            description: t.description,
            input_schema: t.parameters,
        })
        .collect()
}

fn convert_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some("end_turn") | Some("pause_turn") | None => StopReason::EndTurn,
        Some("refusal") => StopReason::Refusal,
        Some("model_context_window_exceeded") => StopReason::ContextWindowExceeded,
        Some("error") => StopReason::Error,
        Some(other) => {
            debug!(stop_reason = other, "Unrecognized stop reason; treating as end of turn");
            StopReason::EndTurn
        }
    }
}

/// Convert Claude API response to a block list, preserving order.
fn convert_response(response: ClaudeResponse) -> LLMResponse {
    let content = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ClaudeContentBlock::Text { text } => Some(ContentBlock::Text { text }),
            ClaudeContentBlock::ToolUse { id, name, input } => {
                let arguments = serde_json::to_string(&input).unwrap_or_else(|_| "{}".to_string());
                Some(ContentBlock::ToolCall(LLMToolCall::new(&id, &name, &arguments)))
            }
            ClaudeContentBlock::Thinking { thinking, .. } => {
                Some(ContentBlock::Reasoning { text: thinking })
            }
            ClaudeContentBlock::ToolResult { .. } | ClaudeContentBlock::Unsupported => None,
        })
        .collect();

    let mut llm_response =
        LLMResponse::from_blocks(content, convert_stop_reason(response.stop_reason.as_deref()));
    if let Some(usage) = response.usage {
        llm_response = llm_response.with_usage(Usage::new(usage.input_tokens, usage.output_tokens));
    }
    llm_response
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ToolCall;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_claude_provider_creation() {
        let provider = ClaudeProvider::new("test-key");
        assert_eq!(provider.name(), "claude");
        assert_eq!(provider.default_model(), "claude-sonnet-4-5-20250929");
        assert_eq!(provider.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_message_conversion_with_system() {
        let messages = vec![
            Message::system("You play the game"),
            Message::user("Hello"),
            Message::assistant("Hi there!"),
        ];

        let (system, claude_messages) = convert_messages(messages);

        assert_eq!(system, Some("You play the game".to_string()));
        assert_eq!(claude_messages.len(), 2);
        assert_eq!(claude_messages[0].role, "user");
        assert_eq!(claude_messages[1].role, "assistant");
    }

    #[test]
    fn test_tool_results_grouped_into_one_user_message() {
        let messages = vec![
            Message::user("Go"),
            Message::assistant_with_tools(
                "",
                vec![
                    ToolCall::new("c1", "dock", "{}"),
                    ToolCall::new("c2", "sell", r#"{"item": "ore"}"#),
                ],
            ),
            Message::tool_result("c1", "Docked."),
            Message::tool_result("c2", "Error: market closed"),
        ];

        let (_, claude_messages) = convert_messages(messages);
        assert_eq!(claude_messages.len(), 3);

        match &claude_messages[1].content {
            ClaudeContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert!(matches!(&blocks[1], ClaudeContentBlock::ToolUse { name, .. } if name == "sell"));
            }
            other => panic!("expected blocks, got {:?}", other),
        }

        match &claude_messages[2].content {
            ClaudeContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert!(matches!(
                    &blocks[0],
                    ClaudeContentBlock::ToolResult { is_error: None, .. }
                ));
                assert!(matches!(
                    &blocks[1],
                    ClaudeContentBlock::ToolResult {
                        is_error: Some(true),
                        ..
                    }
                ));
            }
            other => panic!("expected blocks, got {:?}", other),
        }
    }

    #[test]
    fn test_response_conversion_preserves_block_order() {
        let raw = json!({
            "content": [
                {"type": "thinking", "thinking": "cargo is full", "signature": "sig"},
                {"type": "text", "text": "Selling first."},
                {"type": "tool_use", "id": "t1", "name": "sell", "input": {"item": "ore"}},
                {"type": "server_tool_use", "id": "x"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "stop_reason": "tool_use"
        });
        let response: ClaudeResponse = serde_json::from_value(raw).unwrap();
        let converted = convert_response(response);

        assert_eq!(converted.content.len(), 3);
        assert_eq!(converted.reasoning().as_deref(), Some("cargo is full"));
        assert_eq!(converted.text_content(), "Selling first.");
        assert_eq!(converted.tool_calls()[0].arguments, r#"{"item":"ore"}"#);
        assert_eq!(converted.stop_reason, StopReason::ToolUse);
        assert_eq!(converted.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_empty_content_is_degenerate() {
        let response: ClaudeResponse =
            serde_json::from_value(json!({"content": [], "stop_reason": "end_turn"})).unwrap();
        assert!(convert_response(response).is_degenerate());
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(convert_stop_reason(Some("end_turn")), StopReason::EndTurn);
        assert_eq!(convert_stop_reason(Some("max_tokens")), StopReason::MaxTokens);
        assert_eq!(convert_stop_reason(Some("error")), StopReason::Error);
        assert_eq!(convert_stop_reason(None), StopReason::EndTurn);
    }

    #[test]
    fn test_final_stop_reasons_are_not_retried() {
        assert_eq!(convert_stop_reason(Some("refusal")), StopReason::Refusal);
        assert_eq!(
            convert_stop_reason(Some("model_context_window_exceeded")),
            StopReason::ContextWindowExceeded
        );
        assert_eq!(convert_stop_reason(Some("brand_new_reason")), StopReason::EndTurn);

        let response: ClaudeResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "I can't help with that."}],
            "stop_reason": "refusal"
        }))
        .unwrap();
        assert!(!convert_response(response).is_degenerate());
    }

    #[tokio::test]
    async fn test_chat_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "k"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Ready."}],
                "usage": {"input_tokens": 3, "output_tokens": 1},
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = ClaudeProvider::new("k").with_api_base(&server.uri());
        let response = provider
            .chat(vec![Message::user("hi")], vec![], None, ChatOptions::new())
            .await
            .unwrap();
        assert_eq!(response.text_content(), "Ready.");
    }

    #[tokio::test]
    async fn test_chat_maps_overloaded_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let provider = ClaudeProvider::new("k").with_api_base(&server.uri());
        let err = provider
            .chat(vec![Message::user("hi")], vec![], None, ChatOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PilotError::ProviderTyped(ProviderError::Overloaded(_))
        ));
    }

    #[tokio::test]
    async fn test_chat_maps_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "type": "error",
                "error": {"type": "authentication_error", "message": "invalid x-api-key"}
            })))
            .mount(&server)
            .await;

        let provider = ClaudeProvider::new("bad").with_api_base(&server.uri());
        let err = provider
            .chat(vec![Message::user("hi")], vec![], None, ChatOptions::new())
            .await
            .unwrap_err();
        match err {
            PilotError::ProviderTyped(ProviderError::Auth(msg)) => {
                assert!(msg.contains("authentication_error"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
