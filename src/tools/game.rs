//! Remote game command tools.
//!
//! A [`GameTool`] forwards its call to [`SessionClient::execute`], which owns
//! session renewal and rate-limit handling. The tool only shapes the result
//! for the model: payload text, an `"Error: code: message"` line on failure,
//! and a truncation marker for oversized payloads.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{PilotError, Result};
use crate::game::{ApiError, GameResponse, SessionClient};
use crate::utils::string::truncate_with_marker;

use super::{Tool, ToolCategory, ToolContext, ToolOutput};

/// Name of the catch-all tool taking `{command, payload}`.
pub const GENERIC_TOOL_NAME: &str = "game";

enum Shape {
    /// Tool name is the command; arguments are the payload.
    Fixed { command: String, description: String },
    /// `{command, payload}` arguments.
    Generic,
}

/// Tool dispatching to the game server.
pub struct GameTool {
    client: Arc<SessionClient>,
    shape: Shape,
    max_result_chars: usize,
}

impl GameTool {
    /// Tool bound to one command.
    pub fn command(
        client: Arc<SessionClient>,
        command: &str,
        description: &str,
        max_result_chars: usize,
    ) -> Self {
        Self {
            client,
            shape: Shape::Fixed {
                command: command.to_string(),
                description: description.to_string(),
            },
            max_result_chars,
        }
    }

    /// Tool accepting any command name.
    pub fn generic(client: Arc<SessionClient>, max_result_chars: usize) -> Self {
        Self {
            client,
            shape: Shape::Generic,
            max_result_chars,
        }
    }

    fn resolve(&self, args: Value) -> Result<(String, Option<Value>)> {
        match &self.shape {
            Shape::Fixed { command, .. } => {
                let payload = match args {
                    Value::Null => None,
                    Value::Object(map) if map.is_empty() => None,
                    Value::Object(map) => Some(Value::Object(map)),
                    other => {
                        return Err(PilotError::Tool(format!(
                            "Arguments for '{}' must be an object, got {}",
                            command, other
                        )))
                    }
                };
                Ok((command.clone(), payload))
            }
            Shape::Generic => {
                let command = args
                    .get("command")
                    .and_then(Value::as_str)
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| PilotError::Tool("Missing 'command' argument".into()))?
                    .to_string();
                let payload = match args.get("payload") {
                    None | Some(Value::Null) => None,
                    Some(p @ Value::Object(_)) => Some(p.clone()),
                    Some(other) => {
                        return Err(PilotError::Tool(format!(
                            "'payload' must be an object, got {}",
                            other
                        )))
                    }
                };
                Ok((command, payload))
            }
        }
    }

    /// Shape a game response into a tool result.
    pub fn render(&self, response: GameResponse) -> ToolOutput {
        let output = match &response.error {
            Some(error) => ToolOutput::error(describe_error(error)),
            None => {
                let text = match &response.result {
                    None | Some(Value::Null) => "OK".to_string(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                ToolOutput::llm_only(truncate_with_marker(&text, self.max_result_chars))
            }
        };
        output.with_notifications(response.notifications)
    }
}

fn describe_error(error: &ApiError) -> String {
    match error.wait_seconds {
        Some(wait) => format!("{} (retry after {}s)", error, wait),
        None => error.to_string(),
    }
}

#[async_trait]
impl Tool for GameTool {
    fn name(&self) -> &str {
        match &self.shape {
            Shape::Fixed { command, .. } => command,
            Shape::Generic => GENERIC_TOOL_NAME,
        }
    }

    fn description(&self) -> &str {
        match &self.shape {
            Shape::Fixed { description, .. } => description,
            Shape::Generic => {
                "Send a command to the game server. \
                 'command' is the command name; 'payload' holds its arguments. \
                 Routed commands (storage, market, faction) take an 'action' in the payload."
            }
        }
    }

    fn parameters(&self) -> Value {
        match &self.shape {
            Shape::Fixed { .. } => json!({
                "type": "object",
                "additionalProperties": true,
                "description": "Command arguments"
            }),
            Shape::Generic => json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "Game command name"
                    },
                    "payload": {
                        "type": "object",
                        "description": "Command arguments"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Game
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let (command, payload) = self.resolve(args)?;
        debug!(command = %command, turn_id = ?ctx.turn_id, "Dispatching game command");

        let response = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(PilotError::Cancelled),
            response = self.client.execute(&command, payload) => response,
        };

        Ok(self.render(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> Arc<SessionClient> {
        let config = GameConfig {
            base_url: server.uri(),
            bootstrap_base_delay_ms: 1,
            ..Default::default()
        };
        Mock::given(method("POST"))
            .and(path("/api/v1/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": {"id": "s-a", "expires_at": "2099-01-01T00:00:00Z"}
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session": {"sessionId": "s-b", "expiresAt": "2099-01-01T00:00:00Z"}
            })))
            .mount(server)
            .await;
        Arc::new(SessionClient::from_config(&config).unwrap())
    }

    #[tokio::test]
    async fn test_fixed_tool_sends_args_as_payload() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/mine"))
            .and(header("X-Session-Id", "s-a"))
            .and(body_json(json!({"target": "asteroid-7"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "Mined 12 ore",
                "notifications": [{"type": "chat", "text": "hi"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = GameTool::command(client, "mine", "Mine a target", 8_000);
        assert_eq!(tool.name(), "mine");
        let out = tool
            .execute(json!({"target": "asteroid-7"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out.for_llm, "Mined 12 ore");
        assert!(!out.is_error);
        assert_eq!(out.notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_generic_tool_routes_structured_result() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/get_ship"))
            .and(header("X-Session-Id", "s-b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "Your ship",
                "structuredContent": {"hull": 90}
            })))
            .mount(&server)
            .await;

        let tool = GameTool::generic(client, 8_000);
        let out = tool
            .execute(json!({"command": "v2_get_ship"}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out.for_llm, r#"{"hull":90}"#);
    }

    #[tokio::test]
    async fn test_generic_tool_requires_command() {
        let server = MockServer::start().await;
        let tool = GameTool::generic(client_for(&server).await, 100);
        let err = tool
            .execute(json!({"payload": {}}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing 'command'"));
    }

    #[tokio::test]
    async fn test_api_error_renders_code_and_message() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/dock"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"code": "not_in_range", "message": "No station nearby"}
            })))
            .mount(&server)
            .await;

        let tool = GameTool::command(client, "dock", "Dock", 8_000);
        let out = tool.execute(json!({}), &ToolContext::new()).await.unwrap();
        assert!(out.is_error);
        assert_eq!(out.render(), "Error: not_in_range: No station nearby");
    }

    #[tokio::test]
    async fn test_large_result_is_truncated() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/scan"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": "x".repeat(50)})),
            )
            .mount(&server)
            .await;

        let tool = GameTool::command(client, "scan", "Scan", 20);
        let out = tool.execute(json!({}), &ToolContext::new()).await.unwrap();
        assert_eq!(out.for_llm, format!("{}...[truncated 30 chars]", "x".repeat(20)));
    }

    #[tokio::test]
    async fn test_empty_result_renders_ok() {
        let server = MockServer::start().await;
        let tool = GameTool::generic(client_for(&server).await, 100);
        assert_eq!(tool.render(GameResponse::default()).for_llm, "OK");
    }

    #[tokio::test]
    async fn test_rate_limit_error_mentions_wait() {
        let server = MockServer::start().await;
        let tool = GameTool::generic(client_for(&server).await, 100);
        let mut error = ApiError::new("rate_limited", "Slow down");
        error.wait_seconds = Some(2.5);
        let out = tool.render(GameResponse::from_error(error));
        assert_eq!(out.for_llm, "rate_limited: Slow down (retry after 2.5s)");
    }

    #[tokio::test]
    async fn test_cancelled_context_aborts_dispatch() {
        let server = MockServer::start().await;
        let tool = GameTool::generic(client_for(&server).await, 100);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tool
            .execute(
                json!({"command": "travel"}),
                &ToolContext::new().with_cancel(cancel),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::Cancelled));
    }

    #[tokio::test]
    async fn test_non_object_args_rejected() {
        let server = MockServer::start().await;
        let tool = GameTool::command(client_for(&server).await, "mine", "Mine", 100);
        assert!(tool.resolve(json!("asteroid")).is_err());
        assert_eq!(tool.resolve(json!({})).unwrap(), ("mine".to_string(), None));
    }
}
