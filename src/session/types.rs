//! Conversation message types for GamePilot
//!
//! This module defines the messages exchanged with the language model:
//! roles, assistant tool calls and the tool results paired with them.

use serde::{Deserialize, Serialize};

/// Leading marker of a tool result that reports a failure.
pub const ERROR_MARKER: &str = "Error: ";

/// One entry of the model-facing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Calls requested by an assistant turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call this result answers; set only on `Role::Tool`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Model reasoning that accompanied an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Message {
    fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            reasoning: None,
        }
    }

    /// User-authored text, including instructions and nudges.
    ///
    /// # Example
    /// ```
    /// use gamepilot::session::{Message, Role};
    ///
    /// let msg = Message::user("Check the market.");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: &str) -> Self {
        Self::new(Role::System, content)
    }

    /// Result of one tool call, paired by id.
    ///
    /// # Example
    /// ```
    /// use gamepilot::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "Docked.");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::new(Role::Tool, content)
        }
    }

    /// Assistant turn that requests tool calls.
    ///
    /// # Example
    /// ```
    /// use gamepilot::session::{Message, ToolCall};
    ///
    /// let call = ToolCall::new("call_1", "mine", r#"{"target": "belt"}"#);
    /// let msg = Message::assistant_with_tools("Mining.", vec![call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Attach model reasoning to this message.
    pub fn with_reasoning(mut self, reasoning: Option<String>) -> Self {
        self.reasoning = reasoning.filter(|r| !r.is_empty());
        self
    }

    /// True when at least one call is attached.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }

    /// Tool result whose content starts with [`ERROR_MARKER`].
    pub fn is_error_result(&self) -> bool {
        self.is_tool_result() && self.content.starts_with(ERROR_MARKER)
    }
}

/// Who produced a [`Message`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// A model request to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, echoed by the result message
    pub id: String,
    pub name: String,
    /// Raw JSON text as emitted by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Decode the raw arguments into `T`.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}
