//! Tool registry for GamePilot
//!
//! [`ToolRegistry`] resolves a tool name to a registered [`Tool`] and runs it.
//! Execution never fails from the caller's point of view: unknown tools and
//! tool errors come back as `"Error: ..."` results. Notifications attached to
//! a result are forwarded to an optional `mpsc` side channel.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::providers::ToolDefinition;

use super::{Tool, ToolCategory, ToolContext, ToolOutput};

/// A notification surfaced by a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolNotification {
    /// Tool that produced the notification
    pub tool: String,
    /// Raw notification payload
    pub payload: Value,
}

/// A registry that holds and executes tools.
///
/// # Example
///
/// ```rust
/// use gamepilot::tools::{local::{MemoryNotesStore, ReadNotesTool}, ToolContext, ToolRegistry};
/// use std::sync::Arc;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(ReadNotesTool::new(Arc::new(MemoryNotesStore::default()))));
///
/// let output = registry.execute("read_notes", json!({}), &ToolContext::new()).await;
/// assert!(!output.is_error);
///
/// let missing = registry.execute("warp", json!({}), &ToolContext::new()).await;
/// assert_eq!(missing.render(), "Error: Tool not found: warp");
/// # });
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    notifications: Option<mpsc::UnboundedSender<ToolNotification>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            notifications: None,
        }
    }

    /// Forward tool notifications to `sender`.
    pub fn with_notifications(mut self, sender: mpsc::UnboundedSender<ToolNotification>) -> Self {
        self.notifications = Some(sender);
        self
    }

    /// Register a new tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        debug!(tool = %name, category = %tool.category(), "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Execute a tool by name.
    ///
    /// Tool-not-found and tool failures return an error [`ToolOutput`].
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolOutput {
        let tool = match self.tools.get(name) {
            Some(t) => t,
            None => {
                error!(tool = name, "Tool not found");
                return ToolOutput::error(format!("Tool not found: {}", name));
            }
        };

        let start = Instant::now();

        let mut output = match tool.execute(args, ctx).await {
            Ok(output) => {
                info!(
                    tool = name,
                    category = %tool.category(),
                    is_error = output.is_error,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed"
                );
                output
            }
            Err(e) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                ToolOutput::error(e.to_string())
            }
        };

        self.forward_notifications(name, std::mem::take(&mut output.notifications));
        output
    }

    fn forward_notifications(&self, tool: &str, payloads: Vec<Value>) {
        if payloads.is_empty() {
            return;
        }
        match &self.notifications {
            Some(tx) => {
                for payload in payloads {
                    let note = ToolNotification {
                        tool: tool.to_string(),
                        payload,
                    };
                    if tx.send(note).is_err() {
                        debug!(tool, "Notification receiver dropped");
                        break;
                    }
                }
            }
            None => debug!(tool, count = payloads.len(), "Dropping notifications (no channel)"),
        }
    }

    /// Tool definitions for the LLM, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Names of registered tools in `category`, sorted.
    pub fn names_in(&self, category: ToolCategory) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .values()
            .filter(|t| t.category() == category)
            .map(|t| t.name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Get the names of all registered tools.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PilotError, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct Beacon;

    #[async_trait]
    impl Tool for Beacon {
        fn name(&self) -> &str {
            "beacon"
        }
        fn description(&self) -> &str {
            "Emits a notification"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
            if args.get("fail").is_some() {
                return Err(PilotError::Tool("beacon jammed".into()));
            }
            Ok(ToolOutput::llm_only("pinged").with_notifications(vec![json!({"ping": 1})]))
        }
    }

    struct Ledger;

    #[async_trait]
    impl Tool for Ledger {
        fn name(&self) -> &str {
            "ledger"
        }
        fn description(&self) -> &str {
            "Local ledger"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        fn category(&self) -> ToolCategory {
            ToolCategory::Local
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
            Ok(ToolOutput::llm_only("balanced"))
        }
    }

    #[test]
    fn test_registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(Box::new(Beacon));
        registry.register(Box::new(Ledger));

        assert!(registry.has("beacon"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("ledger").unwrap().category(), ToolCategory::Local);
        assert_eq!(registry.names_in(ToolCategory::Local), vec!["ledger"]);
        assert_eq!(registry.names_in(ToolCategory::Game), vec!["beacon"]);
    }

    #[test]
    fn test_definitions_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Ledger));
        registry.register(Box::new(Beacon));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["beacon", "ledger"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let registry = ToolRegistry::new();
        let out = registry.execute("warp", json!({}), &ToolContext::new()).await;
        assert!(out.is_error);
        assert_eq!(out.render(), "Error: Tool not found: warp");
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Beacon));
        let out = registry
            .execute("beacon", json!({"fail": true}), &ToolContext::new())
            .await;
        assert_eq!(out.render(), "Error: Tool error: beacon jammed");
    }

    #[tokio::test]
    async fn test_notifications_go_to_side_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = ToolRegistry::new().with_notifications(tx);
        registry.register(Box::new(Beacon));

        let out = registry.execute("beacon", json!({}), &ToolContext::new()).await;
        assert_eq!(out.render(), "pinged");
        assert!(out.notifications.is_empty());

        let note = rx.recv().await.unwrap();
        assert_eq!(note.tool, "beacon");
        assert_eq!(note.payload, json!({"ping": 1}));
    }

    #[tokio::test]
    async fn test_notifications_without_channel_are_dropped() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Beacon));
        let out = registry.execute("beacon", json!({}), &ToolContext::new()).await;
        assert_eq!(out.for_llm, "pinged");
    }
}
