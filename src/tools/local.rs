//! Local bookkeeping tools.
//!
//! These tools never touch the network: credentials are handed to the
//! [`SessionClient`] for its next bootstrap, notes live in a [`NotesStore`],
//! and `status` reads the client's in-memory session slots.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{PilotError, Result};
use crate::game::{Credentials, SessionClient};

use super::{Tool, ToolCategory, ToolContext, ToolOutput};

/// Storage for the agent's free-form notes (its TODO list).
#[async_trait]
pub trait NotesStore: Send + Sync {
    /// Current notes; empty when nothing was written.
    async fn read(&self) -> Result<String>;

    /// Replace the notes.
    async fn write(&self, content: &str) -> Result<()>;
}

/// In-process notes store.
#[derive(Debug, Default)]
pub struct MemoryNotesStore {
    content: RwLock<String>,
}

impl MemoryNotesStore {
    pub fn new(initial: &str) -> Self {
        Self {
            content: RwLock::new(initial.to_string()),
        }
    }
}

#[async_trait]
impl NotesStore for MemoryNotesStore {
    async fn read(&self) -> Result<String> {
        Ok(self.content.read().await.clone())
    }

    async fn write(&self, content: &str) -> Result<()> {
        *self.content.write().await = content.to_string();
        Ok(())
    }
}

// ============================================================================
// save_credentials
// ============================================================================

#[derive(Deserialize)]
struct CredentialsArgs {
    username: String,
    password: String,
}

/// Stores login credentials for subsequent session bootstraps.
pub struct SaveCredentialsTool {
    client: Arc<SessionClient>,
}

impl SaveCredentialsTool {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for SaveCredentialsTool {
    fn name(&self) -> &str {
        "save_credentials"
    }

    fn description(&self) -> &str {
        "Save the game username and password. Sessions are renewed with the new login on the next command."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "username": { "type": "string", "description": "Game username" },
                "password": { "type": "string", "description": "Game password" }
            },
            "required": ["username", "password"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let args: CredentialsArgs = serde_json::from_value(args)
            .map_err(|e| PilotError::Tool(format!("Invalid credentials: {}", e)))?;
        if args.username.trim().is_empty() || args.password.is_empty() {
            return Ok(ToolOutput::error("Username and password must not be empty"));
        }

        self.client
            .set_credentials(Credentials::new(args.username.trim(), &args.password))
            .await;
        // Existing sessions belong to the previous login.
        self.client.invalidate_all().await;

        info!(username = %args.username.trim(), "Game credentials saved");
        Ok(ToolOutput::llm_only(format!(
            "Credentials saved for {}.",
            args.username.trim()
        )))
    }
}

// ============================================================================
// read_notes / write_notes
// ============================================================================

/// Returns the agent's notes.
pub struct ReadNotesTool {
    store: Arc<dyn NotesStore>,
}

impl ReadNotesTool {
    pub fn new(store: Arc<dyn NotesStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReadNotesTool {
    fn name(&self) -> &str {
        "read_notes"
    }

    fn description(&self) -> &str {
        "Read your notes and TODO list."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let notes = self.store.read().await?;
        if notes.trim().is_empty() {
            Ok(ToolOutput::llm_only("(no notes)"))
        } else {
            Ok(ToolOutput::llm_only(notes))
        }
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum WriteMode {
    #[default]
    Replace,
    Append,
}

#[derive(Deserialize)]
struct WriteNotesArgs {
    content: String,
    #[serde(default)]
    mode: WriteMode,
}

/// Replaces or extends the agent's notes.
pub struct WriteNotesTool {
    store: Arc<dyn NotesStore>,
}

impl WriteNotesTool {
    pub fn new(store: Arc<dyn NotesStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for WriteNotesTool {
    fn name(&self) -> &str {
        "write_notes"
    }

    fn description(&self) -> &str {
        "Write your notes and TODO list. mode 'replace' (default) overwrites, 'append' adds a line."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Notes text" },
                "mode": { "type": "string", "enum": ["replace", "append"] }
            },
            "required": ["content"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let args: WriteNotesArgs = serde_json::from_value(args)
            .map_err(|e| PilotError::Tool(format!("Invalid notes arguments: {}", e)))?;

        let content = match args.mode {
            WriteMode::Replace => args.content,
            WriteMode::Append => {
                let current = self.store.read().await?;
                if current.is_empty() {
                    args.content
                } else {
                    format!("{}\n{}", current.trim_end(), args.content)
                }
            }
        };
        self.store.write(&content).await?;

        Ok(ToolOutput::llm_only(format!(
            "Notes saved ({} chars).",
            content.chars().count()
        )))
    }
}

// ============================================================================
// status
// ============================================================================

/// Reports session slots and the rate-limit streak without a network call.
pub struct StatusTool {
    client: Arc<SessionClient>,
}

impl StatusTool {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for StatusTool {
    fn name(&self) -> &str {
        "status"
    }

    fn description(&self) -> &str {
        "Show the connection status: sessions per endpoint family, login state and rate limiting."
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Local
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let status = json!({
            "sessions": self.client.session_status().await,
            "logged_in": self.client.has_credentials().await,
            "rate_limit_streak": self.client.rate_limit_streak(),
        });
        Ok(ToolOutput::llm_only(serde_json::to_string_pretty(&status)?))
    }
}
