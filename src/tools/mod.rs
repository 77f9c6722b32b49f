//! Tools module - Tool definitions and execution for LLM function calling
//!
//! Tools are how the agent acts. Remote tools ([`game::GameTool`]) dispatch a
//! command to the game server through the session client; local tools
//! ([`local`]) keep credentials, notes and status in-process.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolContext`: Execution context (cancellation token, turn id)
//! - `ToolOutput`: Result text, error flag and side-band notifications
//! - `ToolRegistry`: Resolves names to tools and never fails the caller

pub mod game;
pub mod local;
mod registry;
mod types;

use std::sync::Arc;

pub use registry::{ToolNotification, ToolRegistry};
pub use types::{Tool, ToolCategory, ToolContext, ToolOutput};

use crate::config::Config;
use crate::game::SessionClient;

use self::game::GameTool;
use self::local::{NotesStore, ReadNotesTool, SaveCredentialsTool, StatusTool, WriteNotesTool};

/// Registry with the generic game tool, one tool per direct family-B
/// command, and the local bookkeeping tools.
pub fn default_registry(
    client: Arc<SessionClient>,
    notes: Arc<dyn NotesStore>,
    config: &Config,
) -> ToolRegistry {
    let max_chars = config.tools.max_result_chars;
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(GameTool::generic(client.clone(), max_chars)));
    for command in &config.game.direct_commands {
        let description = format!("Run the '{}' game command.", command);
        registry.register(Box::new(GameTool::command(
            client.clone(),
            command,
            &description,
            max_chars,
        )));
    }

    registry.register(Box::new(SaveCredentialsTool::new(client.clone())));
    registry.register(Box::new(ReadNotesTool::new(notes.clone())));
    registry.register(Box::new(WriteNotesTool::new(notes)));
    registry.register(Box::new(StatusTool::new(client)));

    registry
}
