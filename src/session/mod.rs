//! Conversation messages.
//!
//! The message model shared by the agent loop, the compactor and the
//! provider layer. (Game-server sessions live in [`crate::game`].)

pub mod types;

pub use types::{Message, Role, ToolCall, ERROR_MARKER};
