//! GamePilot - language-model agent that plays a session-based online game
//!
//! The crate has two halves:
//!
//! - [`game`]: the resilient request layer. [`game::SessionClient`] keeps one
//!   session per endpoint family, routes commands, and recovers from session
//!   loss, rate limiting and transport failure.
//! - [`agent`]: the turn loop. [`agent::AgentLoop`] alternates model calls and
//!   tool execution while [`agent::ContextCompactor`] keeps the conversation
//!   inside its token budget.
//!
//! [`tools`] connects the two; [`providers`] talks to the language model.

pub mod agent;
pub mod config;
pub mod error;
pub mod game;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{AgentLoop, CompactionState, ContextCompactor, Conversation, TurnOutcome};
pub use config::Config;
pub use error::{PilotError, ProviderError, Result};
pub use game::{GameResponse, SessionClient};
pub use providers::{ChatOptions, ClaudeProvider, LLMProvider, LLMResponse, RetryProvider};
pub use session::{Message, Role, ToolCall};
pub use tools::{Tool, ToolContext, ToolOutput, ToolRegistry};
