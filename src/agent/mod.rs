//! Agent module - the think/act loop that plays the game
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   gate   ┌──────────────────┐
//! │  AgentLoop   │─────────>│ ContextCompactor │
//! │ (run_turn)   │          └──────────────────┘
//! │              │   chat   ┌──────────────────┐
//! │              │─────────>│ LLMProvider      │ (RetryProvider → Claude)
//! │              │          └──────────────────┘
//! │              │  execute ┌──────────────────┐      ┌───────────────┐
//! │              │─────────>│ ToolRegistry     │─────>│ SessionClient │
//! └──────────────┘          └──────────────────┘      └───────────────┘
//! ```
//!
//! A [`Conversation`] holds the history of one game session and a
//! [`CompactionState`] carries the running summary between turns.

pub mod compaction;
mod context;
mod r#loop;

pub use compaction::{CompactionState, ContextCompactor};
pub use context::Conversation;
pub use r#loop::{AgentEvent, AgentLoop, PlayReport, TurnOutcome, CONTINUE_NUDGE};
