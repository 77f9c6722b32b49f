//! Conversation state for one game session.
//!
//! A [`Conversation`] is the system prompt plus the ordered message list the
//! model sees. Index 0 is the initial instruction; it is set on creation and
//! survives every compaction.

use serde::{Deserialize, Serialize};

use crate::session::{Message, Role};

/// System prompt, instruction and running message history.
///
/// # Example
///
/// ```rust
/// use gamepilot::agent::Conversation;
/// use gamepilot::session::Message;
///
/// let mut conversation = Conversation::new("You play the game.", "Mine some ore.");
/// conversation.push(Message::assistant("On it."));
///
/// assert_eq!(conversation.instruction().content, "Mine some ore.");
/// assert_eq!(conversation.len(), 2);
/// assert_eq!(conversation.to_request().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation whose index 0 is `instruction`.
    pub fn new(system_prompt: &str, instruction: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            messages: vec![Message::user(instruction)],
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The initial instruction at index 0.
    pub fn instruction(&self) -> &Message {
        &self.messages[0]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages, instruction included.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the instruction is never removed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace everything after the instruction.
    pub(crate) fn replace_tail(&mut self, tail: Vec<Message>) {
        self.messages.truncate(1);
        self.messages.extend(tail);
    }

    /// Messages for a model call: the system prompt, then the history.
    pub fn to_request(&self) -> Vec<Message> {
        let mut request = Vec::with_capacity(self.messages.len() + 1);
        if !self.system_prompt.is_empty() {
            request.push(Message::system(&self.system_prompt));
        }
        request.extend(self.messages.iter().cloned());
        request
    }

    /// Text of the most recent assistant message, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.content.is_empty())
            .map(|m| m.content.as_str())
    }
}
