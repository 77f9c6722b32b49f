//! Context compaction for long game sessions.
//!
//! Before each model call the [`ContextCompactor`] estimates the size of the
//! conversation. Once it crosses `threshold × context_window` the older part
//! of the history is replaced with a model-written summary:
//!
//! ```text
//! [instruction, m1, m2, ..., mk, recent...]
//!        becomes
//! [instruction, "[Conversation summary] ...", recent...]
//! ```
//!
//! The recent window starts at a user message, so an assistant message is
//! never separated from the tool results that answer it. A failed summary
//! call degrades to a placeholder; compaction never fails a turn.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CompactionConfig;
use crate::error::{PilotError, ProviderError, Result};
use crate::providers::{ChatOptions, LLMProvider};
use crate::session::{Message, Role};
use crate::utils::string::preview;

use super::Conversation;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Appended to the previous summary when a new one could not be produced.
pub const LOST_CONTEXT_NOTICE: &str = "[Additional context was lost during compaction.]";

/// Leading line of the summary message placed at index 1.
pub const SUMMARY_HEADER: &str = "[Conversation summary]";

const SUMMARY_SYSTEM_PROMPT: &str = "You compress the history of an autonomous game-playing agent. \
Write a concise bullet-point summary of what happened: goals, decisions, \
game state learned (location, ship, cargo, credits), outstanding tasks and \
errors worth remembering. Do not invent facts.";

/// Summary carried across turns and rebuilt by each compaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionState {
    /// Latest summary of evicted history (empty before the first compaction)
    pub summary: String,
    /// Number of compactions applied so far
    pub compactions: u32,
}

/// Estimated tokens of one message: text, tool-call names and arguments,
/// and reasoning.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let mut chars = message.content.chars().count();
    if let Some(calls) = &message.tool_calls {
        for call in calls {
            chars += call.name.chars().count() + call.arguments.chars().count();
        }
    }
    if let Some(reasoning) = &message.reasoning {
        chars += reasoning.chars().count();
    }
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Estimated tokens of a whole conversation, system prompt included.
pub fn estimate_tokens(conversation: &Conversation) -> usize {
    conversation.system_prompt().chars().count().div_ceil(CHARS_PER_TOKEN)
        + conversation
            .messages()
            .iter()
            .map(estimate_message_tokens)
            .sum::<usize>()
}

/// Whether `message` is a summary placed by an earlier compaction.
pub fn is_summary(message: &Message) -> bool {
    message.role == Role::User && message.content.starts_with(SUMMARY_HEADER)
}

/// Index where the verbatim recent window begins, or `None` when nothing
/// can be evicted.
///
/// The window is grown backward from the end until `recent_budget` tokens
/// would be exceeded, but always holds at least `min_recent` messages (at
/// least one). The candidate then snaps forward to the next user message
/// (never past the `min_recent` floor), else backward to the previous one.
/// When neither exists it falls back to the nearest preceding assistant
/// message. The evicted range `[1, split)` always holds something besides a
/// previous summary.
///
/// # Example
/// ```
/// use gamepilot::agent::compaction::find_split;
/// use gamepilot::session::Message;
///
/// let mut messages = vec![Message::user("instruction")];
/// for i in 0..5 {
///     messages.push(Message::user(&format!("turn {}", i)));
///     messages.push(Message::assistant(&"x".repeat(400)));
/// }
/// // Budget fits two messages; the split lands on the user message "turn 4".
/// assert_eq!(find_split(&messages, 200, 2), Some(9));
/// ```
pub fn find_split(messages: &[Message], recent_budget: usize, min_recent: usize) -> Option<usize> {
    let n = messages.len();
    if n < 3 {
        return None;
    }
    let min_recent = min_recent.max(1);

    let mut start = n;
    let mut acc = 0usize;
    for i in (1..n).rev() {
        let tokens = estimate_message_tokens(&messages[i]);
        if n - start >= min_recent && acc + tokens > recent_budget {
            break;
        }
        acc += tokens;
        start = i;
    }

    // Smallest split that evicts real history.
    let lowest = if is_summary(&messages[1]) { 3 } else { 2 };
    let floor = n.saturating_sub(min_recent).max(1);
    let candidate = start.max(lowest);

    let is_user = |i: &usize| messages[*i].role == Role::User;
    (candidate..=floor)
        .find(is_user)
        .or_else(|| (lowest..candidate).rev().find(is_user))
        .or_else(|| {
            (lowest..=candidate.min(n - 1))
                .rev()
                .find(|i| messages[*i].role == Role::Assistant)
        })
}

/// Plain-text rendering of evicted messages for the summarization call.
pub fn render_transcript(messages: &[Message], tool_result_chars: usize) -> String {
    let mut lines = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::User if is_summary(message) => {}
            Role::User => lines.push(format!("User: {}", message.content)),
            Role::Assistant => {
                if !message.content.is_empty() {
                    lines.push(format!("Assistant: {}", message.content));
                }
                for call in message.tool_calls.iter().flatten() {
                    lines.push(format!("Assistant called {}({})", call.name, call.arguments));
                }
            }
            Role::Tool => {
                let tag = if message.is_error_result() { " [error]" } else { "" };
                lines.push(format!(
                    "Tool result{}: {}",
                    tag,
                    preview(&message.content, tool_result_chars)
                ));
            }
            Role::System => {}
        }
    }
    lines.join("\n")
}

/// Keeps a conversation inside its token budget.
pub struct ContextCompactor {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    config: CompactionConfig,
}

impl ContextCompactor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: CompactionConfig) -> Self {
        Self {
            provider,
            model: None,
            config,
        }
    }

    /// Use `model` for summaries instead of the provider default.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Token count at which compaction kicks in.
    pub fn threshold_tokens(&self) -> usize {
        (self.config.context_window as f64 * self.config.threshold) as usize
    }

    pub fn needs_compaction(&self, conversation: &Conversation) -> bool {
        self.config.enabled && estimate_tokens(conversation) >= self.threshold_tokens()
    }

    /// Compact when over the threshold. Returns whether the history changed.
    pub async fn maybe_compact(
        &self,
        conversation: &mut Conversation,
        state: &mut CompactionState,
        cancel: &CancellationToken,
    ) -> bool {
        if !self.needs_compaction(conversation) {
            return false;
        }
        self.compact(conversation, state, cancel).await
    }

    /// Summarize everything between the instruction and the recent window.
    ///
    /// Returns `false` when there was nothing to evict or `cancel` fired.
    pub async fn compact(
        &self,
        conversation: &mut Conversation,
        state: &mut CompactionState,
        cancel: &CancellationToken,
    ) -> bool {
        let tokens_before = estimate_tokens(conversation);
        let split = match find_split(
            conversation.messages(),
            self.config.recent_budget_tokens,
            self.config.min_recent_messages,
        ) {
            Some(split) => split,
            None => {
                debug!(messages = conversation.len(), "Nothing to compact");
                return false;
            }
        };

        let evicted = &conversation.messages()[1..split];
        let summary = match self.summarize(&state.summary, evicted, cancel).await {
            Ok(summary) => summary,
            Err(PilotError::Cancelled) => return false,
            Err(e) => {
                warn!(error = %e, "Summary call failed; keeping previous summary");
                if state.summary.is_empty() {
                    LOST_CONTEXT_NOTICE.to_string()
                } else {
                    format!("{}\n{}", state.summary, LOST_CONTEXT_NOTICE)
                }
            }
        };

        let evicted_count = split - 1;
        let mut tail = Vec::with_capacity(conversation.len() - split + 1);
        tail.push(Message::user(&format!("{}\n{}", SUMMARY_HEADER, summary)));
        tail.extend(conversation.messages()[split..].iter().cloned());
        conversation.replace_tail(tail);

        state.summary = summary;
        state.compactions += 1;

        info!(
            evicted = evicted_count,
            kept = conversation.len(),
            tokens_before,
            tokens_after = estimate_tokens(conversation),
            compactions = state.compactions,
            "Compacted conversation"
        );
        true
    }

    async fn summarize(
        &self,
        previous: &str,
        evicted: &[Message],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let transcript = render_transcript(evicted, self.config.tool_result_chars);
        let mut prompt = String::new();
        if !previous.is_empty() {
            prompt.push_str("Summary so far:\n");
            prompt.push_str(previous);
            prompt.push_str("\n\n");
        }
        prompt.push_str("New history to fold into the summary:\n");
        prompt.push_str(&transcript);

        let options = ChatOptions::new()
            .with_max_tokens(self.config.summary_max_tokens)
            .with_temperature(0.0)
            .with_cancel(cancel.clone());
        let call = self.provider.chat(
            vec![
                Message::system(SUMMARY_SYSTEM_PROMPT),
                Message::user(&prompt),
            ],
            vec![],
            self.model.as_deref(),
            options,
        );

        let timeout = Duration::from_secs(self.config.summary_timeout_secs);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PilotError::Cancelled),
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(response) => response?,
                Err(_) => {
                    return Err(ProviderError::Timeout(format!(
                        "summary call exceeded {}s",
                        timeout.as_secs()
                    ))
                    .into())
                }
            },
        };

        let text = response.text_content();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse("summary had no text".into()).into());
        }
        Ok(text.trim().to_string())
    }
}
