//! Agent loop implementation
//!
//! One turn is a bounded sequence of rounds. Each round runs the compaction
//! gate, calls the model with the full conversation, records the assistant
//! message and executes its tool calls in order. A turn ends when the model
//! answers without tool calls, the round cap is hit, the cancellation token
//! fires, or the model call fails for good.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{AgentDefaults, Config};
use crate::error::PilotError;
use crate::providers::{ChatOptions, LLMProvider};
use crate::session::{Message, ToolCall};
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};
use crate::utils::string::preview;

use super::compaction::{CompactionState, ContextCompactor};
use super::Conversation;

/// Message used to start every turn after the first in [`AgentLoop::play`].
pub const CONTINUE_NUDGE: &str = "continue";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model replied without tool calls.
    Completed,
    /// `max_rounds` rounds ran without the model finishing.
    RoundLimit,
    /// The cancellation token fired.
    Cancelled,
    /// The model call failed after retries.
    Failed { error: String },
}

/// Observable progress of a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A text segment of an assistant message
    Text { round: u32, text: String },
    /// A tool call is about to run
    ToolStarted { name: String, arguments: String },
    /// A tool call finished
    ToolFinished {
        name: String,
        is_error: bool,
        preview: String,
    },
    /// The history was compacted
    Compacted { compactions: u32 },
}

/// Final state of an [`AgentLoop::play`] session.
#[derive(Debug, Clone)]
pub struct PlayReport {
    pub conversation: Conversation,
    pub state: CompactionState,
    pub turns: u32,
    pub last_outcome: TurnOutcome,
}

/// Drives the model through think/act rounds.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use gamepilot::agent::{AgentLoop, CompactionState, Conversation};
/// use gamepilot::config::Config;
/// use gamepilot::providers::{ClaudeProvider, RetryProvider};
/// use gamepilot::tools::ToolRegistry;
/// use tokio_util::sync::CancellationToken;
///
/// let config = Config::default();
/// let provider = Arc::new(RetryProvider::new(Box::new(ClaudeProvider::new("key"))));
/// let agent = AgentLoop::from_config(&config, provider, ToolRegistry::new());
///
/// let mut conversation = Conversation::new(&config.agent.system_prompt, "Check your cargo.");
/// let mut state = CompactionState::default();
/// let outcome = agent
///     .run_turn(&mut conversation, &mut state, &CancellationToken::new())
///     .await;
/// ```
pub struct AgentLoop {
    provider: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    compactor: ContextCompactor,
    model: Option<String>,
    system_prompt: String,
    max_rounds: u32,
    max_tokens: u32,
    temperature: f32,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: ToolRegistry,
        compactor: ContextCompactor,
        agent: &AgentDefaults,
    ) -> Self {
        Self {
            provider,
            tools,
            compactor,
            model: Some(agent.model.clone()).filter(|m| !m.is_empty()),
            system_prompt: agent.system_prompt.clone(),
            max_rounds: agent.max_rounds,
            max_tokens: agent.max_tokens,
            temperature: agent.temperature,
            events: None,
        }
    }

    /// Build the loop and its compactor from configuration.
    pub fn from_config(config: &Config, provider: Arc<dyn LLMProvider>, tools: ToolRegistry) -> Self {
        let mut compactor = ContextCompactor::new(provider.clone(), config.compaction.clone());
        if !config.agent.model.is_empty() {
            compactor = compactor.with_model(&config.agent.model);
        }
        Self::new(provider, tools, compactor, &config.agent)
    }

    /// Publish [`AgentEvent`]s to `sender`.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    /// Run one turn against `conversation`.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        state: &mut CompactionState,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let turn_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("turn", turn_id = %turn_id);
        self.run_rounds(conversation, state, cancel, &turn_id)
            .instrument(span)
            .await
    }

    async fn run_rounds(
        &self,
        conversation: &mut Conversation,
        state: &mut CompactionState,
        cancel: &CancellationToken,
        turn_id: &str,
    ) -> TurnOutcome {
        let definitions = self.tools.definitions();
        let tool_ctx = ToolContext::new()
            .with_cancel(cancel.clone())
            .with_turn(turn_id);

        for round in 1..=self.max_rounds {
            if cancel.is_cancelled() {
                info!(round, "Turn cancelled");
                return TurnOutcome::Cancelled;
            }

            if self.compactor.maybe_compact(conversation, state, cancel).await {
                self.emit(AgentEvent::Compacted {
                    compactions: state.compactions,
                });
            }

            let options = ChatOptions::new()
                .with_max_tokens(self.max_tokens)
                .with_temperature(self.temperature)
                .with_cancel(cancel.clone());
            let response = match self
                .provider
                .chat(
                    conversation.to_request(),
                    definitions.clone(),
                    self.model.as_deref(),
                    options,
                )
                .await
            {
                Ok(response) => response,
                Err(PilotError::Cancelled) => {
                    info!(round, "Turn cancelled during model call");
                    return TurnOutcome::Cancelled;
                }
                Err(e) => {
                    error!(round, error = %e, "Model call failed; ending turn");
                    return TurnOutcome::Failed {
                        error: e.to_string(),
                    };
                }
            };
            if cancel.is_cancelled() {
                info!(round, "Turn cancelled after model call");
                return TurnOutcome::Cancelled;
            }

            if let Some(usage) = &response.usage {
                debug!(
                    round,
                    input_tokens = usage.prompt_tokens,
                    output_tokens = usage.completion_tokens,
                    "Model usage"
                );
            }

            let calls: Vec<ToolCall> = response
                .tool_calls()
                .into_iter()
                .map(|c| ToolCall::new(&c.id, &c.name, &c.arguments))
                .collect();
            let text = response.text_content();
            let message = if calls.is_empty() {
                Message::assistant(&text)
            } else {
                Message::assistant_with_tools(&text, calls.clone())
            };
            conversation.push(message.with_reasoning(response.reasoning()));

            for segment in response.texts() {
                if segment.trim().is_empty() {
                    continue;
                }
                crate::log_component!(info, "agent", "Agent says", round = round, text = segment);
                self.emit(AgentEvent::Text {
                    round,
                    text: segment.to_string(),
                });
            }

            if calls.is_empty() {
                info!(round, "Turn completed");
                return TurnOutcome::Completed;
            }

            for (index, call) in calls.iter().enumerate() {
                if cancel.is_cancelled() {
                    // Unanswered calls still need a paired result.
                    for skipped in &calls[index..] {
                        conversation.push(Message::tool_result(
                            &skipped.id,
                            &ToolOutput::error("Cancelled before execution").render(),
                        ));
                    }
                    info!(round, "Turn cancelled between tool calls");
                    return TurnOutcome::Cancelled;
                }

                let output = self.run_tool(call, &tool_ctx).await;
                conversation.push(Message::tool_result(&call.id, &output.render()));
            }
        }

        warn!(max_rounds = self.max_rounds, "Round limit reached");
        TurnOutcome::RoundLimit
    }

    async fn run_tool(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutput {
        info!(tool = %call.name, id = %call.id, "Executing tool");
        self.emit(AgentEvent::ToolStarted {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let output = match parse_arguments(&call.arguments) {
            Ok(args) => self.tools.execute(&call.name, args, ctx).await,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Invalid JSON in tool arguments");
                ToolOutput::error(format!("Invalid arguments JSON: {}", e))
            }
        };

        self.emit(AgentEvent::ToolFinished {
            name: call.name.clone(),
            is_error: output.is_error,
            preview: preview(&output.for_llm, 200),
        });
        output
    }

    /// Play a game session: the first turn follows `instruction`, then one
    /// more turn runs per message received on `nudges`.
    ///
    /// Returns once `nudges` closes or a turn is cancelled.
    pub async fn play(
        &self,
        instruction: &str,
        mut nudges: mpsc::Receiver<String>,
        cancel: &CancellationToken,
    ) -> PlayReport {
        let mut conversation = Conversation::new(&self.system_prompt, instruction);
        let mut state = CompactionState::default();
        let mut turns = 0u32;

        let mut outcome = self.run_turn(&mut conversation, &mut state, cancel).await;
        turns += 1;

        while outcome != TurnOutcome::Cancelled {
            if let TurnOutcome::Failed { error } = &outcome {
                warn!(turn = turns, error = %error, "Turn failed; waiting for next nudge");
            }
            let nudge = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    outcome = TurnOutcome::Cancelled;
                    break;
                }
                nudge = nudges.recv() => match nudge {
                    Some(nudge) => nudge,
                    None => break,
                },
            };
            conversation.push(Message::user(&nudge));
            outcome = self.run_turn(&mut conversation, &mut state, cancel).await;
            turns += 1;
        }

        info!(turns, outcome = ?outcome, compactions = state.compactions, "Game session ended");
        PlayReport {
            conversation,
            state,
            turns,
            last_outcome: outcome,
        }
    }
}

/// Tool arguments as JSON; an empty string means no arguments.
fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompactionConfig;
    use crate::error::{ProviderError, Result};
    use crate::providers::{LLMResponse, LLMToolCall, ToolDefinition};
    use crate::session::Role;
    use crate::tools::{Tool, ToolCategory};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider replaying a script of replies.
    struct Scripted {
        replies: Mutex<VecDeque<Result<LLMResponse>>>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<LLMResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push(messages);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LLMResponse::text("done")))
        }

        fn default_model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Counter {
        calls: Arc<Mutex<Vec<Value>>>,
        cancel_on_call: Option<CancellationToken>,
    }

    #[async_trait]
    impl Tool for Counter {
        fn name(&self) -> &str {
            "count"
        }
        fn description(&self) -> &str {
            "Counts"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        fn category(&self) -> ToolCategory {
            ToolCategory::Local
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(args);
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            Ok(ToolOutput::llm_only("counted"))
        }
    }

    fn agent_with(
        provider: Arc<Scripted>,
        cancel_on_call: Option<CancellationToken>,
    ) -> (AgentLoop, Arc<Mutex<Vec<Value>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(Counter {
            calls: calls.clone(),
            cancel_on_call,
        }));
        let config = Config {
            agent: AgentDefaults {
                max_rounds: 3,
                ..Default::default()
            },
            compaction: CompactionConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        (AgentLoop::from_config(&config, provider, tools), calls)
    }

    fn tool_reply(ids: &[&str]) -> Result<LLMResponse> {
        Ok(LLMResponse::with_tools(
            "Counting.",
            ids.iter()
                .map(|id| LLMToolCall::new(id, "count", r#"{"n":1}"#))
                .collect(),
        ))
    }

    #[tokio::test]
    async fn test_turn_completes_without_tool_calls() {
        let provider = Scripted::new(vec![Ok(LLMResponse::text("All done."))]);
        let (agent, _) = agent_with(provider.clone(), None);
        let mut conv = Conversation::new("sys", "go");
        let mut state = CompactionState::default();

        let outcome = agent
            .run_turn(&mut conv, &mut state, &CancellationToken::new())
            .await;
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last_assistant_text(), Some("All done."));

        let request = &provider.requests.lock().unwrap()[0];
        assert_eq!(request[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_tool_calls_run_in_order_and_pair_results() {
        let provider = Scripted::new(vec![
            tool_reply(&["a", "b"]),
            Ok(LLMResponse::text("Finished.")),
        ]);
        let (agent, calls) = agent_with(provider.clone(), None);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = agent.with_events(tx);
        let mut conv = Conversation::new("sys", "go");
        let mut state = CompactionState::default();

        let outcome = agent
            .run_turn(&mut conv, &mut state, &CancellationToken::new())
            .await;
        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(calls.lock().unwrap().len(), 2);

        let msgs = conv.messages();
        assert!(msgs[1].has_tool_calls());
        assert_eq!(msgs[2].tool_call_id.as_deref(), Some("a"));
        assert_eq!(msgs[3].tool_call_id.as_deref(), Some("b"));
        assert_eq!(msgs[3].content, "counted");
        assert_eq!(msgs[4].content, "Finished.");

        // Second model call sees the tool results.
        assert_eq!(provider.requests.lock().unwrap()[1].len(), 1 + 4);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(&events[0], AgentEvent::Text { round: 1, text } if text == "Counting."));
        assert!(matches!(&events[1], AgentEvent::ToolStarted { name, .. } if name == "count"));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let provider = Scripted::new(vec![tool_reply(&["1"]), tool_reply(&["2"]), tool_reply(&["3"])]);
        let (agent, calls) = agent_with(provider, None);
        let mut conv = Conversation::new("sys", "go");
        let outcome = agent
            .run_turn(&mut conv, &mut CompactionState::default(), &CancellationToken::new())
            .await;
        assert_eq!(outcome, TurnOutcome::RoundLimit);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_model_failure_ends_turn() {
        let provider = Scripted::new(vec![Err(ProviderError::Auth("bad key".into()).into())]);
        let (agent, _) = agent_with(provider, None);
        let mut conv = Conversation::new("sys", "go");
        let outcome = agent
            .run_turn(&mut conv, &mut CompactionState::default(), &CancellationToken::new())
            .await;
        assert!(matches!(outcome, TurnOutcome::Failed { error } if error.contains("bad key")));
        assert_eq!(conv.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let provider = Scripted::new(vec![]);
        let (agent, _) = agent_with(provider.clone(), None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut conv = Conversation::new("sys", "go");
        let outcome = agent
            .run_turn(&mut conv, &mut CompactionState::default(), &cancel)
            .await;
        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_between_tool_calls_pairs_remaining() {
        let cancel = CancellationToken::new();
        let provider = Scripted::new(vec![tool_reply(&["a", "b", "c"])]);
        let (agent, calls) = agent_with(provider, Some(cancel.clone()));
        let mut conv = Conversation::new("sys", "go");

        let outcome = agent
            .run_turn(&mut conv, &mut CompactionState::default(), &cancel)
            .await;
        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(calls.lock().unwrap().len(), 1);

        let results: Vec<&Message> = conv.messages().iter().filter(|m| m.is_tool_result()).collect();
        assert_eq!(results.len(), 3);
        assert!(results[1].is_error_result());
        assert!(results[2].is_error_result());
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_error_result() {
        let provider = Scripted::new(vec![
            Ok(LLMResponse::with_tools(
                "",
                vec![LLMToolCall::new("x", "count", "{not json")],
            )),
            Ok(LLMResponse::text("ok")),
        ]);
        let (agent, calls) = agent_with(provider, None);
        let mut conv = Conversation::new("sys", "go");
        agent
            .run_turn(&mut conv, &mut CompactionState::default(), &CancellationToken::new())
            .await;
        assert!(calls.lock().unwrap().is_empty());
        assert!(conv.messages()[2].content.starts_with("Error: Invalid arguments JSON"));
    }

    #[test]
    fn test_parse_empty_arguments() {
        assert_eq!(parse_arguments("  ").unwrap(), json!({}));
        assert_eq!(parse_arguments(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_play_runs_one_turn_per_nudge() {
        let provider = Scripted::new(vec![]);
        let (agent, _) = agent_with(provider.clone(), None);
        let (tx, rx) = mpsc::channel(4);
        tx.send(CONTINUE_NUDGE.to_string()).await.unwrap();
        tx.send(CONTINUE_NUDGE.to_string()).await.unwrap();
        drop(tx);

        let report = agent.play("Explore.", rx, &CancellationToken::new()).await;
        assert_eq!(report.turns, 3);
        assert_eq!(report.last_outcome, TurnOutcome::Completed);
        assert_eq!(report.conversation.instruction().content, "Explore.");
        // instruction, reply, nudge, reply, nudge, reply
        assert_eq!(report.conversation.len(), 6);
    }
}
