//! `play` command handler.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use gamepilot::agent::{AgentEvent, AgentLoop, TurnOutcome, CONTINUE_NUDGE};
use gamepilot::tools::{default_registry, ToolNotification};
use gamepilot::tools::local::{MemoryNotesStore, NotesStore};

use super::common::{build_client, build_provider, ctrl_c_token, load_config};

/// Run the agent for `turns` turns.
pub(crate) async fn cmd_play(instruction: Option<String>, turns: u32) -> Result<()> {
    let config = load_config()?;
    let client = Arc::new(build_client(&config)?);
    let provider = build_provider(&config)?;
    let notes: Arc<dyn NotesStore> = Arc::new(MemoryNotesStore::default());

    let (note_tx, note_rx) = mpsc::unbounded_channel();
    let tools = default_registry(client, notes, &config).with_notifications(note_tx);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let agent = AgentLoop::from_config(&config, provider, tools).with_events(event_tx);

    let printer = tokio::spawn(print_until_closed(event_rx, note_rx, |line| {
        println!("{}", line)
    }));

    let (nudge_tx, nudge_rx) = mpsc::channel(turns.max(1) as usize);
    for _ in 1..turns {
        nudge_tx.send(CONTINUE_NUDGE.to_string()).await?;
    }
    drop(nudge_tx);

    let instruction = instruction.unwrap_or_else(|| config.agent.instruction.clone());
    let cancel = ctrl_c_token();
    let report = agent.play(&instruction, nudge_rx, &cancel).await;

    drop(agent);
    let _ = printer.await;

    println!(
        "\nPlayed {} turn(s); compactions: {}; last outcome: {}",
        report.turns,
        report.state.compactions,
        describe(&report.last_outcome)
    );
    Ok(())
}

/// Render agent events and notifications until both channels have closed.
async fn print_until_closed(
    mut event_rx: mpsc::UnboundedReceiver<AgentEvent>,
    mut note_rx: mpsc::UnboundedReceiver<ToolNotification>,
    mut out: impl FnMut(String),
) {
    let mut events_open = true;
    let mut notes_open = true;
    while events_open || notes_open {
        tokio::select! {
            event = event_rx.recv(), if events_open => match event {
                Some(event) => {
                    if let Some(line) = render_event(event) {
                        out(line);
                    }
                }
                None => events_open = false,
            },
            note = note_rx.recv(), if notes_open => match note {
                Some(note) => out(format!("  [{}] {}", note.tool, note.payload)),
                None => notes_open = false,
            },
        }
    }
}

fn render_event(event: AgentEvent) -> Option<String> {
    match event {
        AgentEvent::Text { text, .. } => Some(text),
        AgentEvent::ToolStarted { name, arguments } => Some(format!("  -> {}({})", name, arguments)),
        AgentEvent::ToolFinished {
            name,
            is_error: true,
            preview,
        } => Some(format!("  !! {}: {}", name, preview)),
        AgentEvent::Compacted { compactions } => {
            Some(format!("  [context compacted, #{}]", compactions))
        }
        AgentEvent::ToolFinished { .. } => None,
    }
}

fn describe(outcome: &TurnOutcome) -> String {
    match outcome {
        TurnOutcome::Completed => "completed".to_string(),
        TurnOutcome::RoundLimit => "round limit reached".to_string(),
        TurnOutcome::Cancelled => "cancelled".to_string(),
        TurnOutcome::Failed { error } => format!("failed ({})", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_buffered_notifications_survive_closed_events() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (note_tx, note_rx) = mpsc::unbounded_channel();

        event_tx
            .send(AgentEvent::Text {
                round: 1,
                text: "Docking.".into(),
            })
            .unwrap();
        for i in 0..20 {
            note_tx
                .send(ToolNotification {
                    tool: "game".into(),
                    payload: json!({"seq": i}),
                })
                .unwrap();
        }
        drop(event_tx);
        drop(note_tx);

        let mut lines = Vec::new();
        print_until_closed(event_rx, note_rx, |line| lines.push(line)).await;

        assert_eq!(lines.len(), 21);
        assert!(lines.contains(&"Docking.".to_string()));
        assert_eq!(lines.iter().filter(|l| l.starts_with("  [game]")).count(), 20);
    }

    #[test]
    fn test_successful_tool_finish_is_silent() {
        let event = AgentEvent::ToolFinished {
            name: "mine".into(),
            is_error: false,
            preview: "ok".into(),
        };
        assert!(render_event(event).is_none());
    }
}
