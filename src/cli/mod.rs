//! CLI command parsing and dispatch.
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod common;
pub mod config;
pub mod exec;
pub mod play;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gamepilot")]
#[command(version)]
#[command(about = "Language-model agent that plays an online game", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a game session driven by the agent
    Play {
        /// Initial instruction (defaults to agent.instruction from config)
        #[arg(short, long)]
        instruction: Option<String>,
        /// Number of turns; every turn after the first starts with "continue"
        #[arg(short, long, default_value_t = 1)]
        turns: u32,
    },
    /// Send one command to the game server and print the response
    Exec {
        /// Command name (e.g. get_status, v2_get_ship, storage)
        command: String,
        /// JSON object payload
        #[arg(short, long)]
        payload: Option<String>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file location
    Path,
    /// Validate the config file
    Check,
}

pub async fn run() -> Result<()> {
    // Load config early so we can respect the logging settings; fall back to
    // defaults if the config file is missing or unreadable.
    let logging_cfg = gamepilot::config::Config::load()
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = gamepilot::utils::logging::init_logging(&logging_cfg) {
        eprintln!("Warning: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Play { instruction, turns }) => {
            play::cmd_play(instruction, turns).await?;
        }
        Some(Commands::Exec { command, payload }) => {
            exec::cmd_exec(command, payload).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(action).await?;
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("gamepilot {}", env!("CARGO_PKG_VERSION"));
}
