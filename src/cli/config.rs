//! Config command handlers.

use anyhow::{Context, Result};

use gamepilot::config::validate::{validate_config, DiagnosticLevel};
use gamepilot::config::Config;

use super::ConfigAction;

const REDACTED: &str = "********";

pub(crate) async fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", Config::path().display());
        }
        ConfigAction::Show => {
            let mut config = Config::load().context("Failed to load config")?;
            if config.game.password.is_some() {
                config.game.password = Some(REDACTED.to_string());
            }
            if config.provider.api_key.is_some() {
                config.provider.api_key = Some(REDACTED.to_string());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Check => cmd_check()?,
    }
    Ok(())
}

/// Validate field names in the file, then the loaded values.
fn cmd_check() -> Result<()> {
    let config_path = Config::path();
    println!("Config file: {}", config_path.display());

    let mut diagnostics = Vec::new();
    if config_path.exists() {
        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let raw: serde_json::Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                println!("[ERROR] Invalid JSON: {}", e);
                return Ok(());
            }
        };
        diagnostics.extend(validate_config(&raw));
    } else {
        println!("[OK] No config file found (using defaults)");
    }

    let config = Config::load().context("Failed to load config")?;
    diagnostics.extend(config.validate());

    for diag in &diagnostics {
        println!("{}", diag);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Warn)
        .count();

    if errors == 0 && warnings == 0 {
        println!("\nConfiguration looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }
    Ok(())
}
