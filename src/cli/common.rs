//! Shared CLI helpers used across multiple command handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use gamepilot::config::validate::DiagnosticLevel;
use gamepilot::config::Config;
use gamepilot::game::SessionClient;
use gamepilot::providers::{ClaudeProvider, LLMProvider, RetryProvider};

/// Load config, log warnings and refuse to start on errors.
pub(crate) fn load_config() -> Result<Config> {
    let config = Config::load()
        .with_context(|| format!("Failed to load config from {}", Config::path().display()))?;

    let mut errors = Vec::new();
    for diag in config.validate() {
        match diag.level {
            DiagnosticLevel::Error => errors.push(format!("{}: {}", diag.path, diag.message)),
            DiagnosticLevel::Warn => warn!(path = %diag.path, "{}", diag.message),
            DiagnosticLevel::Ok => {}
        }
    }
    if !errors.is_empty() {
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(config)
}

/// Session client with configured credentials.
pub(crate) fn build_client(config: &Config) -> Result<SessionClient> {
    let client = SessionClient::from_config(&config.game)
        .context("Failed to create game client")?
        .with_credentials(config.game_credentials());
    Ok(client)
}

/// Claude behind the retry/timeout decorator.
pub(crate) fn build_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let api_key = config
        .provider
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .context("No API key configured; set GAMEPILOT_PROVIDER_API_KEY")?;

    let mut claude = ClaudeProvider::new(api_key);
    if let Some(base) = config.provider.api_base.as_deref() {
        claude = claude.with_api_base(base);
    }

    let timeout = Duration::from_secs(config.agent.model_timeout_secs);
    Ok(Arc::new(RetryProvider::from_config(
        Box::new(claude),
        &config.retry,
        timeout,
    )))
}

/// Token cancelled on Ctrl-C.
pub(crate) fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received; cancelling");
            trigger.cancel();
        }
    });
    token
}
