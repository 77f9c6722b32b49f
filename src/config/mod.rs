//! Configuration management for GamePilot
//!
//! This module provides configuration loading and saving.
//! Configuration is loaded from `~/.gamepilot/config.json` with environment variable overrides.

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the GamePilot configuration directory path (~/.gamepilot)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gamepilot")
    }

    /// Returns the path to the config file (~/.gamepilot/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    /// Environment variables can override config values using the pattern:
    /// `GAMEPILOT_SECTION_KEY`
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern: GAMEPILOT_SECTION_KEY
    fn apply_env_overrides(&mut self) {
        // Agent
        if let Ok(val) = std::env::var("GAMEPILOT_AGENT_MODEL") {
            self.agent.model = val;
        }
        if let Ok(val) = std::env::var("GAMEPILOT_AGENT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("GAMEPILOT_AGENT_MAX_ROUNDS") {
            if let Ok(v) = val.parse() {
                self.agent.max_rounds = v;
            }
        }
        if let Ok(val) = std::env::var("GAMEPILOT_AGENT_INSTRUCTION") {
            self.agent.instruction = val;
        }

        // Game
        if let Ok(val) = std::env::var("GAMEPILOT_GAME_BASE_URL") {
            self.game.base_url = val;
        }
        if let Ok(val) = std::env::var("GAMEPILOT_GAME_USERNAME") {
            self.game.username = Some(val);
        }
        if let Ok(val) = std::env::var("GAMEPILOT_GAME_PASSWORD") {
            self.game.password = Some(val);
        }

        // Provider
        if let Ok(val) = std::env::var("GAMEPILOT_PROVIDER_API_KEY") {
            self.provider.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("GAMEPILOT_PROVIDER_API_BASE") {
            self.provider.api_base = Some(val);
        }

        // Logging
        if let Ok(val) = std::env::var("GAMEPILOT_LOGGING_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Semantic diagnostics for this configuration (empty when it looks sane).
    pub fn validate(&self) -> Vec<validate::Diagnostic> {
        validate::validate_semantics(self)
    }

    /// Credentials configured for the game, if both halves are present.
    pub fn game_credentials(&self) -> Option<crate::game::Credentials> {
        match (&self.game.username, &self.game.password) {
            (Some(username), Some(password)) => {
                Some(crate::game::Credentials::new(username, password))
            }
            _ => None,
        }
    }
}
