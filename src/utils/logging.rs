//! Logging initialization for GamePilot.
//!
//! Supports three formats:
//! - `pretty`: multi-line human-readable output
//! - `component`: compact `LEVEL target message {fields}` lines; use the
//!   [`log_component!`] macro to add a `component` field for per-subsystem filtering
//! - `json`: structured JSON lines for log aggregators
//!
//! When `file` is set, lines are appended to that file instead of stderr.

use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{PilotError, Result};

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
/// `RUST_LOG` wins over `cfg.level` when set.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (&cfg.file, cfg.format) {
        (Some(path), format) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Json => builder.json().try_init(),
                LogFormat::Pretty => builder.pretty().try_init(),
                LogFormat::Component => builder.compact().try_init(),
            }
        }
        (None, LogFormat::Json) => builder.json().try_init(),
        (None, LogFormat::Pretty) => builder.pretty().try_init(),
        (None, LogFormat::Component) => builder.compact().try_init(),
    };

    installed.map_err(|e| PilotError::Config(format!("Failed to initialize logging: {}", e)))
}

/// Emit a component-tagged tracing event.
///
/// Works with any tracing level (`trace`, `debug`, `info`, `warn`, `error`).
/// The `component` field makes it easy to grep logs by subsystem:
///
/// ```
/// # use gamepilot::log_component;
/// log_component!(info, "client", "session established");
/// log_component!(warn, "compaction", "summary failed", kept = 6u64, dropped = 40u64);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}
