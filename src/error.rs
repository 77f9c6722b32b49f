//! Error types for GamePilot
//!
//! Game API failures reported by the server (rate limiting, domain error
//! codes) are *data* and live in [`crate::game::ApiError`]; the types here
//! cover failures of the process itself.

use std::fmt;
use thiserror::Error;

/// Language-model failure, classified so the retry layer can decide
/// without inspecting message text.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 or 403
    Auth(String),
    /// 429
    RateLimit(String),
    /// 402
    Billing(String),
    /// 5xx other than 529
    ServerError(String),
    /// 400
    InvalidRequest(String),
    /// 404
    ModelNotFound(String),
    /// Per-call deadline elapsed
    Timeout(String),
    /// 529, or an `overloaded_error` body
    Overloaded(String),
    /// Zero content blocks or an explicit `error` stop reason
    EmptyResponse(String),
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::EmptyResponse(msg) => write!(f, "Empty response: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Transient failures that the retry layer may repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Overloaded(_)
                | ProviderError::EmptyResponse(_)
        )
    }

    /// Representative HTTP status for the class, if it has one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Overloaded(_) => Some(503),
            ProviderError::Timeout(_)
            | ProviderError::EmptyResponse(_)
            | ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for PilotError {
    fn from(err: ProviderError) -> Self {
        PilotError::ProviderTyped(err)
    }
}

/// Everything that can abort a GamePilot operation.
#[derive(Error, Debug)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider failure known only by its message
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Bad tool arguments or a failed local tool
    #[error("Tool error: {0}")]
    Tool(String),

    /// Malformed session payload from the game server
    #[error("Session error: {0}")]
    Session(String),

    /// Game server unreachable, or session bootstrap exhausted its attempts
    #[error("Connection error: {0}")]
    Connection(String),

    /// The operation was cancelled through its cancellation token
    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PilotError>;
