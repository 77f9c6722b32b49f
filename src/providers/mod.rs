//! Language-model access.
//!
//! [`LLMProvider`] is the seam the agent loop and the compactor call
//! through. [`ClaudeProvider`] talks to the Anthropic Messages API and
//! [`RetryProvider`] adds a per-call deadline, cancellation and backoff.
//!
//! # Example
//!
//! ```rust,ignore
//! use gamepilot::providers::{ChatOptions, ClaudeProvider, LLMProvider, RetryProvider};
//! use gamepilot::session::Message;
//!
//! async fn example() {
//!     let provider = RetryProvider::new(Box::new(ClaudeProvider::new("your-api-key")));
//!     let messages = vec![Message::user("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = provider.chat(messages, vec![], None, options).await.unwrap();
//!     println!("Response: {}", response.text_content());
//! }
//! ```

pub mod claude;
pub mod retry;
mod types;

use crate::error::ProviderError;

pub use claude::ClaudeProvider;
pub use retry::RetryProvider;
pub use types::{
    ChatOptions, ContentBlock, LLMProvider, LLMResponse, LLMToolCall, StopReason, ToolDefinition,
    Usage,
};

/// Classify a non-success HTTP reply from a provider.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 => ProviderError::InvalidRequest(body.to_string()),
        529 => ProviderError::Overloaded(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let cases: [(u16, fn(&ProviderError) -> bool); 9] = [
            (401, |e| matches!(e, ProviderError::Auth(_))),
            (403, |e| matches!(e, ProviderError::Auth(_))),
            (402, |e| matches!(e, ProviderError::Billing(_))),
            (404, |e| matches!(e, ProviderError::ModelNotFound(_))),
            (400, |e| matches!(e, ProviderError::InvalidRequest(_))),
            (429, |e| matches!(e, ProviderError::RateLimit(_))),
            (500, |e| matches!(e, ProviderError::ServerError(_))),
            (504, |e| matches!(e, ProviderError::ServerError(_))),
            (529, |e| matches!(e, ProviderError::Overloaded(_))),
        ];
        for (status, check) in cases {
            let err = parse_provider_error(status, "body");
            assert!(check(&err), "status {} classified as {:?}", status, err);
        }
    }

    #[test]
    fn test_overload_and_gateway_errors_retry() {
        assert!(parse_provider_error(529, "overloaded").is_retryable());
        assert!(parse_provider_error(502, "bad gateway").is_retryable());
        assert!(!parse_provider_error(400, "bad json").is_retryable());
        assert!(!parse_provider_error(403, "forbidden").is_retryable());
    }

    #[test]
    fn test_unrecognized_status_keeps_code() {
        let err = parse_provider_error(418, "teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }
}
