//! Retry provider - decorator that adds a per-call deadline, cancellation and
//! automatic retry with exponential backoff.
//!
//! Wraps any [`LLMProvider`] to transparently retry transient errors such as
//! HTTP 429 (rate limit), 5xx (server errors), provider overload, per-call
//! timeouts and degenerate responses (zero content blocks or an `error` stop
//! reason).
//!
//! # Example
//!
//! ```rust,ignore
//! use gamepilot::providers::retry::RetryProvider;
//! use gamepilot::providers::claude::ClaudeProvider;
//!
//! let inner = ClaudeProvider::new("api-key");
//! let provider = RetryProvider::new(Box::new(inner))
//!     .with_max_retries(5)
//!     .with_base_delay_ms(500)
//!     .with_timeout(std::time::Duration::from_secs(120));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{PilotError, ProviderError, Result};
use crate::session::Message;

use super::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};

/// Patterns in untyped error messages that indicate a transient failure.
const RETRYABLE_PATTERNS: &[&str] = &[
    "429",
    "500",
    "502",
    "503",
    "504",
    "rate limit",
    "overloaded",
    "too many requests",
    "service unavailable",
];

/// A decorator provider that retries transient LLM errors with exponential backoff.
///
/// Every attempt races the inner call against the per-call deadline and the
/// cancellation token carried in [`ChatOptions::cancel`]; whichever fires
/// first wins. Cancellation is never retried.
pub struct RetryProvider {
    /// The wrapped provider that performs actual LLM requests.
    inner: Box<dyn LLMProvider>,
    /// Maximum number of retry attempts before giving up. Default: 3.
    max_retries: u32,
    /// Base delay in milliseconds for exponential backoff. Default: 1000.
    base_delay_ms: u64,
    /// Maximum delay cap in milliseconds. Default: 30000.
    max_delay_ms: u64,
    /// Hard wall-clock limit of one attempt. Default: none.
    timeout: Option<Duration>,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RetryProvider {
    /// Create a new `RetryProvider` wrapping the given inner provider.
    pub fn new(inner: Box<dyn LLMProvider>) -> Self {
        Self {
            inner,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            timeout: None,
        }
    }

    /// Create a `RetryProvider` from the retry section and a per-call deadline.
    pub fn from_config(inner: Box<dyn LLMProvider>, config: &RetryConfig, timeout: Duration) -> Self {
        Self::new(inner)
            .with_max_retries(config.max_retries)
            .with_base_delay_ms(config.base_delay_ms)
            .with_max_delay_ms(config.max_delay_ms)
            .with_timeout(timeout)
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay in milliseconds for exponential backoff.
    ///
    /// The actual delay for attempt `n` is:
    /// `min(base_delay_ms * 2^n + jitter, max_delay_ms)`
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set the maximum delay cap in milliseconds.
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Set the hard per-attempt deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// One attempt: deadline, then validity of the response.
    async fn attempt(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let call = self.inner.chat(messages, tools, model, options);
        let response = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ProviderError::Timeout(format!(
                        "no response within {}s",
                        limit.as_secs_f64()
                    ))
                    .into())
                }
            },
            None => call.await?,
        };

        if response.is_degenerate() {
            return Err(ProviderError::EmptyResponse(format!(
                "{} content blocks, stop reason {:?}",
                response.content.len(),
                response.stop_reason
            ))
            .into());
        }
        Ok(response)
    }
}

/// Check whether a [`PilotError`] represents a transient failure that should be retried.
///
/// Typed provider errors delegate to [`ProviderError::is_retryable`]; untyped
/// `Provider(String)` errors fall back to substring matching.
pub fn is_retryable(err: &PilotError) -> bool {
    match err {
        PilotError::ProviderTyped(pe) => pe.is_retryable(),
        PilotError::Provider(msg) => {
            let msg = msg.to_lowercase();
            RETRYABLE_PATTERNS.iter().any(|p| msg.contains(p))
        }
        PilotError::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Compute the backoff delay for a given attempt (without sleeping).
///
/// Delay formula: `min(base_delay_ms * 2^attempt + jitter, max_delay_ms)`
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    exponential.saturating_add(jitter_ms).min(max_delay_ms)
}

/// Backoff delay with jitter taken from the sub-second clock.
fn delay_with_jitter(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let jitter_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % (base_delay_ms.max(1)))
        .unwrap_or(0);
    Duration::from_millis(compute_delay(attempt, base_delay_ms, max_delay_ms, jitter_ms))
}

/// Wait for `fut` unless `cancel` fires first.
async fn cancellable<F, T>(cancel: Option<&CancellationToken>, fut: F) -> Result<T>
where
    F: std::future::Future<Output = T>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(PilotError::Cancelled),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}

#[async_trait]
impl LLMProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let cancel = options.cancel.clone();
        let mut attempt = 0;

        loop {
            let result = cancellable(
                cancel.as_ref(),
                self.attempt(messages.clone(), tools.clone(), model, options.clone()),
            )
            .await?;

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            if !is_retryable(&err) || attempt >= self.max_retries {
                return Err(err);
            }

            attempt += 1;
            warn!(
                provider = self.inner.name(),
                attempt,
                max_retries = self.max_retries,
                error = %err,
                "Retrying chat request after transient error"
            );
            let delay = delay_with_jitter(attempt - 1, self.base_delay_ms, self.max_delay_ms);
            cancellable(cancel.as_ref(), tokio::time::sleep(delay)).await?;
        }
    }
}
