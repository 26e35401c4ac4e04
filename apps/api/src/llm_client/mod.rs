/// LLM client: the single point of entry for all generative-model calls.
///
/// ARCHITECTURAL RULE: stage handlers never talk to a provider adapter directly.
/// Every call goes through `LlmClient` so timeouts, retries and the model
/// fallback are applied uniformly.
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

pub mod gemini;
pub mod json;
pub mod prompts;
pub mod provider;
pub mod retry;
#[cfg(test)]
pub mod testing;
pub mod timeout;

use provider::{ChunkStream, GenerateOptions, Generation, GenerativeProvider};
use retry::{next_action, RetryAction, RetryPolicy, RetryState};
use timeout::{call_with_timeout, TimeoutError};

/// Overall deadline for single-shot calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);
/// Deadline for the provider to hand back a stream.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(100);
/// Maximum silence between two chunks of an open stream.
pub const STREAM_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(20);
/// Pause before retrying the same model.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Timed out: {0}")]
    Timeout(#[from] TimeoutError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Whether another attempt could plausibly succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Recoverable,
    Fatal,
}

impl LlmError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LlmError::Timeout(_) | LlmError::Transport(_) => ErrorCategory::Recoverable,
            LlmError::Api { status, .. } if matches!(status, 500 | 503) => {
                ErrorCategory::Recoverable
            }
            LlmError::Http(e) if !e.is_decode() && !e.is_builder() => ErrorCategory::Recoverable,
            _ => ErrorCategory::Fatal,
        }
    }
}

/// Model names and deadlines shared by every stage.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub default_model: String,
    pub fallback_model: String,
    pub request_timeout: Duration,
    pub stream_timeout: Duration,
    pub inactivity_timeout: Duration,
    pub retry_backoff: Duration,
}

impl LlmSettings {
    pub fn new(default_model: impl Into<String>, fallback_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            fallback_model: fallback_model.into(),
            request_timeout: DEFAULT_TIMEOUT,
            stream_timeout: STREAM_TIMEOUT,
            inactivity_timeout: STREAM_INACTIVITY_TIMEOUT,
            retry_backoff: RETRY_BACKOFF,
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn GenerativeProvider>,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn GenerativeProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    pub fn default_model(&self) -> &str {
        &self.settings.default_model
    }

    /// Single-shot call bounded by the default request timeout. No retries.
    pub async fn generate_once(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
        task_label: &str,
    ) -> Result<Generation, LlmError> {
        let started = Instant::now();
        let result = call_with_timeout(
            self.provider.generate_once(model, prompt, options),
            self.settings.request_timeout,
            &format!("{task_label} Timeout"),
        )
        .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(task = task_label, model, elapsed_ms, "single-shot call succeeded"),
            Err(e) => warn!(task = task_label, model, elapsed_ms, error = %e, "single-shot call failed"),
        }
        result
    }

    /// Streams a generation with connection and inactivity deadlines, retrying
    /// once on the same model and once on the fallback model for recoverable
    /// failures.
    ///
    /// `stream_timeout` overrides the connection deadline for this call only.
    pub async fn generate_with_smart_retry(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
        stream_timeout: Option<Duration>,
        task_label: &str,
    ) -> Result<Generation, LlmError> {
        let connect_timeout = stream_timeout.unwrap_or(self.settings.stream_timeout);
        let policy = RetryPolicy {
            fallback_model: self.settings.fallback_model.clone(),
            backoff: self.settings.retry_backoff,
        };
        let mut state = RetryState::new(model);

        loop {
            let started = Instant::now();
            let result = self
                .stream_attempt(&state.current_model, prompt, options, connect_timeout)
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let error = match result {
                Ok(generation) => {
                    info!(
                        task = task_label,
                        model = %state.current_model,
                        attempt = state.attempt,
                        elapsed_ms,
                        chars = generation.text.chars().count(),
                        "streamed generation succeeded"
                    );
                    return Ok(generation);
                }
                Err(e) => e,
            };

            let category = error.category();
            warn!(
                task = task_label,
                model = %state.current_model,
                attempt = state.attempt,
                elapsed_ms,
                ?category,
                error = %error,
                "streamed generation failed"
            );

            let action = next_action(&policy, &state, category);
            match &action {
                RetryAction::RetrySameModel { backoff } => {
                    info!(task = task_label, model = %state.current_model, "retrying same model after {}ms", backoff.as_millis());
                    tokio::time::sleep(*backoff).await;
                }
                RetryAction::SwitchModel(next) => {
                    info!(task = task_label, from = %state.current_model, to = %next, "switching to fallback model");
                }
                RetryAction::GiveUp => return Err(error),
            }
            state.advance(&action, category);
        }
    }

    async fn stream_attempt(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerateOptions,
        connect_timeout: Duration,
    ) -> Result<Generation, LlmError> {
        let mut stream: ChunkStream = call_with_timeout(
            self.provider.generate_stream(model, prompt, options),
            connect_timeout,
            &format!("STREAM_TIMEOUT: no stream from {model} within {}ms", connect_timeout.as_millis()),
        )
        .await?;

        let inactivity = self.settings.inactivity_timeout;
        let stall_message = format!("STREAM_TIMEOUT: {model} stalled for {}ms mid-stream", inactivity.as_millis());

        let mut generation = Generation::default();
        loop {
            // The deadline restarts for every chunk.
            let next = call_with_timeout(
                async { Ok::<_, LlmError>(stream.next().await) },
                inactivity,
                &stall_message,
            )
            .await?;

            match next {
                None => break,
                Some(Err(e)) => return Err(e),
                Some(Ok(chunk)) => {
                    generation.text.push_str(&chunk.text);
                    if chunk.grounding.is_some() {
                        generation.grounding = chunk.grounding;
                    }
                }
            }
        }

        Ok(generation)
    }
}
