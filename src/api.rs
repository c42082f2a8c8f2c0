//! Completion service access with exponential backoff retry logic.
//!
//! This module provides the interface the sponsor extractor uses to talk to an
//! OpenAI-compatible chat completion API. It includes automatic retry logic
//! with exponential backoff and jitter to handle transient failures.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`AskAsync`]: Core trait defining async prompt -> reply interaction
//! - [`OpenAiCompletion`]: `reqwest` client for `/chat/completions`
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Configurable number of retries (0 disables retrying)
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use crate::error::{Result, ScrapeError};
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Trait for async completion-service interaction.
///
/// Implementors take a prompt and return the model's free-text reply. The
/// crawl and extractor are generic over this trait so tests can substitute
/// canned replies.
pub trait AskAsync {
    /// The type of response returned by the service.
    type Response;

    /// Send `text` as the prompt and receive the reply.
    async fn ask(&self, text: &str) -> Result<Self::Response>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Maximum number of retries after the first attempt.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = OpenAiCompletion::new(settings)?;
    /// let retry_client = RetryAsk::new(client, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> StdDuration {
        // 2^31 * any sane base is already far past max_delay
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Connection settings for [`OpenAiCompletion`].
///
/// The API key is handed in by the caller; nothing below this point reads
/// the process environment.
#[derive(Clone)]
pub struct CompletionSettings {
    pub api_key: String,
    /// Base URL without the trailing `/chat/completions`.
    pub api_base: String,
    pub model: String,
    /// Per-request timeout for the HTTP call.
    pub timeout: StdDuration,
}

impl fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// The prompt is sent as a single user message and the first choice's
/// content is returned verbatim.
#[derive(Debug)]
pub struct OpenAiCompletion {
    http: reqwest::Client,
    settings: CompletionSettings,
}

impl OpenAiCompletion {
    pub fn new(settings: CompletionSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(ScrapeError::Config(
                "completion service API key is empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ScrapeError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        )
    }
}

impl AskAsync for OpenAiCompletion {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.settings.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: text,
            }],
            temperature: 0.0,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %e,
                    "API call failed"
                );
                ScrapeError::CompletionService(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                %status,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "API returned an error status"
            );
            return Err(ScrapeError::CompletionService(format!(
                "HTTP {status}: {}",
                crate::utils::truncate_for_log(&body, 300)
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| {
                ScrapeError::CompletionService(format!("unreadable response body: {e}"))
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                ScrapeError::CompletionService("response had no content".to_string())
            })?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.len(),
            "Completion received"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails a fixed number of times, then answers.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ScrapeError::CompletionService("rate limited".to_string()))
            } else {
                Ok(format!("echo: {text}"))
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        let api = RetryAsk::new(
            Flaky {
                failures: 2,
                calls: AtomicUsize::new(0),
            },
            3,
            StdDuration::from_millis(10),
        );
        let reply = api.ask("hello").await.unwrap();
        assert_eq!(reply, "echo: hello");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let api = RetryAsk::new(
            Flaky {
                failures: usize::MAX,
                calls: AtomicUsize::new(0),
            },
            2,
            StdDuration::from_millis(10),
        );
        let err = api.ask("hello").await.unwrap_err();
        assert!(matches!(err, ScrapeError::CompletionService(_)));
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_a_single_attempt() {
        let api = RetryAsk::new(
            Flaky {
                failures: 1,
                calls: AtomicUsize::new(0),
            },
            0,
            StdDuration::from_millis(10),
        );
        assert!(api.ask("hello").await.is_err());
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let api = RetryAsk::new(
            Flaky {
                failures: 0,
                calls: AtomicUsize::new(0),
            },
            100,
            StdDuration::from_secs(1),
        );
        assert_eq!(api.backoff(1), StdDuration::from_secs(1));
        assert_eq!(api.backoff(3), StdDuration::from_secs(4));
        assert_eq!(api.backoff(6), StdDuration::from_secs(30));
        // Far past the width of a u32 shift.
        assert_eq!(api.backoff(40), StdDuration::from_secs(30));
        assert_eq!(api.backoff(usize::MAX), StdDuration::from_secs(30));
    }

    #[tokio::test]
    async fn test_many_retries_against_a_dead_service_do_not_overflow() {
        let mut api = RetryAsk::new(
            Flaky {
                failures: usize::MAX,
                calls: AtomicUsize::new(0),
            },
            40,
            StdDuration::from_millis(1),
        );
        api.max_delay = StdDuration::from_millis(1);
        assert!(api.ask("hello").await.is_err());
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 41);
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let err = OpenAiCompletion::new(CompletionSettings {
            api_key: "  ".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: StdDuration::from_secs(5),
        })
        .unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiCompletion::new(CompletionSettings {
            api_key: "sk-test".to_string(),
            api_base: "http://localhost:11434/v1/".to_string(),
            model: "qwen".to_string(),
            timeout: StdDuration::from_secs(5),
        })
        .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_settings_debug_redacts_key() {
        let settings = CompletionSettings {
            api_key: "sk-secret".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: StdDuration::from_secs(5),
        };
        let dbg = format!("{settings:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
