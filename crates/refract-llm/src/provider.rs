//! The provider abstraction and retry policy.
//!
//! A [`Provider`] is one vendor adapter. Capabilities default to an
//! unsupported-capability error, so an adapter implements only what its
//! vendor actually offers and callers get a uniform error for the rest.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Capability, Error, Result};
use crate::stream::ChunkStream;
use crate::types::{EmbeddingsRequest, EmbeddingsResponse, Request, Response};

/// Trait for LLM provider adapters.
///
/// One non-streaming round trip produces a single-step [`Response`];
/// multi-step behavior lives above this trait. Implementations must be
/// cheap to share behind an [`Arc`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name, used in errors and logs.
    fn name(&self) -> &str;

    /// One non-streaming text round trip, producing exactly one step.
    async fn text(&self, _request: &Request) -> Result<Response> {
        Err(Error::unsupported(self.name(), Capability::Text))
    }

    /// One streaming text round trip.
    async fn stream(&self, _request: &Request) -> Result<ChunkStream> {
        Err(Error::unsupported(self.name(), Capability::Stream))
    }

    /// One schema-constrained round trip, producing exactly one step.
    async fn structured(&self, _request: &Request, _schema: &serde_json::Value) -> Result<Response> {
        Err(Error::unsupported(self.name(), Capability::Structured))
    }

    /// Embed a batch of inputs.
    async fn embeddings(&self, _request: &EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Err(Error::unsupported(self.name(), Capability::Embeddings))
    }
}

/// Shared handle to a provider adapter.
pub type SharedProvider = Arc<dyn Provider>;

// ─────────────────────────────────────────────────────────────────────────────
// Retry
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential-backoff policy for transport-level failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Delay growth factor per retry.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `operation` with retries for transport failures.
///
/// Only errors that [`Error::is_retryable`] reports as retryable are
/// retried; decode, capability, and config errors return immediately.
/// Rate-limited errors that carry a provider `Retry-After` hint use that
/// hint in place of the computed backoff delay.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < config.max_retries => {
                let delay = err.retry_after().unwrap_or_else(|| config.delay_for_attempt(attempt));
                attempt += 1;
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Provider
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockProvider;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use super::*;
    use crate::builder::ResponseBuilder;
    use crate::types::{Chunk, FinishReason, Message, Meta, Step, ToolCall, Usage};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum MockTurn {
        Text(String),
        ToolCalls { text: String, calls: Vec<ToolCall> },
        Error(Error),
    }

    /// Scripted provider double for tests.
    ///
    /// Turns are consumed in push order across both `text` and `stream`;
    /// an exhausted script fails loudly. Every step it produces reports
    /// `Usage::new(10, 5)`.
    pub struct MockProvider {
        name: String,
        script: Mutex<VecDeque<MockTurn>>,
        requests: Mutex<Vec<Request>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                name: "mock".to_string(),
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Script a plain text turn that finishes with `Stop`.
        pub fn push_text(&self, text: impl Into<String>) {
            self.script
                .lock()
                .unwrap()
                .push_back(MockTurn::Text(text.into()));
        }

        /// Script a turn that requests tool execution.
        pub fn push_tool_calls(&self, text: impl Into<String>, calls: Vec<ToolCall>) {
            self.script.lock().unwrap().push_back(MockTurn::ToolCalls {
                text: text.into(),
                calls,
            });
        }

        /// Script a failing turn.
        pub fn push_error(&self, err: Error) {
            self.script.lock().unwrap().push_back(MockTurn::Error(err));
        }

        /// All requests received so far, in order.
        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        fn next_turn(&self, request: &Request) -> Result<MockTurn> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Config("mock provider script exhausted".to_string()))
        }

        fn scripted_step(&self, request: &Request) -> Result<Step> {
            match self.next_turn(request)? {
                MockTurn::Text(text) => Ok(self.make_step(request, text, Vec::new())),
                MockTurn::ToolCalls { text, calls } => Ok(self.make_step(request, text, calls)),
                MockTurn::Error(err) => Err(err),
            }
        }

        fn make_step(&self, request: &Request, text: String, calls: Vec<ToolCall>) -> Step {
            let finish_reason = if calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            };
            let mut messages = request.messages.clone();
            messages.push(if calls.is_empty() {
                Message::assistant(text.clone())
            } else {
                Message::assistant_with_tool_calls(text.clone(), calls.clone())
            });
            Step {
                text,
                finish_reason,
                tool_calls: calls,
                tool_results: Vec::new(),
                usage: Usage::new(10, 5),
                meta: Meta::new("mock_resp", &request.model),
                messages,
                system_prompts: request.system_prompts.clone(),
            }
        }
    }

    impl Default for MockProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn text(&self, request: &Request) -> Result<Response> {
            let step = self.scripted_step(request)?;
            Ok(ResponseBuilder::single_step(step))
        }

        async fn stream(&self, request: &Request) -> Result<ChunkStream> {
            let step = self.scripted_step(request)?;
            let meta = step.meta.clone();
            let chunks = vec![
                Ok(Chunk {
                    text: step.text,
                    finish_reason: None,
                    meta: meta.clone(),
                }),
                Ok(Chunk {
                    text: String::new(),
                    finish_reason: Some(step.finish_reason),
                    meta,
                }),
            ];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct BareProvider;

    #[async_trait]
    impl Provider for BareProvider {
        fn name(&self) -> &str {
            "bare"
        }
    }

    fn request() -> Request {
        Request::new("test-model", vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn test_default_capabilities_are_unsupported() {
        let provider = BareProvider;

        let err = provider.text(&request()).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedCapability { .. }));
        assert!(err.to_string().contains("bare"));

        // `unwrap_err` would need the stream type to implement Debug.
        let err = provider.stream(&request()).await.err().unwrap();
        assert!(err.to_string().contains("stream"));

        let err = provider
            .embeddings(&EmbeddingsRequest::new("e", vec!["x".to_string()]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("embeddings"));
    }

    #[tokio::test]
    async fn test_mock_provider_consumes_script_in_order() {
        let provider = MockProvider::new();
        provider.push_text("first");
        provider.push_text("second");

        let response = provider.text(&request()).await.unwrap();
        assert_eq!(response.text, "first");
        assert_eq!(response.steps.len(), 1);
        let step = response.final_step().unwrap();
        assert_eq!(step.finish_reason, crate::types::FinishReason::Stop);
        // The assistant reply is appended to the conversation.
        assert_eq!(step.messages.len(), 2);

        let response = provider.text(&request()).await.unwrap();
        assert_eq!(response.text, "second");

        assert!(provider.text(&request()).await.is_err());
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_streams_scripted_turn() {
        let provider = MockProvider::new();
        provider.push_text("streamed");

        let chunks: Vec<_> = provider.stream(&request()).await.unwrap().collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().text, "streamed");
        assert_eq!(
            chunks[1].as_ref().unwrap().finish_reason,
            Some(crate::types::FinishReason::Stop)
        );
    }

    #[tokio::test]
    async fn test_streamed_text_matches_non_streaming_text() {
        let provider = MockProvider::new();
        provider.push_text("the same answer");
        provider.push_text("the same answer");

        let response = provider.text(&request()).await.unwrap();

        let mut streamed = String::new();
        let mut stream = provider.stream(&request()).await.unwrap();
        while let Some(chunk) = stream.next().await {
            streamed.push_str(&chunk.unwrap().text);
        }

        assert_eq!(streamed, response.text);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_failures() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        };

        let result = with_retry(&config, "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::provider_request("m", "timeout"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        };

        let result: Result<()> = with_retry(&config, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::provider_request("m", "timeout")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_decode_errors() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_retry(&RetryConfig::default(), "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                let cause = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
                Err(Error::chunk_decode("openrouter", cause))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_growth_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(4));
    }
}
