//! Error types for the LLM crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error cause carried by provider-request failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// Provider operations that adapters may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Non-streaming text generation.
    Text,
    /// Streaming text generation.
    Stream,
    /// Schema-constrained output.
    Structured,
    /// Vector embeddings.
    Embeddings,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Stream => "stream",
            Self::Structured => "structured output",
            Self::Embeddings => "embeddings",
        };
        write!(f, "{}", name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limit Cause
// ─────────────────────────────────────────────────────────────────────────────

/// Details of a rate-limit (HTTP 429) condition.
#[derive(Debug, Clone)]
pub struct RateLimitCause {
    /// The error message from the provider.
    pub message: String,
    /// How long to wait before retrying, if the provider specified.
    pub retry_after: Option<Duration>,
}

impl RateLimitCause {
    /// Create a rate-limit cause with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Create a rate-limit cause with retry timing.
    pub fn with_retry_after(message: impl Into<String>, retry_after: Duration) -> Self {
        Self {
            message: message.into(),
            retry_after: Some(retry_after),
        }
    }

    /// Parse a `Retry-After` header value in seconds.
    pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
        value.trim().parse::<u64>().ok().map(Duration::from_secs)
    }
}

impl std::fmt::Display for RateLimitCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {:.2}s)", retry_after.as_secs_f64())?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for LLM operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-layer failure of a provider round trip. Rate-limit (429)
    /// conditions carry a [`RateLimitCause`] so callers can apply backoff.
    #[error("provider request failed for model '{model}': {source}")]
    ProviderRequest {
        /// The model the request targeted.
        model: String,
        /// The underlying transport cause.
        #[source]
        source: BoxError,
        /// Present when the provider rate-limited the request.
        rate_limit: Option<RateLimitCause>,
    },

    /// Malformed streaming payload. Fatal to that stream iteration and
    /// never retried internally.
    #[error("failed to decode stream chunk from {provider}: {source}")]
    ChunkDecode {
        /// The provider that produced the malformed payload.
        provider: String,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// An operation the provider adapter does not implement.
    #[error("provider '{provider}' does not support {capability}")]
    UnsupportedCapability {
        /// The adapter's provider name.
        provider: String,
        /// The unsupported operation.
        capability: Capability,
    },

    /// Configuration error (API key missing, bad base URL, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a transport failure as a provider-request error.
    pub fn provider_request(model: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::ProviderRequest {
            model: model.into(),
            source: source.into(),
            rate_limit: None,
        }
    }

    /// Create a provider-request error for a rate-limited (429) response.
    pub fn rate_limited(model: impl Into<String>, cause: RateLimitCause) -> Self {
        Self::ProviderRequest {
            model: model.into(),
            source: format!("rate limit exceeded: {}", cause).into(),
            rate_limit: Some(cause),
        }
    }

    /// Create a chunk-decode error naming the offending provider.
    pub fn chunk_decode(provider: impl Into<String>, source: serde_json::Error) -> Self {
        Self::ChunkDecode {
            provider: provider.into(),
            source,
        }
    }

    /// Create an unsupported-capability error.
    pub fn unsupported(provider: impl Into<String>, capability: Capability) -> Self {
        Self::UnsupportedCapability {
            provider: provider.into(),
            capability,
        }
    }

    /// Returns true if this error signaled a rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::ProviderRequest {
                rate_limit: Some(_),
                ..
            }
        )
    }

    /// Get the retry-after duration if the provider reported one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ProviderRequest {
                rate_limit: Some(cause),
                ..
            } => cause.retry_after,
            _ => None,
        }
    }

    /// Returns true if this error is worth retrying at the transport layer.
    ///
    /// Only transport failures qualify; decode, capability, and config
    /// errors will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderRequest { .. })
    }
}
