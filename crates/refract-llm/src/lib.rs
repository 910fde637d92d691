//! Vendor-agnostic LLM client layer.
//!
//! Callers build a canonical [`Request`], hand it to any [`Provider`]
//! adapter, and get back canonical [`Step`]s, [`Chunk`] streams, and
//! [`Response`]s. Adapters own all wire-format knowledge; swapping vendors
//! never changes calling code.
//!
//! # Example
//!
//! ```no_run
//! use refract_llm::{Message, OpenRouterConfig, OpenRouterProvider, Provider, Request};
//!
//! # async fn run() -> refract_llm::Result<()> {
//! let provider = OpenRouterProvider::new(OpenRouterConfig::new("sk-or-..."))?;
//! let request = Request::new("openai/gpt-4o", vec![Message::user("Hello!")])
//!     .with_max_tokens(256);
//! let response = provider.text(&request).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```
//!
//! Streaming callers consume [`Chunk`]s directly and, when they want a
//! completed [`Step`] afterwards, fold the chunks with [`StepBuilder`]:
//!
//! ```no_run
//! use futures::StreamExt;
//! use refract_llm::{
//!     Message, OpenRouterConfig, OpenRouterProvider, Provider, Request, StepBuilder, Usage,
//! };
//!
//! # async fn run() -> refract_llm::Result<()> {
//! let provider = OpenRouterProvider::new(OpenRouterConfig::new("sk-or-..."))?;
//! let request = Request::new("openai/gpt-4o", vec![Message::user("Hello!")]);
//!
//! let mut stream = provider.stream(&request).await?;
//! let mut builder = StepBuilder::new();
//! while let Some(chunk) = stream.next().await {
//!     let chunk = chunk?;
//!     print!("{}", chunk.text);
//!     builder.push_chunk(&chunk);
//! }
//! let step = builder.build(Usage::default(), Vec::new(), request.messages.clone(), Vec::new());
//! println!("\nfinished: {:?}", step.finish_reason);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod openrouter;
pub mod provider;
pub mod stream;
pub mod types;

pub use builder::{ResponseBuilder, StepBuilder};
pub use error::{BoxError, Capability, Error, RateLimitCause, Result};
pub use openrouter::{OpenRouterConfig, OpenRouterProvider};
pub use provider::{with_retry, Provider, RetryConfig, SharedProvider};
pub use stream::{sse_chunk_stream, ChunkStream};
pub use types::{
    Chunk, EmbeddingsRequest, EmbeddingsResponse, FinishReason, Message, Meta, RateLimit, Request,
    Response, Step, ToolCall, ToolDefinition, ToolResult, Usage,
};

#[cfg(any(test, feature = "testing"))]
pub use provider::MockProvider;
