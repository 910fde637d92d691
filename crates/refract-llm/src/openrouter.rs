//! OpenRouter provider adapter.
//!
//! Speaks the OpenAI-compatible chat-completions dialect at
//! `https://openrouter.ai/api/v1`, translating between the canonical types
//! and OpenRouter's wire format. Supports text, streaming, structured
//! output, and embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::builder::ResponseBuilder;
use crate::error::{Error, RateLimitCause, Result};
use crate::provider::{with_retry, Provider, RetryConfig};
use crate::stream::{sse_chunk_stream, ChunkStream};
use crate::types::{
    Chunk, EmbeddingsRequest, EmbeddingsResponse, FinishReason, Message, Meta, RateLimit, Request,
    Response, Step, ToolCall, Usage,
};

const PROVIDER_NAME: &str = "openrouter";
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenRouter adapter.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// API key, sent as a bearer token.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// Optional `HTTP-Referer` attribution header.
    pub referrer: Option<String>,
    /// Optional `X-Title` attribution header.
    pub title: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transport retry policy.
    pub retry: RetryConfig,
}

impl OpenRouterConfig {
    /// Create a configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            referrer: None,
            title: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    /// Read the API key from `OPENROUTER_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| Error::Config("OPENROUTER_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Override the base URL (for proxies or compatible gateways).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the `HTTP-Referer` attribution header.
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Set the `X-Title` attribution header.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireToolCallFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCallFunction {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct WireStreamChoice {
    #[serde(default)]
    delta: WireDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingsResponse {
    data: Vec<WireEmbedding>,
    #[serde(default)]
    model: String,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mapping
// ─────────────────────────────────────────────────────────────────────────────

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    }
}

fn wire_messages(request: &Request) -> Vec<WireMessage> {
    let mut wire = Vec::with_capacity(request.system_prompts.len() + request.messages.len());
    for prompt in &request.system_prompts {
        wire.push(WireMessage {
            role: "system",
            content: prompt.clone(),
            tool_calls: None,
        });
    }
    for message in &request.messages {
        let tool_calls = match message {
            Message::Assistant { tool_calls, .. } if !tool_calls.is_empty() => Some(
                tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: WireToolCallFunction {
                            name: c.name.clone(),
                            arguments: c.arguments.to_string(),
                        },
                    })
                    .collect(),
            ),
            _ => None,
        };
        wire.push(WireMessage {
            role: message.role(),
            content: message.content(),
            tool_calls,
        });
    }
    wire
}

fn wire_tools(request: &Request) -> Vec<WireTool> {
    request
        .tools
        .iter()
        .map(|t| WireTool {
            kind: "function".to_string(),
            function: WireToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

fn map_tool_calls(calls: Vec<WireToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .map(|c| {
            // Arguments arrive as a JSON-encoded string; keep the raw text
            // if it does not parse so the caller can still see it.
            let arguments = serde_json::from_str(&c.function.arguments)
                .unwrap_or(serde_json::Value::String(c.function.arguments));
            ToolCall::new(c.id, c.function.name, arguments)
        })
        .collect()
}

fn map_usage(usage: Option<WireUsage>) -> Usage {
    match usage {
        Some(u) => Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        },
        None => Usage::default(),
    }
}

fn parse_stream_chunk(payload: &str) -> Result<Chunk> {
    let parsed: WireStreamChunk =
        serde_json::from_str(payload).map_err(|e| Error::chunk_decode(PROVIDER_NAME, e))?;
    let choice = parsed.choices.into_iter().next().unwrap_or_default();
    Ok(Chunk {
        text: choice.delta.content.unwrap_or_default(),
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map(map_finish_reason)
            .and_then(FinishReason::into_known),
        meta: Meta::new(parsed.id, parsed.model),
    })
}

fn rate_limits(headers: &reqwest::header::HeaderMap) -> Vec<RateLimit> {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
    };
    ["requests", "tokens"]
        .into_iter()
        .filter_map(|name| {
            let limit = read(&format!("x-ratelimit-limit-{name}"));
            let remaining = read(&format!("x-ratelimit-remaining-{name}"));
            (limit.is_some() || remaining.is_some()).then(|| RateLimit {
                name: name.to_string(),
                limit,
                remaining,
            })
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// OpenRouter provider adapter.
pub struct OpenRouterProvider {
    config: OpenRouterConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keep the API key out of debug output.
        f.debug_struct("OpenRouterProvider")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl OpenRouterProvider {
    /// Create an adapter from configuration.
    ///
    /// Fails with a configuration error when the API key is empty.
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("OpenRouter API key is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .bearer_auth(&self.config.api_key);
        if let Some(referrer) = &self.config.referrer {
            builder = builder.header("HTTP-Referer", referrer);
        }
        if let Some(title) = &self.config.title {
            builder = builder.header("X-Title", title);
        }
        builder
    }

    async fn check_status(
        &self,
        model: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(RateLimitCause::parse_retry_after_header);
        let body = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let mut cause = RateLimitCause::new(if body.is_empty() {
                "too many requests".to_string()
            } else {
                body
            });
            cause.retry_after = retry_after;
            return Err(Error::rate_limited(model, cause));
        }
        Err(Error::provider_request(
            model,
            format!("HTTP {status}: {body}"),
        ))
    }

    async fn chat_once(
        &self,
        request: &Request,
        response_format: Option<serde_json::Value>,
    ) -> Result<Step> {
        let body = WireChatRequest {
            model: &request.model,
            messages: wire_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            tools: wire_tools(request),
            stream: false,
            response_format,
        };
        tracing::debug!(model = %request.model, messages = body.messages.len(), "openrouter chat request");

        let response = self
            .post("/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider_request(&request.model, e))?;
        let response = self.check_status(&request.model, response).await?;
        let limits = rate_limits(response.headers());

        let parsed: WireChatResponse = response
            .json()
            .await
            .map_err(|e| Error::provider_request(&request.model, e))?;
        let usage = map_usage(parsed.usage);
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider_request(&request.model, "response had no choices"))?;

        let text = choice.message.content.unwrap_or_default();
        let tool_calls = map_tool_calls(choice.message.tool_calls);
        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(map_finish_reason)
            .unwrap_or(FinishReason::Unknown);

        let mut messages = request.messages.clone();
        messages.push(if tool_calls.is_empty() {
            Message::assistant(text.clone())
        } else {
            Message::assistant_with_tool_calls(text.clone(), tool_calls.clone())
        });

        let mut meta = Meta::new(parsed.id, parsed.model);
        meta.rate_limits = limits;

        Ok(Step {
            text,
            finish_reason,
            tool_calls,
            tool_results: Vec::new(),
            usage,
            meta,
            messages,
            system_prompts: request.system_prompts.clone(),
        })
    }

    async fn open_stream(&self, request: &Request) -> Result<ChunkStream> {
        let body = WireChatRequest {
            model: &request.model,
            messages: wire_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            tools: wire_tools(request),
            stream: true,
            response_format: None,
        };
        tracing::debug!(model = %request.model, "openrouter stream request");

        let response = self
            .post("/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider_request(&request.model, e))?;
        let response = self.check_status(&request.model, response).await?;

        Ok(sse_chunk_stream(
            PROVIDER_NAME,
            request.model.clone(),
            response.bytes_stream(),
            parse_stream_chunk,
        ))
    }

    async fn embeddings_once(&self, request: &EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        #[derive(Serialize)]
        struct WireEmbeddingsRequest<'a> {
            model: &'a str,
            input: &'a [String],
        }

        let response = self
            .post("/embeddings")
            .json(&WireEmbeddingsRequest {
                model: &request.model,
                input: &request.inputs,
            })
            .send()
            .await
            .map_err(|e| Error::provider_request(&request.model, e))?;
        let response = self.check_status(&request.model, response).await?;

        let parsed: WireEmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::provider_request(&request.model, e))?;

        Ok(EmbeddingsResponse {
            embeddings: parsed.data.into_iter().map(|d| d.embedding).collect(),
            usage: map_usage(parsed.usage),
            meta: Meta::new("", parsed.model),
        })
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn text(&self, request: &Request) -> Result<Response> {
        let step = with_retry(&self.config.retry, "openrouter.text", || {
            self.chat_once(request, None)
        })
        .await?;
        Ok(ResponseBuilder::single_step(step))
    }

    async fn stream(&self, request: &Request) -> Result<ChunkStream> {
        // Retries cover connection establishment only; once chunks flow,
        // failures surface through the stream.
        with_retry(&self.config.retry, "openrouter.stream", || {
            self.open_stream(request)
        })
        .await
    }

    async fn structured(&self, request: &Request, schema: &serde_json::Value) -> Result<Response> {
        let response_format = serde_json::json!({
            "type": "json_schema",
            "json_schema": { "name": "output", "schema": schema },
        });
        let step = with_retry(&self.config.retry, "openrouter.structured", || {
            self.chat_once(request, Some(response_format.clone()))
        })
        .await?;
        Ok(ResponseBuilder::single_step(step))
    }

    async fn embeddings(&self, request: &EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        with_retry(&self.config.retry, "openrouter.embeddings", || {
            self.embeddings_once(request)
        })
        .await
    }
}
