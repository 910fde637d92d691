//! Canonical types for LLM requests and responses.
//!
//! Every provider adapter translates its wire format into these types, so
//! callers never depend on a particular vendor's JSON shapes.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Finish Reason
// ─────────────────────────────────────────────────────────────────────────────

/// Canonical reason a provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model concluded naturally.
    Stop,
    /// The max-token limit was reached.
    Length,
    /// The model requested tool execution.
    ToolCalls,
    /// The provider's content filter intervened.
    ContentFilter,
    /// The provider's reason string was absent or unrecognized.
    Unknown,
}

impl FinishReason {
    /// Returns true if this reason ends a conversation without further
    /// round trips. `ToolCalls` expects another turn and `Unknown` must
    /// never be treated as terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop | Self::Length | Self::ContentFilter)
    }

    /// Convert `Unknown` to "no finish reason" for downstream consumers.
    pub fn into_known(self) -> Option<FinishReason> {
        match self {
            Self::Unknown => None,
            known => Some(known),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Calls and Results
// ─────────────────────────────────────────────────────────────────────────────

/// A provider-requested invocation of a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments as JSON.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// The executed outcome of a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The originating call identifier.
    pub tool_call_id: String,
    /// Name of the tool that ran.
    pub name: String,
    /// Textual result (or captured failure text).
    pub result: String,
}

impl ToolResult {
    /// Create a new tool result.
    pub fn new(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            result: result.into(),
        }
    }
}

/// A tool made available to the model on a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// A role-tagged message in a conversation.
///
/// Messages are immutable once constructed; a conversation is an ordered,
/// append-only `Vec<Message>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A system instruction.
    System {
        /// The instruction text.
        content: String,
    },
    /// A user message.
    User {
        /// The message text.
        content: String,
    },
    /// An assistant message, possibly carrying requested tool calls.
    Assistant {
        /// The response text.
        content: String,
        /// Tool calls the assistant issued with this message.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Results of tool calls issued by the immediately preceding
    /// assistant message.
    ToolResult {
        /// The results, in the order the calls were issued.
        results: Vec<ToolResult>,
    },
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a plain assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    /// Create a tool-result message.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self::ToolResult { results }
    }

    /// The wire role tag for this message.
    ///
    /// Tool results are tagged `assistant` so providers that only accept
    /// `{role, content}` pairs see them as part of the assistant turn.
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolResult { .. } => "assistant",
        }
    }

    /// The rendered content of this message.
    ///
    /// Tool results render as `"Name: <name>\nResult: <result>"` blocks
    /// joined by blank lines.
    pub fn content(&self) -> String {
        match self {
            Self::System { content } | Self::User { content } => content.clone(),
            Self::Assistant { content, .. } => content.clone(),
            Self::ToolResult { results } => results
                .iter()
                .map(|r| format!("Name: {}\nResult: {}", r.name, r.result))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// The tool calls carried by this message, if any.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Usage and Meta
// ─────────────────────────────────────────────────────────────────────────────

/// Token usage reported by a provider.
///
/// `None` means "not reported by the provider", not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt token count.
    pub prompt_tokens: Option<u32>,
    /// Completion token count.
    pub completion_tokens: Option<u32>,
}

impl Usage {
    /// Create a usage record with both counts present.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
        }
    }

    /// Sum usage across steps: absent counts contribute zero, and a field
    /// stays absent only if no step reported it.
    pub fn aggregate<'a>(usages: impl IntoIterator<Item = &'a Usage>) -> Usage {
        let mut prompt: Option<u32> = None;
        let mut completion: Option<u32> = None;
        for usage in usages {
            if let Some(n) = usage.prompt_tokens {
                prompt = Some(prompt.unwrap_or(0).saturating_add(n));
            }
            if let Some(n) = usage.completion_tokens {
                completion = Some(completion.unwrap_or(0).saturating_add(n));
            }
        }
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
        }
    }
}

/// A provider rate-limit record, typically parsed from response headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Which limit this record describes (e.g. "requests", "tokens").
    pub name: String,
    /// The limit ceiling, if reported.
    pub limit: Option<u32>,
    /// How much of the limit remains, if reported.
    pub remaining: Option<u32>,
}

/// Provider-assigned response metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Provider response id.
    pub id: String,
    /// Model name actually used.
    pub model: String,
    /// Rate-limit records, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_limits: Vec<RateLimit>,
}

impl Meta {
    /// Create response metadata without rate-limit records.
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            rate_limits: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Chunk
// ─────────────────────────────────────────────────────────────────────────────

/// One incremental unit of streamed model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The text delta, possibly empty.
    pub text: String,
    /// Finish reason, present only on the final content chunk.
    pub finish_reason: Option<FinishReason>,
    /// Response metadata as of this chunk.
    pub meta: Meta,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// A canonical request to an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// The model to use.
    pub model: String,
    /// The conversation so far.
    pub messages: Vec<Message>,
    /// System prompts in effect, sent ahead of the conversation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_prompts: Vec<String>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-p sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Tools available to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl Request {
    /// Create a new request with the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system_prompts: Vec::new(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            tools: Vec::new(),
        }
    }

    /// Add a system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompts.push(prompt.into());
        self
    }

    /// Set the max-token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the top-p sampling parameter.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Make tools available to the model.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Append a message to the conversation.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Step and Response
// ─────────────────────────────────────────────────────────────────────────────

/// One complete provider round trip.
///
/// Steps are immutable once added to a [`crate::ResponseBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Output text of this round trip.
    pub text: String,
    /// Why the provider stopped.
    pub finish_reason: FinishReason,
    /// Tool calls requested by this step.
    pub tool_calls: Vec<ToolCall>,
    /// Executed tool results, empty until the orchestrator runs them.
    pub tool_results: Vec<ToolResult>,
    /// Token usage for this round trip.
    pub usage: Usage,
    /// Provider metadata.
    pub meta: Meta,
    /// The full conversation as of this step.
    pub messages: Vec<Message>,
    /// System prompts in effect.
    pub system_prompts: Vec<String>,
}

impl Step {
    /// Returns true if this step requested tool execution.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The final aggregated result of one top-level call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// All round trips, in order.
    pub steps: Vec<Step>,
    /// The final step's output text.
    pub text: String,
    /// The conversation's final assistant message.
    pub final_message: Option<Message>,
    /// Usage summed across steps.
    pub usage: Usage,
    /// True when the orchestration loop was cut short by the step cap
    /// rather than concluding naturally.
    pub step_limit_reached: bool,
}

impl Response {
    /// The last step, if any.
    pub fn final_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// The finish reason of the last step, if any.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.final_step().map(|s| s.finish_reason)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embeddings
// ─────────────────────────────────────────────────────────────────────────────

/// A request for vector embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsRequest {
    /// The embedding model to use.
    pub model: String,
    /// The inputs to embed.
    pub inputs: Vec<String>,
}

impl EmbeddingsRequest {
    /// Create a new embeddings request.
    pub fn new(model: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            model: model.into(),
            inputs,
        }
    }
}

/// Vector embeddings returned by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsResponse {
    /// One vector per input, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Token usage, if reported.
    pub usage: Usage,
    /// Provider metadata.
    pub meta: Meta,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_terminal() {
        assert!(FinishReason::Stop.is_terminal());
        assert!(FinishReason::Length.is_terminal());
        assert!(FinishReason::ContentFilter.is_terminal());
        assert!(!FinishReason::ToolCalls.is_terminal());
        assert!(!FinishReason::Unknown.is_terminal());
    }

    #[test]
    fn test_finish_reason_into_known() {
        assert_eq!(FinishReason::Stop.into_known(), Some(FinishReason::Stop));
        assert_eq!(FinishReason::Unknown.into_known(), None);
    }

    #[test]
    fn test_message_roles() {
        assert_eq!(Message::system("s").role(), "system");
        assert_eq!(Message::user("u").role(), "user");
        assert_eq!(Message::assistant("a").role(), "assistant");
        assert_eq!(Message::tool_results(vec![]).role(), "assistant");
    }

    #[test]
    fn test_tool_result_message_content() {
        let message = Message::tool_results(vec![ToolResult::new("call_1", "lookup", "42")]);
        assert_eq!(message.content(), "Name: lookup\nResult: 42");
    }

    #[test]
    fn test_tool_result_message_content_joined_by_blank_lines() {
        let message = Message::tool_results(vec![
            ToolResult::new("call_1", "lookup", "42"),
            ToolResult::new("call_2", "search", "found"),
        ]);
        assert_eq!(
            message.content(),
            "Name: lookup\nResult: 42\n\nName: search\nResult: found"
        );
    }

    #[test]
    fn test_assistant_message_tool_calls() {
        let call = ToolCall::new("call_1", "lookup", serde_json::json!({"q": "x"}));
        let message = Message::assistant_with_tool_calls("checking", vec![call.clone()]);
        assert_eq!(message.tool_calls(), &[call]);
        assert_eq!(message.content(), "checking");
        assert!(Message::user("hi").tool_calls().is_empty());
    }

    #[test]
    fn test_usage_aggregate() {
        let usages = [Usage::new(10, 5), Usage::new(20, 15)];
        let total = Usage::aggregate(&usages);
        assert_eq!(total.prompt_tokens, Some(30));
        assert_eq!(total.completion_tokens, Some(20));
    }

    #[test]
    fn test_usage_aggregate_preserves_absence() {
        // A provider that never reports usage yields an absent total, not zero.
        let unreported = [Usage::default(), Usage::default()];
        let total = Usage::aggregate(&unreported);
        assert_eq!(total.prompt_tokens, None);
        assert_eq!(total.completion_tokens, None);

        // A single reporting step is enough to make the total present.
        let mixed = [
            Usage::default(),
            Usage {
                prompt_tokens: Some(7),
                completion_tokens: None,
            },
        ];
        let total = Usage::aggregate(&mixed);
        assert_eq!(total.prompt_tokens, Some(7));
        assert_eq!(total.completion_tokens, None);
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new("gpt-4o", vec![Message::user("hi")])
            .with_system_prompt("be brief")
            .with_max_tokens(256)
            .with_temperature(0.2)
            .with_top_p(0.9);

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.system_prompts, vec!["be brief".to_string()]);
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.top_p, Some(0.9));
    }

    #[test]
    fn test_request_add_message_preserves_order() {
        let mut request = Request::new("m", vec![Message::user("one")]);
        request.add_message(Message::assistant("two"));
        request.add_message(Message::user("three"));

        let contents: Vec<String> = request.messages.iter().map(|m| m.content()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }
}
