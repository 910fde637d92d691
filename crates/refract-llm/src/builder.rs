//! Accumulation of streamed chunks into steps, and steps into a response.
//!
//! [`StepBuilder`] folds a chunk sequence into one [`Step`];
//! [`ResponseBuilder`] collects completed steps and produces the final
//! [`Response`]. Both are append-only, so steps already recorded are never
//! mutated by later activity.

use crate::types::{
    Chunk, FinishReason, Message, Meta, Response, Step, ToolCall, Usage,
};

// ─────────────────────────────────────────────────────────────────────────────
// Step Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Folds streamed [`Chunk`]s into a single [`Step`].
#[derive(Debug, Default)]
pub struct StepBuilder {
    text: String,
    finish_reason: Option<FinishReason>,
    meta: Meta,
}

impl StepBuilder {
    /// Create an empty step builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk into the step under construction.
    ///
    /// Text deltas concatenate in arrival order. The finish reason is
    /// taken from the chunk that carries one, and metadata keeps the most
    /// recent non-empty values.
    pub fn push_chunk(&mut self, chunk: &Chunk) {
        self.text.push_str(&chunk.text);
        if let Some(reason) = chunk.finish_reason {
            self.finish_reason = Some(reason);
        }
        if !chunk.meta.id.is_empty() || !chunk.meta.model.is_empty() {
            self.meta = chunk.meta.clone();
        }
    }

    /// The text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Complete the step with its conversation context.
    ///
    /// `messages` is the conversation as of this step, assistant reply
    /// included. A stream that never reported a finish reason yields
    /// [`FinishReason::Unknown`].
    pub fn build(
        self,
        usage: Usage,
        tool_calls: Vec<ToolCall>,
        messages: Vec<Message>,
        system_prompts: Vec<String>,
    ) -> Step {
        Step {
            text: self.text,
            finish_reason: self.finish_reason.unwrap_or(FinishReason::Unknown),
            tool_calls,
            tool_results: Vec::new(),
            usage,
            meta: self.meta,
            messages,
            system_prompts,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Collects completed [`Step`]s and produces the final [`Response`].
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    steps: Vec<Step>,
    step_limit_reached: bool,
}

impl ResponseBuilder {
    /// Create an empty response builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed step. Steps are immutable once added.
    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// The number of steps recorded so far.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// The most recently recorded step, if any.
    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Record that the orchestration loop was cut short by its step cap.
    pub fn mark_step_limit_reached(&mut self) {
        self.step_limit_reached = true;
    }

    /// Produce the final response.
    ///
    /// The response text is the final step's text, the final message is
    /// the last assistant message of the final step's conversation, and
    /// usage is summed across all steps. Building twice without adding
    /// steps yields identical content.
    pub fn build(&self) -> Response {
        let text = self
            .steps
            .last()
            .map(|s| s.text.clone())
            .unwrap_or_default();
        let final_message = self.steps.last().and_then(|s| {
            s.messages
                .iter()
                .rev()
                .find(|m| matches!(m, Message::Assistant { .. }))
                .cloned()
        });
        let usage = Usage::aggregate(self.steps.iter().map(|s| &s.usage));

        Response {
            steps: self.steps.clone(),
            text,
            final_message,
            usage,
            step_limit_reached: self.step_limit_reached,
        }
    }

    /// A response containing exactly one step, for non-orchestrated calls.
    pub fn single_step(step: Step) -> Response {
        let mut builder = Self::new();
        builder.add_step(step);
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolResult;

    fn chunk(text: &str, finish: Option<FinishReason>) -> Chunk {
        Chunk {
            text: text.to_string(),
            finish_reason: finish,
            meta: Meta::new("resp_1", "test-model"),
        }
    }

    fn step(text: &str, finish: FinishReason, usage: Usage) -> Step {
        Step {
            text: text.to_string(),
            finish_reason: finish,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            usage,
            meta: Meta::new("resp_1", "test-model"),
            messages: vec![Message::user("hi"), Message::assistant(text)],
            system_prompts: Vec::new(),
        }
    }

    #[test]
    fn test_step_builder_concatenates_in_order() {
        let mut builder = StepBuilder::new();
        builder.push_chunk(&chunk("Hel", None));
        builder.push_chunk(&chunk("lo", None));
        builder.push_chunk(&chunk("", Some(FinishReason::Stop)));

        let step = builder.build(Usage::default(), Vec::new(), Vec::new(), Vec::new());
        assert_eq!(step.text, "Hello");
        assert_eq!(step.finish_reason, FinishReason::Stop);
        assert_eq!(step.meta.id, "resp_1");
    }

    #[test]
    fn test_step_builder_without_finish_reason() {
        let mut builder = StepBuilder::new();
        builder.push_chunk(&chunk("partial", None));

        let step = builder.build(Usage::default(), Vec::new(), Vec::new(), Vec::new());
        assert_eq!(step.finish_reason, FinishReason::Unknown);
    }

    #[test]
    fn test_response_builder_takes_final_step_text() {
        let mut builder = ResponseBuilder::new();
        builder.add_step(step("first", FinishReason::ToolCalls, Usage::new(10, 5)));
        builder.add_step(step("second", FinishReason::Stop, Usage::new(20, 15)));

        let response = builder.build();
        assert_eq!(response.steps.len(), 2);
        assert_eq!(response.text, "second");
        assert_eq!(response.finish_reason(), Some(FinishReason::Stop));
        assert!(!response.step_limit_reached);
    }

    #[test]
    fn test_response_builder_aggregates_usage() {
        let mut builder = ResponseBuilder::new();
        builder.add_step(step("a", FinishReason::ToolCalls, Usage::new(10, 5)));
        builder.add_step(step("b", FinishReason::Stop, Usage::new(20, 15)));

        let response = builder.build();
        assert_eq!(response.usage.prompt_tokens, Some(30));
        assert_eq!(response.usage.completion_tokens, Some(20));
    }

    #[test]
    fn test_response_builder_final_message_is_last_assistant() {
        let mut final_step = step("done", FinishReason::Stop, Usage::default());
        final_step.messages.push(Message::tool_results(vec![ToolResult::new(
            "call_1", "lookup", "42",
        )]));
        final_step.messages.push(Message::assistant("done"));

        let mut builder = ResponseBuilder::new();
        builder.add_step(final_step);

        let response = builder.build();
        match response.final_message {
            Some(Message::Assistant { content, .. }) => assert_eq!(content, "done"),
            other => panic!("expected assistant message, got {other:?}"),
        }
    }

    #[test]
    fn test_response_builder_empty() {
        let response = ResponseBuilder::new().build();
        assert!(response.steps.is_empty());
        assert_eq!(response.text, "");
        assert!(response.final_message.is_none());
        assert_eq!(response.usage, Usage::default());
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut builder = ResponseBuilder::new();
        builder.add_step(step("a", FinishReason::ToolCalls, Usage::new(10, 5)));
        builder.add_step(step("b", FinishReason::Stop, Usage::new(20, 15)));

        assert_eq!(builder.build(), builder.build());
    }

    #[test]
    fn test_single_step_response() {
        let response = ResponseBuilder::single_step(step("only", FinishReason::Stop, Usage::new(10, 5)));
        assert_eq!(response.steps.len(), 1);
        assert_eq!(response.text, "only");
        assert_eq!(response.usage, Usage::new(10, 5));
    }

    #[test]
    fn test_step_limit_flag() {
        let mut builder = ResponseBuilder::new();
        builder.add_step(step("a", FinishReason::ToolCalls, Usage::default()));
        builder.mark_step_limit_reached();

        assert!(builder.build().step_limit_reached);
    }
}
