//! The multi-step tool-call loop.
//!
//! The orchestrator drives a provider through repeated round trips: send
//! the conversation, execute any requested tools, append results, repeat.
//! The loop ends when the provider finishes without tool calls, reaches a
//! terminal finish reason, or hits the step cap.

use refract_llm::{
    Message, Request, Response, ResponseBuilder, SharedProvider, ToolCall, ToolResult,
};
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::tool::ToolRegistry;

/// What to do when a tool execution fails mid-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolErrorMode {
    /// Record the failure text as the tool's result and keep going, so
    /// the model can see and react to it.
    #[default]
    Capture,
    /// Abort the run with the tool error.
    Fatal,
}

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Hard cap on provider round trips per run.
    pub max_steps: usize,
    /// Tool failure handling.
    pub tool_error_mode: ToolErrorMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_steps: 8,
            tool_error_mode: ToolErrorMode::Capture,
        }
    }
}

/// Drives a provider through a multi-step tool-call conversation.
pub struct Orchestrator {
    provider: SharedProvider,
    tools: ToolRegistry,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator with no tools and default configuration.
    pub fn new(provider: SharedProvider) -> Self {
        Self {
            provider,
            tools: ToolRegistry::new(),
            config: OrchestratorConfig::default(),
        }
    }

    /// Attach a tool registry.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the loop to completion.
    pub async fn run(&self, request: Request) -> Result<Response> {
        self.run_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Run the loop, stopping with [`AgentError::Cancelled`] when the
    /// token fires. Cancellation is checked before each round trip and
    /// before each tool execution; an in-flight round trip is not
    /// interrupted.
    pub async fn run_with_cancellation(
        &self,
        mut request: Request,
        cancel: CancellationToken,
    ) -> Result<Response> {
        if self.config.max_steps == 0 {
            return Err(AgentError::Config(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if !self.tools.is_empty() {
            request.tools = self.tools.definitions();
        }

        let run_id = uuid::Uuid::new_v4();
        tracing::debug!(
            %run_id,
            model = %request.model,
            max_steps = self.config.max_steps,
            tools = self.tools.len(),
            "starting orchestration run"
        );

        let mut builder = ResponseBuilder::new();
        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let provider_response = self.provider.text(&request).await?;
            let mut step = provider_response.steps.into_iter().next_back().ok_or_else(|| {
                AgentError::Llm(refract_llm::Error::provider_request(
                    request.model.clone(),
                    "provider returned a response with no steps",
                ))
            })?;
            let step_number = builder.step_count() + 1;
            tracing::debug!(
                %run_id,
                step = step_number,
                finish_reason = ?step.finish_reason,
                tool_calls = step.tool_calls.len(),
                "completed provider round trip"
            );

            // Natural conclusion wins over the cap, so a run that stops on
            // its final allowed step is not flagged.
            if step.finish_reason.is_terminal() || !step.has_tool_calls() {
                builder.add_step(step);
                break;
            }

            if step_number >= self.config.max_steps {
                // Cap hit on a tool-calling step: record it unexecuted.
                tracing::warn!(
                    max_steps = self.config.max_steps,
                    "step limit reached with tool calls pending"
                );
                builder.add_step(step);
                builder.mark_step_limit_reached();
                break;
            }

            let results = self.execute_tools(&step.tool_calls, &cancel).await?;

            // Extend the conversation for the next round trip: the
            // assistant message carrying the calls, then their results.
            request.add_message(Message::assistant_with_tool_calls(
                step.text.clone(),
                step.tool_calls.clone(),
            ));
            request.add_message(Message::tool_results(results.clone()));

            step.tool_results = results;
            builder.add_step(step);
        }

        Ok(builder.build())
    }

    /// Execute requested tool calls sequentially, in call order.
    async fn execute_tools(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolResult>> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let outcome = match self.tools.get(&call.name) {
                Some(tool) => {
                    tracing::info!(tool = %call.name, call_id = %call.id, "executing tool");
                    tool.execute(call.arguments.clone()).await
                }
                None => Err(AgentError::ToolNotFound(call.name.clone())),
            };

            let result = match (outcome, self.config.tool_error_mode) {
                (Ok(result), _) => result,
                (Err(err), ToolErrorMode::Capture) => {
                    tracing::warn!(tool = %call.name, error = %err, "tool failed, capturing result");
                    format!("Error: {err}")
                }
                (Err(err), ToolErrorMode::Fatal) => return Err(err),
            };
            results.push(ToolResult::new(&call.id, &call.name, result));
        }
        Ok(results)
    }
}

/// Convenience check for the caller: did the run end on a terminal step?
///
/// True for any uncapped run whose final finish reason is terminal
/// (`Stop`, `Length`, or `ContentFilter`).
pub fn concluded_naturally(response: &Response) -> bool {
    !response.step_limit_reached
        && response.finish_reason().is_some_and(|r| r.is_terminal())
}
