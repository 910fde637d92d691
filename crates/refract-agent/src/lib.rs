//! Multi-step tool-call orchestration over [`refract_llm`] providers.
//!
//! The [`Orchestrator`] owns the conversation loop: it sends the request,
//! executes any tools the model asks for, feeds the results back, and
//! repeats until the model concludes or the step cap is hit.
//!
//! # Example
//!
//! ```no_run
//! use refract_agent::{Orchestrator, ToolRegistry};
//! use refract_llm::{Message, OpenRouterConfig, OpenRouterProvider, Request};
//! use std::sync::Arc;
//!
//! # async fn run() -> refract_agent::Result<()> {
//! let provider = Arc::new(OpenRouterProvider::new(OpenRouterConfig::new("sk-or-..."))?);
//! let orchestrator = Orchestrator::new(provider).with_tools(ToolRegistry::new());
//!
//! let request = Request::new("openai/gpt-4o", vec![Message::user("What time is it?")]);
//! let response = orchestrator.run(request).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod orchestrator;
pub mod tool;

pub use error::{AgentError, Result};
pub use orchestrator::{concluded_naturally, Orchestrator, OrchestratorConfig, ToolErrorMode};
pub use tool::{SharedTool, Tool, ToolRegistry};

#[cfg(any(test, feature = "testing"))]
pub use tool::MockTool;
