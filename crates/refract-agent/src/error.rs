//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for orchestration and tool execution.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A provider round trip failed.
    #[error(transparent)]
    Llm(#[from] refract_llm::Error),

    /// A tool execution failed and the error mode was fatal.
    #[error("tool '{name}' failed: {message}")]
    Tool {
        /// The tool that failed.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// The model requested a tool that is not registered.
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    /// The caller cancelled the run.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Create a tool-failure error.
    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            name: name.into(),
            message: message.into(),
        }
    }
}
