//! Tool trait and registry.
//!
//! A [`Tool`] is a named capability the model may call during a run. The
//! [`ToolRegistry`] holds the tools for one orchestrator and produces the
//! [`ToolDefinition`]s advertised to the provider.

use async_trait::async_trait;
use refract_llm::ToolDefinition;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, matched against provider tool calls.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    /// Execute the tool with provider-supplied arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<String>;
}

/// Shared handle to a tool.
pub type SharedTool = Arc<dyn Tool>;

/// A named collection of tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, SharedTool>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: SharedTool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&SharedTool> {
        self.tools.get(name)
    }

    /// Returns true if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// The names of every registered tool.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Definitions for every registered tool, for the provider request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.input_schema()))
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockTool;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use super::*;
    use crate::error::AgentError;
    use std::sync::Mutex;

    /// Scripted tool double for tests.
    pub struct MockTool {
        name: String,
        result: std::result::Result<String, String>,
        calls: Mutex<Vec<serde_json::Value>>,
    }

    impl MockTool {
        /// A tool that always succeeds with `result`.
        pub fn new(name: impl Into<String>, result: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                result: Ok(result.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// A tool that always fails with `message`.
        pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                result: Err(message.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Arguments received so far, in call order.
        pub fn calls(&self) -> Vec<serde_json::Value> {
            self.calls.lock().unwrap().clone()
        }

        /// How many times the tool was executed.
        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "mock tool"
        }

        async fn execute(&self, arguments: serde_json::Value) -> Result<String> {
            self.calls.lock().unwrap().push(arguments);
            match &self.result {
                Ok(result) => Ok(result.clone()),
                Err(message) => Err(AgentError::tool(&self.name, message)),
            }
        }
    }
}
