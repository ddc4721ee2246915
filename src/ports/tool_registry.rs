//! ToolRegistry port - Tools an engine may invoke during its tool loop.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors raised while executing a tool.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid input for '{tool}': {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error("tool '{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },
}

impl ToolError {
    pub fn invalid_input(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::InvalidInput {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn execution(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Execution {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// Name and description advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// Port for the set of tools available to a run.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// All registered tools.
    fn tools(&self) -> Vec<ToolDescriptor>;

    fn has_tool(&self, name: &str) -> bool {
        self.tools().iter().any(|t| t.name == name)
    }

    /// Executes `name` with decoded JSON input.
    async fn execute(&self, name: &str, input: JsonValue) -> Result<JsonValue, ToolError>;
}
