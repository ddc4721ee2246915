//! In-memory tool registry with the built-in `calc` tool.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use crate::ports::{ToolDescriptor, ToolError, ToolRegistry};

/// Synchronous tool body.
pub type ToolFn = Arc<dyn Fn(JsonValue) -> Result<JsonValue, ToolError> + Send + Sync>;

struct RegisteredTool {
    description: String,
    run: ToolFn,
}

/// Tools held in process, looked up by name.
#[derive(Default)]
pub struct InMemoryToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl InMemoryToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `calc`.
    pub fn with_builtin_tools() -> Self {
        Self::new().with_tool(CALC_TOOL, "Evaluate `a op b` for op in + - * /", Arc::new(calc))
    }

    pub fn with_tool(mut self, name: &str, description: &str, run: ToolFn) -> Self {
        self.tools.insert(
            name.to_string(),
            RegisteredTool {
                description: description.to_string(),
                run,
            },
        );
        self
    }
}

#[async_trait]
impl ToolRegistry for InMemoryToolRegistry {
    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolDescriptor {
                name: name.clone(),
                description: tool.description.clone(),
            })
            .collect()
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    async fn execute(&self, name: &str, input: JsonValue) -> Result<JsonValue, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        (tool.run)(input)
    }
}

pub const CALC_TOOL: &str = "calc";

/// `{"a": 2, "op": "+", "b": 3}` → `5`.
pub fn calc(input: JsonValue) -> Result<JsonValue, ToolError> {
    let operand = |key: &str| {
        input
            .get(key)
            .and_then(JsonValue::as_f64)
            .ok_or_else(|| ToolError::invalid_input(CALC_TOOL, format!("'{}' must be a number", key)))
    };
    let a = operand("a")?;
    let b = operand("b")?;
    let op = input
        .get("op")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ToolError::invalid_input(CALC_TOOL, "'op' must be a string"))?;

    let value = match op {
        "+" => a + b,
        "-" => a - b,
        "*" | "x" => a * b,
        "/" if b == 0.0 => return Err(ToolError::execution(CALC_TOOL, "division by zero")),
        "/" => a / b,
        other => {
            return Err(ToolError::invalid_input(
                CALC_TOOL,
                format!("unsupported operator '{}'", other),
            ))
        }
    };

    Ok(number(value))
}

/// Integral results render without a fractional part.
fn number(value: f64) -> JsonValue {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}
