//! Engine events - the provider-agnostic inference activity carried on the bus.
//!
//! Each bus message holds one JSON-encoded [`EngineEvent`]:
//!
//! ```json
//! {"meta": {"id": "…", "run_id": "…", "turn_id": "…", "llm": {…}},
//!  "payload": {"type": "partial", "delta": "lo", "completion": "hello"}}
//! ```
//!
//! The payload is a closed sum type. Kinds this build does not know decode to
//! [`EventPayload::Unknown`] so newer engines never break older readers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::domain::foundation::RunId;

/// Identity and correlation context of an engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Entity identifier. The nil UUID means the engine supplied none.
    #[serde(default = "Uuid::nil")]
    pub id: Uuid,

    /// Run correlation tag; empty when the engine did not tag the event.
    #[serde(default)]
    pub run_id: String,

    #[serde(default)]
    pub turn_id: String,

    /// Free-form inference data (model, usage, stop reason).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<JsonValue>,
}

impl EventMetadata {
    /// Metadata for an entity of the given run.
    pub fn new(id: Uuid, run_id: &RunId) -> Self {
        Self {
            id,
            run_id: run_id.to_string(),
            turn_id: String::new(),
            llm: None,
        }
    }

    /// Metadata with no identity and no run tag.
    pub fn untagged() -> Self {
        Self {
            id: Uuid::nil(),
            run_id: String::new(),
            turn_id: String::new(),
            llm: None,
        }
    }

    pub fn with_turn(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = turn_id.into();
        self
    }

    pub fn with_llm(mut self, llm: JsonValue) -> Self {
        self.llm = Some(llm);
        self
    }

    /// True when the engine supplied no entity identifier.
    pub fn has_zero_id(&self) -> bool {
        self.id.is_nil()
    }
}

/// A tool invocation as requested by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments, exactly as the provider produced them.
    #[serde(default)]
    pub input: String,
}

impl ToolCall {
    /// Decodes the raw input into a JSON object.
    ///
    /// Empty, malformed, or non-object input yields `None`.
    pub fn decoded_input(&self) -> Option<Map<String, JsonValue>> {
        if self.input.is_empty() {
            return None;
        }
        match serde_json::from_str::<JsonValue>(&self.input) {
            Ok(JsonValue::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Outcome of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    #[serde(default)]
    pub result: JsonValue,
}

/// What happened, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventPayload {
    /// Status/log line emitted by the engine or a middleware.
    Log {
        #[serde(default)]
        level: String,
        message: String,
        #[serde(default)]
        fields: Map<String, JsonValue>,
    },
    /// Inference started streaming a text entity.
    Start,
    /// Incremental text plus the cumulative completion so far.
    Partial { delta: String, completion: String },
    /// Inference finished.
    Final { text: String },
    /// Inference was interrupted; `text` is the partial output.
    Interrupt {
        #[serde(default)]
        text: String,
    },
    ToolCall { tool_call: ToolCall },
    ToolCallExecute { tool_call: ToolCall },
    ToolResult { tool_result: ToolResult },
    ToolCallExecutionResult { tool_result: ToolResult },
    AgentModeSwitch {
        message: String,
        #[serde(default)]
        data: Map<String, JsonValue>,
    },
    #[serde(other)]
    Unknown,
}

/// One unit of inference activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub meta: EventMetadata,
    pub payload: EventPayload,
}

impl EngineEvent {
    pub fn new(meta: EventMetadata, payload: EventPayload) -> Self {
        Self { meta, payload }
    }

    /// Decodes a bus payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encodes for publishing on the bus.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match &self.payload {
            EventPayload::Log { .. } => "log",
            EventPayload::Start => "start",
            EventPayload::Partial { .. } => "partial",
            EventPayload::Final { .. } => "final",
            EventPayload::Interrupt { .. } => "interrupt",
            EventPayload::ToolCall { .. } => "tool-call",
            EventPayload::ToolCallExecute { .. } => "tool-call-execute",
            EventPayload::ToolResult { .. } => "tool-result",
            EventPayload::ToolCallExecutionResult { .. } => "tool-call-execution-result",
            EventPayload::AgentModeSwitch { .. } => "agent-mode-switch",
            EventPayload::Unknown => "unknown",
        }
    }
}
