//! Wire frames - JSON messages pushed to every viewer of a conversation.
//!
//! Two independent protocols describe the same entity lifecycles:
//!
//! - **Timeline** (legacy): `{"tl": true, "event": {type, entityId, …}}` with
//!   `created` / `updated` / `completed` lifecycle events.
//! - **Semantic**: `{"sem": true, "event": {type, id, …}}` with flat,
//!   kind-specific events (`llm.delta`, `tool.result`, …).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

// ════════════════════════════════════════════════════════════════════════════════
// Protocol selection
// ════════════════════════════════════════════════════════════════════════════════

/// Which protocol(s) a server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Semantic,
    Timeline,
    Both,
}

impl Protocol {
    pub fn emits_semantic(&self) -> bool {
        matches!(self, Protocol::Semantic | Protocol::Both)
    }

    pub fn emits_timeline(&self) -> bool {
        matches!(self, Protocol::Timeline | Protocol::Both)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Timeline (legacy) protocol
// ════════════════════════════════════════════════════════════════════════════════

/// Lifecycle step of a timeline entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineEventType {
    Created,
    Updated,
    Completed,
}

/// A timeline lifecycle event keyed by entity id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub event_type: TimelineEventType,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<Map<String, JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Map<String, JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Monotonic stamp on `updated` events; clients drop stale versions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl TimelineEvent {
    fn bare(event_type: TimelineEventType, entity_id: impl Into<String>) -> Self {
        Self {
            event_type,
            entity_id: entity_id.into(),
            kind: None,
            renderer: None,
            props: None,
            patch: None,
            result: None,
            started_at: None,
            updated_at: None,
            version: None,
        }
    }

    /// A `created` event for an entity rendered as `kind`.
    pub fn created(entity_id: impl Into<String>, kind: &str, props: Map<String, JsonValue>) -> Self {
        let mut renderer = BTreeMap::new();
        renderer.insert("kind".to_string(), kind.to_string());
        Self {
            kind: Some(kind.to_string()),
            renderer: Some(renderer),
            props: Some(props),
            ..Self::bare(TimelineEventType::Created, entity_id)
        }
    }

    /// An `updated` event carrying a patch and a version stamp.
    pub fn updated(
        entity_id: impl Into<String>,
        patch: Map<String, JsonValue>,
        version: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            patch: Some(patch),
            version: Some(version),
            updated_at: Some(updated_at),
            ..Self::bare(TimelineEventType::Updated, entity_id)
        }
    }

    /// A `completed` event, optionally with a result.
    pub fn completed(entity_id: impl Into<String>, result: Option<Map<String, JsonValue>>) -> Self {
        Self {
            result,
            ..Self::bare(TimelineEventType::Completed, entity_id)
        }
    }

    pub fn with_started_at(mut self, started_at: i64) -> Self {
        self.started_at = Some(started_at);
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Semantic protocol
// ════════════════════════════════════════════════════════════════════════════════

/// Flat semantic event, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SemEvent {
    #[serde(rename = "log")]
    Log {
        id: String,
        level: String,
        message: String,
        #[serde(skip_serializing_if = "Map::is_empty")]
        fields: Map<String, JsonValue>,
    },

    #[serde(rename = "llm.start")]
    LlmStart {
        id: String,
        role: String,
        metadata: Option<JsonValue>,
    },

    #[serde(rename = "llm.delta")]
    LlmDelta {
        id: String,
        delta: String,
        cumulative: String,
        metadata: Option<JsonValue>,
    },

    #[serde(rename = "llm.final")]
    LlmFinal {
        id: String,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<JsonValue>,
    },

    #[serde(rename = "tool.start")]
    ToolStart {
        id: String,
        name: String,
        input: Option<Map<String, JsonValue>>,
    },

    #[serde(rename = "tool.delta")]
    ToolDelta {
        id: String,
        patch: Map<String, JsonValue>,
    },

    #[serde(rename = "tool.result")]
    ToolResult {
        id: String,
        result: JsonValue,
        #[serde(rename = "customKind", skip_serializing_if = "Option::is_none")]
        custom_kind: Option<String>,
        /// Decoded call input merged with name and result (custom renderers only).
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Map<String, JsonValue>>,
    },

    #[serde(rename = "tool.done")]
    ToolDone { id: String },

    #[serde(rename = "agent.mode")]
    AgentMode {
        id: String,
        title: String,
        data: Map<String, JsonValue>,
    },
}

impl SemEvent {
    /// Wire `type` of this event.
    pub fn type_name(&self) -> &'static str {
        match self {
            SemEvent::Log { .. } => "log",
            SemEvent::LlmStart { .. } => "llm.start",
            SemEvent::LlmDelta { .. } => "llm.delta",
            SemEvent::LlmFinal { .. } => "llm.final",
            SemEvent::ToolStart { .. } => "tool.start",
            SemEvent::ToolDelta { .. } => "tool.delta",
            SemEvent::ToolResult { .. } => "tool.result",
            SemEvent::ToolDone { .. } => "tool.done",
            SemEvent::AgentMode { .. } => "agent.mode",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SemEvent::Log { id, .. }
            | SemEvent::LlmStart { id, .. }
            | SemEvent::LlmDelta { id, .. }
            | SemEvent::LlmFinal { id, .. }
            | SemEvent::ToolStart { id, .. }
            | SemEvent::ToolDelta { id, .. }
            | SemEvent::ToolResult { id, .. }
            | SemEvent::ToolDone { id }
            | SemEvent::AgentMode { id, .. } => id,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Envelopes
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct TimelineEnvelope<'a> {
    tl: bool,
    event: &'a TimelineEvent,
}

#[derive(Serialize)]
struct SemanticEnvelope<'a> {
    sem: bool,
    event: &'a SemEvent,
}

/// One outbound frame in either protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Timeline(TimelineEvent),
    Semantic(SemEvent),
}

impl WireFrame {
    /// Serializes the frame inside its protocol envelope.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            WireFrame::Timeline(event) => serde_json::to_string(&TimelineEnvelope { tl: true, event }),
            WireFrame::Semantic(event) => serde_json::to_string(&SemanticEnvelope { sem: true, event }),
        }
    }

    /// Entity identifier the frame refers to.
    pub fn entity_id(&self) -> &str {
        match self {
            WireFrame::Timeline(event) => &event.entity_id,
            WireFrame::Semantic(event) => event.id(),
        }
    }

    pub fn as_semantic(&self) -> Option<&SemEvent> {
        match self {
            WireFrame::Semantic(event) => Some(event),
            WireFrame::Timeline(_) => None,
        }
    }

    pub fn as_timeline(&self) -> Option<&TimelineEvent> {
        match self {
            WireFrame::Timeline(event) => Some(event),
            WireFrame::Semantic(_) => None,
        }
    }
}
