//! Event translation - engine events in, wire frames out.
//!
//! ```text
//!   EngineEvent ──► resolve entity id ──┬──► semantic frames  (sem: true)
//!                                       └──► timeline frames  (tl: true)
//! ```
//!
//! Translation is a pure mapping apart from two side tables owned by the
//! translator: the [`ToolCallCache`] (tool calls are remembered so their
//! results can be rendered with call context) and the [`VersionClock`] that
//! stamps timeline `updated` frames.
//!
//! When an event carries the nil id, a synthetic id is generated per event
//! (`log-<uuid>`, `llm-<uuid>`). Consecutive zero-id events of one stream
//! therefore do not share an id.

use std::collections::HashMap;

use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

use super::events::{EngineEvent, EventPayload, ToolCall, ToolResult};
use super::frames::{Protocol, SemEvent, TimelineEvent, WireFrame};
use super::tool_cache::ToolCallCache;
use super::version::VersionClock;
use crate::domain::foundation::Timestamp;

/// Default level for log events that declare none.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maps engine events to wire frames for one conversation.
#[derive(Debug)]
pub struct EventTranslator {
    protocol: Protocol,
    custom_renderers: HashMap<String, String>,
    tool_cache: ToolCallCache,
    clock: VersionClock,
}

impl EventTranslator {
    pub fn new(
        protocol: Protocol,
        custom_renderers: HashMap<String, String>,
        tool_cache_capacity: usize,
    ) -> Self {
        Self {
            protocol,
            custom_renderers,
            tool_cache: ToolCallCache::new(tool_cache_capacity),
            clock: VersionClock::new(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn tool_cache(&self) -> &ToolCallCache {
        &self.tool_cache
    }

    /// Custom result kind for a tool name, if it has one.
    pub fn custom_kind(&self, tool_name: &str) -> Option<&str> {
        self.custom_renderers.get(tool_name).map(String::as_str)
    }

    /// Translates one engine event into the ordered frames to broadcast.
    ///
    /// With [`Protocol::Both`] the semantic frames come first; both protocols
    /// share the same resolved entity id.
    pub fn translate(&self, event: &EngineEvent) -> Vec<WireFrame> {
        tracing::debug!(
            event_type = event.kind(),
            event_id = %event.meta.id,
            run_id = %event.meta.run_id,
            turn_id = %event.meta.turn_id,
            "translating event"
        );

        let Some(id) = self.entity_id(event) else {
            tracing::debug!(event_type = event.kind(), "no mapping for event; dropping");
            return Vec::new();
        };

        self.remember_tool_call(&event.payload);

        let mut frames = Vec::new();
        if self.protocol.emits_semantic() {
            frames.extend(self.semantic_frames(&id, event).into_iter().map(WireFrame::Semantic));
        }
        if self.protocol.emits_timeline() {
            frames.extend(self.timeline_frames(&id, event).into_iter().map(WireFrame::Timeline));
        }
        frames
    }

    /// Resolves the entity id an event's frames refer to.
    ///
    /// Returns `None` for kinds that have no mapping.
    fn entity_id(&self, event: &EngineEvent) -> Option<String> {
        let meta = &event.meta;
        let from_meta = |prefix: &str| {
            if meta.has_zero_id() {
                let synthetic = format!("{}-{}", prefix, Uuid::new_v4());
                tracing::warn!(
                    event_type = event.kind(),
                    entity_id = %synthetic,
                    "event has zero id; generating local id"
                );
                synthetic
            } else {
                meta.id.to_string()
            }
        };

        match &event.payload {
            EventPayload::Log { .. } => Some(from_meta("log")),
            EventPayload::Start
            | EventPayload::Partial { .. }
            | EventPayload::Final { .. }
            | EventPayload::Interrupt { .. } => Some(from_meta("llm")),
            EventPayload::ToolCall { tool_call } | EventPayload::ToolCallExecute { tool_call } => {
                Some(tool_call.id.clone())
            }
            EventPayload::ToolResult { tool_result }
            | EventPayload::ToolCallExecutionResult { tool_result } => Some(tool_result.id.clone()),
            EventPayload::AgentModeSwitch { .. } => {
                Some(format!("agentmode-{}-{}", meta.turn_id, Uuid::new_v4()))
            }
            EventPayload::Unknown => None,
        }
    }

    fn remember_tool_call(&self, payload: &EventPayload) {
        if let EventPayload::ToolCall { tool_call } | EventPayload::ToolCallExecute { tool_call } =
            payload
        {
            self.tool_cache.remember(tool_call);
            tracing::debug!(
                tool_id = %tool_call.id,
                tool_name = %tool_call.name,
                "cached tool call input"
            );
        }
    }

    /// Decoded input merged with name and result, when the tool has a custom renderer.
    fn custom_result(&self, result: &ToolResult) -> Option<(String, Map<String, JsonValue>)> {
        let cached = self.tool_cache.lookup(&result.id)?;
        let kind = self.custom_kind(&cached.name)?.to_string();

        let mut merged = Map::new();
        merged.insert("name".into(), JsonValue::String(cached.name.clone()));
        merged.insert("result".into(), result.result.clone());
        if let Some(input) = cached.decoded_input {
            merged.extend(input);
        }
        Some((kind, merged))
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Semantic protocol
    // ════════════════════════════════════════════════════════════════════════════

    fn semantic_frames(&self, id: &str, event: &EngineEvent) -> Vec<SemEvent> {
        let id = id.to_string();
        let llm = event.meta.llm.clone();

        match &event.payload {
            EventPayload::Log {
                level,
                message,
                fields,
            } => vec![SemEvent::Log {
                id,
                level: normalized_level(level).to_string(),
                message: message.clone(),
                fields: fields.clone(),
            }],

            EventPayload::Start => vec![SemEvent::LlmStart {
                id,
                role: "assistant".into(),
                metadata: llm,
            }],

            EventPayload::Partial { delta, completion } => vec![SemEvent::LlmDelta {
                id,
                delta: delta.clone(),
                cumulative: completion.clone(),
                metadata: llm,
            }],

            EventPayload::Final { text } => vec![SemEvent::LlmFinal {
                id,
                text: text.clone(),
                metadata: llm,
            }],

            EventPayload::Interrupt { text } => vec![SemEvent::LlmFinal {
                id,
                text: text.clone(),
                metadata: None,
            }],

            EventPayload::ToolCall { tool_call } => vec![SemEvent::ToolStart {
                id,
                name: tool_call.name.clone(),
                input: tool_call.decoded_input(),
            }],

            EventPayload::ToolCallExecute { tool_call } => vec![SemEvent::ToolDelta {
                id,
                patch: exec_patch(true, decoded_input_value(tool_call)),
            }],

            EventPayload::ToolResult { tool_result }
            | EventPayload::ToolCallExecutionResult { tool_result } => {
                let result = match self.custom_result(tool_result) {
                    Some((kind, data)) => SemEvent::ToolResult {
                        id: id.clone(),
                        result: tool_result.result.clone(),
                        custom_kind: Some(kind),
                        data: Some(data),
                    },
                    None => SemEvent::ToolResult {
                        id: id.clone(),
                        result: tool_result.result.clone(),
                        custom_kind: None,
                        data: None,
                    },
                };
                vec![result, SemEvent::ToolDone { id }]
            }

            EventPayload::AgentModeSwitch { message, data } => vec![SemEvent::AgentMode {
                id,
                title: message.clone(),
                data: mode_props(message, data),
            }],

            EventPayload::Unknown => Vec::new(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Timeline protocol
    // ════════════════════════════════════════════════════════════════════════════

    fn timeline_frames(&self, id: &str, event: &EngineEvent) -> Vec<TimelineEvent> {
        let now_ms = Timestamp::now().unix_millis();
        let llm = event.meta.llm.clone().unwrap_or(JsonValue::Null);

        match &event.payload {
            EventPayload::Log {
                level,
                message,
                fields,
            } => {
                let mut props = Map::new();
                props.insert("level".into(), json!(normalized_level(level)));
                props.insert("message".into(), json!(message));
                if !fields.is_empty() {
                    props.insert("fields".into(), JsonValue::Object(fields.clone()));
                }
                vec![
                    TimelineEvent::created(id, "log_event", props).with_started_at(now_ms),
                    TimelineEvent::completed(id, Some(object([("message", json!(message))]))),
                ]
            }

            EventPayload::Start => {
                let props = object([
                    ("role", json!("assistant")),
                    ("text", json!("")),
                    ("metadata", llm),
                    ("streaming", json!(true)),
                ]);
                vec![TimelineEvent::created(id, "llm_text", props).with_started_at(now_ms)]
            }

            EventPayload::Partial { completion, .. } => {
                let patch = object([
                    ("text", json!(completion)),
                    ("metadata", llm),
                    ("streaming", json!(true)),
                ]);
                vec![self.updated(id, patch, now_ms)]
            }

            EventPayload::Final { text } => vec![
                TimelineEvent::completed(id, Some(object([("text", json!(text)), ("metadata", llm)]))),
                self.updated(id, object([("streaming", json!(false))]), now_ms),
            ],

            EventPayload::Interrupt { text } => vec![
                TimelineEvent::completed(id, Some(object([("text", json!(text))]))),
                self.updated(id, object([("streaming", json!(false))]), now_ms),
            ],

            EventPayload::ToolCall { tool_call } => {
                let props = object([
                    ("name", json!(tool_call.name)),
                    ("input", json!(tool_call.input)),
                ]);
                vec![TimelineEvent::created(id, "tool_call", props).with_started_at(now_ms)]
            }

            EventPayload::ToolCallExecute { tool_call } => {
                vec![self.updated(id, exec_patch(true, json!(tool_call.input)), now_ms)]
            }

            EventPayload::ToolResult { tool_result }
            | EventPayload::ToolCallExecutionResult { tool_result } => {
                let (entity, created) = match self.custom_result(tool_result) {
                    Some((kind, props)) => {
                        let entity = format!("{}:custom", id);
                        let created = TimelineEvent::created(entity.clone(), &kind, props);
                        (entity, created)
                    }
                    None => {
                        let entity = format!("{}:result", id);
                        let props = object([("result", tool_result.result.clone())]);
                        let created = TimelineEvent::created(entity.clone(), "tool_call_result", props);
                        (entity, created)
                    }
                };
                let mut clear = Map::new();
                clear.insert("exec".into(), json!(false));
                vec![
                    created,
                    TimelineEvent::completed(entity, None),
                    self.updated(id, clear, now_ms),
                ]
            }

            EventPayload::AgentModeSwitch { message, data } => vec![
                TimelineEvent::created(id, "agent_mode", mode_props(message, data)),
                TimelineEvent::completed(id, None),
            ],

            EventPayload::Unknown => Vec::new(),
        }
    }

    fn updated(&self, id: &str, patch: Map<String, JsonValue>, now_ms: i64) -> TimelineEvent {
        TimelineEvent::updated(id, patch, self.clock.next(), now_ms)
    }
}

fn normalized_level(level: &str) -> &str {
    if level.is_empty() {
        DEFAULT_LOG_LEVEL
    } else {
        level
    }
}

fn decoded_input_value(call: &ToolCall) -> JsonValue {
    call.decoded_input().map(JsonValue::Object).unwrap_or(JsonValue::Null)
}

fn exec_patch(exec: bool, input: JsonValue) -> Map<String, JsonValue> {
    object([("exec", json!(exec)), ("input", input)])
}

fn mode_props(message: &str, data: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    let mut props = object([("title", json!(message))]);
    props.extend(data.clone());
    props
}

fn object<const N: usize>(pairs: [(&str, JsonValue); N]) -> Map<String, JsonValue> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::RunId;
    use crate::domain::streaming::events::EventMetadata;
    use crate::domain::streaming::frames::TimelineEventType;

    fn translator(protocol: Protocol) -> EventTranslator {
        let mut renderers = HashMap::new();
        renderers.insert("calc".to_string(), "calc_result".to_string());
        EventTranslator::new(protocol, renderers, 64)
    }

    fn event(payload: EventPayload) -> EngineEvent {
        EngineEvent::new(EventMetadata::new(Uuid::new_v4(), &RunId::new()), payload)
    }

    fn zero_id(payload: EventPayload) -> EngineEvent {
        EngineEvent::new(EventMetadata::untagged(), payload)
    }

    fn calc_call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "calc".into(),
            input: r#"{"a": 2, "op": "+", "b": 3}"#.into(),
        }
    }

    fn sem(frames: &[WireFrame]) -> Vec<&SemEvent> {
        frames.iter().filter_map(WireFrame::as_semantic).collect()
    }

    fn tl(frames: &[WireFrame]) -> Vec<&TimelineEvent> {
        frames.iter().filter_map(WireFrame::as_timeline).collect()
    }

    #[test]
    fn delta_maps_to_llm_delta_with_cumulative() {
        let t = translator(Protocol::Semantic);
        let e = event(EventPayload::Partial {
            delta: "lo".into(),
            completion: "hello".into(),
        });

        let frames = t.translate(&e);
        assert_eq!(frames.len(), 1);
        match sem(&frames)[0] {
            SemEvent::LlmDelta {
                id,
                delta,
                cumulative,
                ..
            } => {
                assert_eq!(id, &e.meta.id.to_string());
                assert_eq!(delta, "lo");
                assert_eq!(cumulative, "hello");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn final_emits_completed_then_streaming_false() {
        let t = translator(Protocol::Timeline);
        let frames = t.translate(&event(EventPayload::Final { text: "done".into() }));
        let frames = tl(&frames);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event_type, TimelineEventType::Completed);
        assert_eq!(frames[0].result.as_ref().unwrap()["text"], json!("done"));
        assert_eq!(frames[1].event_type, TimelineEventType::Updated);
        assert_eq!(frames[1].patch.as_ref().unwrap()["streaming"], json!(false));
        assert!(frames[1].version.is_some());
    }

    #[test]
    fn interrupt_behaves_like_final() {
        let t = translator(Protocol::Semantic);
        let frames = t.translate(&event(EventPayload::Interrupt { text: "part".into() }));
        assert!(matches!(sem(&frames)[0], SemEvent::LlmFinal { text, .. } if text == "part"));
    }

    #[test]
    fn start_opens_streaming_entity() {
        let t = translator(Protocol::Timeline);
        let frames = t.translate(&event(EventPayload::Start));
        let created = tl(&frames)[0];
        assert_eq!(created.event_type, TimelineEventType::Created);
        assert_eq!(created.kind.as_deref(), Some("llm_text"));
        assert_eq!(created.props.as_ref().unwrap()["streaming"], json!(true));
        assert!(created.started_at.is_some());
    }

    #[test]
    fn custom_tool_lifecycle_emits_custom_result_then_done() {
        let t = translator(Protocol::Semantic);
        t.translate(&event(EventPayload::ToolCall { tool_call: calc_call("t1") }));
        t.translate(&event(EventPayload::ToolCallExecute { tool_call: calc_call("t1") }));
        let frames = t.translate(&event(EventPayload::ToolResult {
            tool_result: ToolResult {
                id: "t1".into(),
                result: json!("5"),
            },
        }));

        let frames = sem(&frames);
        assert_eq!(frames.len(), 2);
        match frames[0] {
            SemEvent::ToolResult {
                id,
                custom_kind,
                data,
                result,
            } => {
                assert_eq!(id, "t1");
                assert_eq!(result, &json!("5"));
                assert_eq!(custom_kind.as_deref(), Some("calc_result"));
                let data = data.as_ref().unwrap();
                assert_eq!(data["a"], json!(2));
                assert_eq!(data["op"], json!("+"));
                assert_eq!(data["name"], json!("calc"));
                assert_eq!(data["result"], json!("5"));
            }
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(frames[1], &SemEvent::ToolDone { id: "t1".into() });
    }

    #[test]
    fn generic_tool_result_has_no_custom_kind() {
        let t = translator(Protocol::Semantic);
        let call = ToolCall {
            id: "t2".into(),
            name: "search".into(),
            input: "{}".into(),
        };
        t.translate(&event(EventPayload::ToolCall { tool_call: call }));
        let frames = t.translate(&event(EventPayload::ToolCallExecutionResult {
            tool_result: ToolResult {
                id: "t2".into(),
                result: json!("found"),
            },
        }));

        let frames = sem(&frames);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], SemEvent::ToolResult { custom_kind: None, data: None, .. }));
        assert_eq!(frames[1].type_name(), "tool.done");
    }

    #[test]
    fn uncached_result_falls_back_to_generic() {
        let t = translator(Protocol::Timeline);
        let frames = t.translate(&event(EventPayload::ToolResult {
            tool_result: ToolResult {
                id: "t3".into(),
                result: json!(1),
            },
        }));
        let frames = tl(&frames);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].entity_id, "t3:result");
        assert_eq!(frames[0].kind.as_deref(), Some("tool_call_result"));
        assert_eq!(frames[1].entity_id, "t3:result");
        assert_eq!(frames[1].event_type, TimelineEventType::Completed);
        assert_eq!(frames[2].entity_id, "t3");
        assert_eq!(frames[2].patch.as_ref().unwrap()["exec"], json!(false));
    }

    #[test]
    fn custom_timeline_result_uses_custom_entity() {
        let t = translator(Protocol::Timeline);
        t.translate(&event(EventPayload::ToolCall { tool_call: calc_call("t4") }));
        let frames = t.translate(&event(EventPayload::ToolResult {
            tool_result: ToolResult {
                id: "t4".into(),
                result: json!("5"),
            },
        }));
        let frames = tl(&frames);

        assert_eq!(frames[0].entity_id, "t4:custom");
        assert_eq!(frames[0].kind.as_deref(), Some("calc_result"));
        assert_eq!(frames[0].props.as_ref().unwrap()["b"], json!(3));
        assert_eq!(frames[1].entity_id, "t4:custom");
        assert_eq!(frames[2].entity_id, "t4");
    }

    #[test]
    fn zero_id_delta_gets_fresh_synthetic_ids() {
        let t = translator(Protocol::Semantic);
        let partial = || {
            zero_id(EventPayload::Partial {
                delta: "a".into(),
                completion: "a".into(),
            })
        };

        let first = t.translate(&partial());
        let second = t.translate(&partial());
        let final_frames = t.translate(&zero_id(EventPayload::Final { text: "a".into() }));

        let a = first[0].entity_id().to_string();
        let b = second[0].entity_id().to_string();
        let c = final_frames[0].entity_id().to_string();
        assert!(a.starts_with("llm-"));
        assert!(b.starts_with("llm-"));
        assert!(c.starts_with("llm-"));
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn zero_id_log_uses_log_prefix_and_default_level() {
        let t = translator(Protocol::Semantic);
        let frames = t.translate(&zero_id(EventPayload::Log {
            level: String::new(),
            message: "hi".into(),
            fields: Map::new(),
        }));
        match sem(&frames)[0] {
            SemEvent::Log { id, level, .. } => {
                assert!(id.starts_with("log-"));
                assert_eq!(level, "info");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_yields_nothing() {
        let t = translator(Protocol::Both);
        assert!(t.translate(&event(EventPayload::Unknown)).is_empty());
    }

    #[test]
    fn both_protocols_share_entity_id_semantic_first() {
        let t = translator(Protocol::Both);
        let frames = t.translate(&zero_id(EventPayload::Start));

        assert_eq!(frames.len(), 2);
        assert!(frames[0].as_semantic().is_some());
        assert!(frames[1].as_timeline().is_some());
        assert_eq!(frames[0].entity_id(), frames[1].entity_id());
    }

    #[test]
    fn agent_mode_id_includes_turn() {
        let t = translator(Protocol::Timeline);
        let mut meta = EventMetadata::untagged().with_turn("turn7");
        meta.id = Uuid::new_v4();
        let mut data = Map::new();
        data.insert("mode".into(), json!("research"));
        let frames = t.translate(&EngineEvent::new(
            meta,
            EventPayload::AgentModeSwitch {
                message: "Switched".into(),
                data,
            },
        ));
        let frames = tl(&frames);

        assert_eq!(frames.len(), 2);
        assert!(frames[0].entity_id.starts_with("agentmode-turn7-"));
        let props = frames[0].props.as_ref().unwrap();
        assert_eq!(props["title"], json!("Switched"));
        assert_eq!(props["mode"], json!("research"));
        assert_eq!(frames[1].event_type, TimelineEventType::Completed);
    }

    #[test]
    fn update_versions_increase() {
        let t = translator(Protocol::Timeline);
        let e = event(EventPayload::Partial {
            delta: "x".into(),
            completion: "x".into(),
        });
        let v1 = tl(&t.translate(&e))[0].version.unwrap();
        let v2 = tl(&t.translate(&e))[0].version.unwrap();
        assert!(v2 > v1);
    }
}
