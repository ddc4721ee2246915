//! Echo engine - a dependency-free engine that streams the prompt back.
//!
//! Useful for running the server without a model provider and for tests.
//!
//! - `hello world` streams `hello`, ` world` as deltas, then a final.
//! - `calc 2 + 3` drives the `calc` tool through call → execute → result,
//!   then streams `2 + 3 = 5`.
//!
//! # Example
//!
//! ```ignore
//! let engine = EchoEngine::new(EchoEngineConfig::default());
//! let updated = engine.run_inference(ctx, transcript).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

use super::tools::CALC_TOOL;
use crate::domain::foundation::ConversationId;
use crate::domain::profile::ChatProfile;
use crate::domain::streaming::{
    EngineEvent, EventMetadata, EventPayload, ToolCall, ToolResult,
};
use crate::domain::transcript::{Block, Transcript};
use crate::ports::{Engine, EngineError, EngineFactory, RunContext, RunFailure};

/// Settings shared by every echo engine.
#[derive(Debug, Clone)]
pub struct EchoEngineConfig {
    /// Prepended to an empty transcript. Set per engine from its profile.
    pub system_prompt: Option<String>,
    pub max_iterations: usize,
    pub chunk_delay: Duration,
}

impl Default for EchoEngineConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_iterations: 5,
            chunk_delay: Duration::from_millis(20),
        }
    }
}

/// Streams the last user prompt back word by word.
#[derive(Debug, Clone)]
pub struct EchoEngine {
    config: EchoEngineConfig,
}

/// One run in progress: the event metadata source and the transcript so far.
struct Run<'a> {
    ctx: &'a RunContext,
    turn_id: String,
    transcript: Transcript,
}

impl<'a> Run<'a> {
    fn meta(&self, id: Uuid) -> EventMetadata {
        EventMetadata::new(id, &self.ctx.run_id)
            .with_turn(self.turn_id.clone())
            .with_llm(json!({"model": "echo"}))
    }

    async fn emit(&mut self, id: Uuid, payload: EventPayload) -> Result<(), RunFailure> {
        let event = EngineEvent::new(self.meta(id), payload);
        if let Err(e) = self.ctx.sink.publish_event(event).await {
            return Err(self.fail(EngineError::Publish(e)));
        }
        Ok(())
    }

    fn fail(&mut self, error: EngineError) -> RunFailure {
        let partial = std::mem::replace(&mut self.transcript, Transcript::new(self.ctx.run_id));
        RunFailure::new(error).with_partial(partial)
    }

    /// Sleeps between chunks; `false` once the run is cancelled.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.ctx.is_cancelled();
        }
        tokio::select! {
            _ = self.ctx.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl EchoEngine {
    pub fn new(config: EchoEngineConfig) -> Self {
        Self { config }
    }

    async fn call_tool(
        &self,
        run: &mut Run<'_>,
        name: &str,
        input: JsonValue,
    ) -> Result<JsonValue, RunFailure> {
        let call = ToolCall {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            input: input.to_string(),
        };
        let tool_event_id = Uuid::new_v4();

        run.emit(tool_event_id, EventPayload::ToolCall { tool_call: call.clone() })
            .await?;
        run.transcript.push(Block::tool_call(name, input.clone()));

        run.emit(tool_event_id, EventPayload::ToolCallExecute { tool_call: call.clone() })
            .await?;

        let result = match run.ctx.tools.execute(name, input).await {
            Ok(value) => value,
            Err(e) => {
                run.emit(
                    tool_event_id,
                    EventPayload::ToolCallExecutionResult {
                        tool_result: ToolResult {
                            id: call.id.clone(),
                            result: json!({"error": e.to_string()}),
                        },
                    },
                )
                .await?;
                return Err(run.fail(EngineError::Tool(e)));
            }
        };

        run.emit(
            tool_event_id,
            EventPayload::ToolCallExecutionResult {
                tool_result: ToolResult {
                    id: call.id,
                    result: result.clone(),
                },
            },
        )
        .await?;
        run.transcript.push(Block::tool_use(name, result.clone()));
        Ok(result)
    }

    async fn stream_text(&self, run: &mut Run<'_>, text: &str) -> Result<(), RunFailure> {
        let message_id = Uuid::new_v4();
        run.emit(message_id, EventPayload::Start).await?;

        let mut completion = String::new();
        for (i, word) in text.split_whitespace().enumerate() {
            if !run.pause(self.config.chunk_delay).await {
                run.emit(
                    message_id,
                    EventPayload::Interrupt {
                        text: completion.clone(),
                    },
                )
                .await?;
                if !completion.is_empty() {
                    run.transcript.push(Block::assistant(completion));
                }
                return Err(run.fail(EngineError::Cancelled));
            }

            let delta = if i == 0 {
                word.to_string()
            } else {
                format!(" {}", word)
            };
            completion.push_str(&delta);
            run.emit(
                message_id,
                EventPayload::Partial {
                    delta,
                    completion: completion.clone(),
                },
            )
            .await?;
        }

        run.emit(
            message_id,
            EventPayload::Final {
                text: completion.clone(),
            },
        )
        .await?;
        run.transcript.push(Block::assistant(completion));
        Ok(())
    }
}

#[async_trait]
impl Engine for EchoEngine {
    async fn run_inference(
        &self,
        ctx: RunContext,
        mut transcript: Transcript,
    ) -> Result<Transcript, RunFailure> {
        if let Some(prompt) = &self.config.system_prompt {
            transcript.ensure_system_prompt(prompt);
        }
        let prompt = transcript.last_user_text().unwrap_or_default().to_string();
        transcript.run_id = ctx.run_id;

        let mut run = Run {
            ctx: &ctx,
            turn_id: Uuid::new_v4().to_string(),
            transcript,
        };

        let mut fields = Map::new();
        fields.insert("prompt_len".into(), json!(prompt.len()));
        run.emit(
            Uuid::new_v4(),
            EventPayload::Log {
                level: "info".into(),
                message: "inference started".into(),
                fields,
            },
        )
        .await?;

        let reply = match parse_calc(&prompt) {
            Some(input) => {
                if self.config.max_iterations == 0 {
                    return Err(run.fail(EngineError::MaxIterations(0)));
                }
                let result = self.call_tool(&mut run, CALC_TOOL, input.clone()).await?;
                format!(
                    "{} {} {} = {}",
                    input["a"], input["op"].as_str().unwrap_or_default(), input["b"], result
                )
            }
            None => prompt,
        };

        self.stream_text(&mut run, &reply).await?;
        Ok(run.transcript)
    }
}

/// `calc <a> <op> <b>` → tool input.
fn parse_calc(prompt: &str) -> Option<JsonValue> {
    let mut parts = prompt.split_whitespace();
    if parts.next()? != CALC_TOOL {
        return None;
    }
    let a: f64 = parts.next()?.parse().ok()?;
    let op = parts.next()?;
    let b: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(json!({"a": compact(a), "op": op, "b": compact(b)}))
}

fn compact(value: f64) -> JsonValue {
    if value.fract() == 0.0 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Builds one [`EchoEngine`] per conversation.
#[derive(Debug, Clone, Default)]
pub struct EchoEngineFactory {
    config: EchoEngineConfig,
}

impl EchoEngineFactory {
    pub fn new(config: EchoEngineConfig) -> Self {
        Self { config }
    }
}

impl EngineFactory for EchoEngineFactory {
    fn build(
        &self,
        conv_id: &ConversationId,
        profile: &ChatProfile,
    ) -> Result<Arc<dyn Engine>, EngineError> {
        tracing::debug!(conv_id = %conv_id, profile = %profile.slug, "building echo engine");
        let system_prompt = Some(profile.system_prompt.clone()).filter(|p| !p.trim().is_empty());
        Ok(Arc::new(EchoEngine::new(EchoEngineConfig {
            system_prompt,
            ..self.config.clone()
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::engine::InMemoryToolRegistry;
    use crate::domain::foundation::RunId;
    use crate::ports::{BusError, EventSink};
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<EngineEvent>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish_event(&self, event: EngineEvent) -> Result<(), BusError> {
            self.events.lock().push(event);
            Ok(())
        }
    }

    fn fast_engine() -> EchoEngine {
        EchoEngine::new(EchoEngineConfig {
            chunk_delay: Duration::ZERO,
            ..EchoEngineConfig::default()
        })
    }

    fn context(sink: Arc<RecordingSink>) -> RunContext {
        RunContext::new(
            RunId::new(),
            sink,
            Arc::new(InMemoryToolRegistry::with_builtin_tools()),
            CancellationToken::new(),
        )
    }

    fn kinds(sink: &RecordingSink) -> Vec<&'static str> {
        sink.events.lock().iter().map(|e| e.kind()).collect()
    }

    #[tokio::test]
    async fn echoes_prompt_word_by_word() {
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(sink.clone());
        let run_id = ctx.run_id;
        let mut transcript = Transcript::new(run_id);
        transcript.push(Block::user("hello big world"));

        let out = fast_engine().run_inference(ctx, transcript).await.unwrap();

        assert_eq!(
            kinds(&sink),
            vec!["log", "start", "partial", "partial", "partial", "final"]
        );
        assert_eq!(out.blocks().last().unwrap().text, "hello big world");
        assert!(sink
            .events
            .lock()
            .iter()
            .all(|e| e.meta.run_id == run_id.to_string()));
    }

    #[tokio::test]
    async fn calc_prompt_drives_tool_lifecycle() {
        let sink = Arc::new(RecordingSink::default());
        let mut transcript = Transcript::new(RunId::new());
        transcript.push(Block::user("calc 2 + 3"));

        let out = fast_engine()
            .run_inference(context(sink.clone()), transcript)
            .await
            .unwrap();

        let kinds = kinds(&sink);
        assert_eq!(
            &kinds[..4],
            &["log", "tool-call", "tool-call-execute", "tool-call-execution-result"]
        );
        assert_eq!(out.blocks().last().unwrap().text, "2 + 3 = 5");
    }

    #[tokio::test]
    async fn cancelled_run_interrupts_and_keeps_partial() {
        let sink = Arc::new(RecordingSink::default());
        let ctx = context(sink.clone());
        ctx.cancel.cancel();
        let mut transcript = Transcript::new(ctx.run_id);
        transcript.push(Block::user("never streamed"));

        let failure = fast_engine().run_inference(ctx, transcript).await.unwrap_err();

        assert!(matches!(failure.error, EngineError::Cancelled));
        assert_eq!(failure.partial.unwrap().last_user_text(), Some("never streamed"));
        assert!(kinds(&sink).contains(&"interrupt"));
    }

    #[tokio::test]
    async fn tool_failure_fails_run() {
        let sink = Arc::new(RecordingSink::default());
        let mut transcript = Transcript::new(RunId::new());
        transcript.push(Block::user("calc 1 / 0"));

        let failure = fast_engine()
            .run_inference(context(sink.clone()), transcript)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, EngineError::Tool(_)));
        assert!(failure.partial.is_some());
    }

    #[test]
    fn parse_calc_requires_exact_shape() {
        assert_eq!(
            parse_calc("calc 2 * 4"),
            Some(json!({"a": 2, "op": "*", "b": 4}))
        );
        assert!(parse_calc("calc 2 *").is_none());
        assert!(parse_calc("calculate 2 * 4").is_none());
        assert!(parse_calc("calc two * 4").is_none());
    }

    #[test]
    fn factory_builds_engine() {
        let factory = EchoEngineFactory::default();
        assert!(factory
            .build(&ConversationId::generate(), &ChatProfile::default())
            .is_ok());
    }

    #[tokio::test]
    async fn factory_seeds_transcript_with_profile_prompt() {
        let factory = EchoEngineFactory::new(EchoEngineConfig {
            chunk_delay: Duration::ZERO,
            ..EchoEngineConfig::default()
        });
        let profile = ChatProfile::new("agent", "Be concise.").unwrap();
        let engine = factory.build(&ConversationId::generate(), &profile).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let mut transcript = Transcript::new(RunId::new());
        transcript.push(Block::user("hi"));
        let updated = engine.run_inference(context(sink), transcript).await.unwrap();

        assert_eq!(updated.blocks()[0], Block::system("Be concise."));
        assert_eq!(updated.last_user_text(), Some("hi"));
    }

    #[tokio::test]
    async fn blank_profile_prompt_adds_no_system_block() {
        let factory = EchoEngineFactory::new(EchoEngineConfig {
            chunk_delay: Duration::ZERO,
            ..EchoEngineConfig::default()
        });
        let profile = ChatProfile::new("bare", "").unwrap();
        let engine = factory.build(&ConversationId::generate(), &profile).unwrap();

        let mut transcript = Transcript::new(RunId::new());
        transcript.push(Block::user("hi"));
        let updated = engine
            .run_inference(context(Arc::new(RecordingSink::default())), transcript)
            .await
            .unwrap();

        assert_eq!(updated.blocks()[0], Block::user("hi"));
    }
}
