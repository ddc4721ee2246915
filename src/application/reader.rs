//! EventReader - the per-conversation bus consumer.
//!
//! ```text
//!   bus topic ──► decode ──► run filter ──► translate ──► broadcast ──► ack
//!                   │            │
//!                   └─ ack+drop  └─ ack+drop (foreign run)
//! ```
//!
//! At most one reader is active per conversation. `start` claims the
//! `reader_active` flag under the viewer lock before subscribing, so
//! concurrent starts collapse into one. Each start bumps an epoch; a reader
//! that exits only clears the flag if it still owns the current epoch, so a
//! stale reader never clobbers its replacement.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::streaming::{EngineEvent, EventPayload, DEFAULT_LOG_LEVEL};
use crate::ports::{BusError, BusMessage, EventBus, EventSubscriber};

use super::broadcaster::Broadcaster;
use super::conversation::Conversation;
use super::error::StreamError;

/// What happened to one bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Decoded, translated, and offered to viewers.
    Broadcast { frames: usize },
    /// Tagged with another run's id.
    ForeignRun,
    /// Not a decodable engine event.
    Malformed,
}

/// Starts and runs conversation readers against one bus.
#[derive(Clone)]
pub struct EventReader {
    bus: Arc<dyn EventBus>,
}

impl EventReader {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    /// Starts the conversation's reader unless one is already active.
    ///
    /// Returns `Ok(true)` when a new reader was started. On subscription
    /// failure the claim is released and the error returned.
    pub async fn start(&self, conv: &Arc<Conversation>) -> Result<bool, StreamError> {
        let (stop, epoch) = {
            let mut viewers = conv.viewers.lock();
            if viewers.reader_active {
                return Ok(false);
            }
            viewers.reader_active = true;
            viewers.reader_epoch += 1;
            let stop = CancellationToken::new();
            viewers.reader_stop = Some(stop.clone());
            (stop, viewers.reader_epoch)
        };

        let messages = match self.subscribe(conv, stop.clone()).await {
            Ok(rx) => rx,
            Err(source) => {
                release(conv, epoch);
                tracing::error!(
                    conv_id = %conv.id(),
                    topic = %conv.topic(),
                    error = %source,
                    "reader subscription failed"
                );
                return Err(StreamError::Subscription {
                    topic: conv.topic().to_string(),
                    source,
                });
            }
        };

        tracing::info!(
            conv_id = %conv.id(),
            topic = %conv.topic(),
            consumer = %conv.consumer(),
            run_id = %conv.run_id(),
            "reader started"
        );
        tokio::spawn(run(conv.clone(), messages, stop, epoch));
        Ok(true)
    }

    async fn subscribe(
        &self,
        conv: &Conversation,
        stop: CancellationToken,
    ) -> Result<mpsc::Receiver<BusMessage>, BusError> {
        self.bus.ensure_group_at_tail(conv.topic()).await?;
        self.bus.subscribe(conv.topic(), conv.consumer(), stop).await
    }

    /// Handles one bus message: filter, translate, broadcast, ack.
    ///
    /// Every message is acknowledged, whatever its outcome.
    pub fn handle_message(conv: &Conversation, msg: &BusMessage) -> MessageOutcome {
        let outcome = Self::process(conv, msg.payload());
        msg.ack();
        outcome
    }

    fn process(conv: &Conversation, payload: &str) -> MessageOutcome {
        let event = match EngineEvent::decode(payload.as_bytes()) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(conv_id = %conv.id(), error = %e, "dropping malformed bus message");
                return MessageOutcome::Malformed;
            }
        };

        if !conv.run_id().accepts(&event.meta.run_id) {
            tracing::debug!(
                conv_id = %conv.id(),
                run_id = %event.meta.run_id,
                expected = %conv.run_id(),
                event_type = event.kind(),
                "skipping event from foreign run"
            );
            return MessageOutcome::ForeignRun;
        }

        relog(conv, &event);

        let frames = conv.translator().translate(&event);
        for frame in &frames {
            Broadcaster::broadcast(conv, frame);
        }
        MessageOutcome::Broadcast {
            frames: frames.len(),
        }
    }
}

async fn run(
    conv: Arc<Conversation>,
    mut messages: mpsc::Receiver<BusMessage>,
    stop: CancellationToken,
    epoch: u64,
) {
    loop {
        let msg = tokio::select! {
            _ = stop.cancelled() => break,
            msg = messages.recv() => msg,
        };
        let Some(msg) = msg else { break };
        EventReader::handle_message(&conv, &msg);
    }

    release(&conv, epoch);
    tracing::info!(conv_id = %conv.id(), topic = %conv.topic(), "reader stopped");
}

/// Clears the reader flag if `epoch` is still the current reader.
fn release(conv: &Conversation, epoch: u64) {
    let mut viewers = conv.viewers.lock();
    if viewers.reader_epoch == epoch {
        viewers.reader_active = false;
        viewers.reader_stop = None;
    }
}

/// Mirrors noteworthy engine activity into the server log.
fn relog(conv: &Conversation, event: &EngineEvent) {
    match &event.payload {
        EventPayload::Log {
            level,
            message,
            fields,
        } => {
            let fields = serde_json::Value::Object(fields.clone());
            let level = if level.is_empty() { DEFAULT_LOG_LEVEL } else { level.as_str() };
            match level {
                "error" => tracing::error!(conv_id = %conv.id(), %fields, "{}", message),
                "warn" | "warning" => tracing::warn!(conv_id = %conv.id(), %fields, "{}", message),
                "debug" => tracing::debug!(conv_id = %conv.id(), %fields, "{}", message),
                "trace" => tracing::trace!(conv_id = %conv.id(), %fields, "{}", message),
                _ => tracing::info!(conv_id = %conv.id(), %fields, "{}", message),
            }
        }
        EventPayload::ToolCall { tool_call } | EventPayload::ToolCallExecute { tool_call } => {
            tracing::info!(
                conv_id = %conv.id(),
                tool_id = %tool_call.id,
                tool_name = %tool_call.name,
                input = %tool_call.input,
                event_type = event.kind(),
                "tool call"
            );
        }
        EventPayload::ToolResult { tool_result }
        | EventPayload::ToolCallExecutionResult { tool_result } => {
            tracing::info!(
                conv_id = %conv.id(),
                tool_id = %tool_result.id,
                result = %tool_result.result,
                event_type = event.kind(),
                "tool result"
            );
        }
        _ => {}
    }
}
