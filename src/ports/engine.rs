//! Engine port - Interface for the inference engine and its event sink.
//!
//! An engine consumes a transcript, streams its activity as [`EngineEvent`]s
//! through the run's [`EventSink`], and returns the extended transcript.
//!
//! # Example
//!
//! ```ignore
//! let ctx = RunContext::new(run_id, sink, tools, cancel);
//! match engine.run_inference(ctx, transcript).await {
//!     Ok(updated) => conversation.replace_transcript(updated),
//!     Err(failure) => tracing::warn!(error = %failure, "run failed"),
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::event_publisher::BusError;
use super::tool_registry::{ToolError, ToolRegistry};
use crate::domain::foundation::{ConversationId, DomainError, ErrorCode, RunId};
use crate::domain::profile::ChatProfile;
use crate::domain::streaming::EngineEvent;
use crate::domain::transcript::Transcript;

/// Errors raised by an inference run.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("inference cancelled")]
    Cancelled,

    #[error("tool loop exceeded {0} iterations")]
    MaxIterations(usize),

    #[error("event publish failed: {0}")]
    Publish(#[from] BusError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl From<EngineError> for DomainError {
    fn from(err: EngineError) -> Self {
        DomainError::new(ErrorCode::EngineUnavailable, err.to_string())
    }
}

/// A failed run, with whatever transcript progress it made.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub error: EngineError,
    pub partial: Option<Transcript>,
}

impl RunFailure {
    pub fn new(error: EngineError) -> Self {
        Self {
            error,
            partial: None,
        }
    }

    pub fn with_partial(mut self, partial: Transcript) -> Self {
        self.partial = Some(partial);
        self
    }
}

/// Destination for the events a run produces.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish_event(&self, event: EngineEvent) -> Result<(), BusError>;
}

/// Everything a run needs besides the transcript.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub sink: Arc<dyn EventSink>,
    pub tools: Arc<dyn ToolRegistry>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        run_id: RunId,
        sink: Arc<dyn EventSink>,
        tools: Arc<dyn ToolRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            sink,
            tools,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Port for inference engines.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Runs inference over `transcript` and returns the extended transcript.
    ///
    /// Must return promptly with [`EngineError::Cancelled`] once the context's
    /// token fires.
    async fn run_inference(
        &self,
        ctx: RunContext,
        transcript: Transcript,
    ) -> Result<Transcript, RunFailure>;
}

/// Builds the engine a conversation keeps for its lifetime.
pub trait EngineFactory: Send + Sync {
    /// `profile` carries the system prompt already resolved for this request.
    fn build(
        &self,
        conv_id: &ConversationId,
        profile: &ChatProfile,
    ) -> Result<Arc<dyn Engine>, EngineError>;
}
