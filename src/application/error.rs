//! Errors surfaced by the streaming application layer.

use thiserror::Error;

use crate::domain::foundation::{ConversationId, DomainError, ErrorCode, RunId, ValidationError};
use crate::ports::{BusError, EngineError};

#[derive(Debug, Error)]
pub enum StreamError {
    /// The conversation's bus subscription could not be established.
    #[error("cannot attach to topic '{topic}': {source}")]
    Subscription {
        topic: String,
        #[source]
        source: BusError,
    },

    #[error("cannot build engine for conversation '{conv_id}': {source}")]
    Engine {
        conv_id: ConversationId,
        #[source]
        source: EngineError,
    },

    /// A run is already in flight for the conversation.
    #[error("run in progress")]
    RunInProgress {
        conv_id: ConversationId,
        run_id: RunId,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<StreamError> for DomainError {
    fn from(err: StreamError) -> Self {
        let message = err.to_string();
        match err {
            StreamError::Subscription { topic, source } => DomainError {
                message,
                ..DomainError::from(source)
            }
            .with_detail("topic", topic),
            StreamError::Engine { conv_id, source } => DomainError {
                message,
                ..DomainError::from(source)
            }
            .with_detail("conv_id", conv_id.to_string()),
            StreamError::RunInProgress { conv_id, run_id } => {
                DomainError::new(ErrorCode::RunInProgress, message)
                    .with_detail("conv_id", conv_id.to_string())
                    .with_detail("run_id", run_id.to_string())
            }
            StreamError::Validation(_) => DomainError::new(ErrorCode::ValidationFailed, message),
        }
    }
}
