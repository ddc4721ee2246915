//! EventPublisher port - Interface for publishing engine events to a topic.
//!
//! The publisher knows nothing about the transport (in-process broadcast,
//! Redis Streams). Payloads are JSON strings; topics are opaque names.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors raised by bus transports.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("bus connection failed: {0}")]
    Connection(String),

    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("consumer group setup on '{topic}' failed: {reason}")]
    Group { topic: String, reason: String },

    #[error("bus closed")]
    Closed,
}

impl BusError {
    pub fn publish(topic: impl Into<String>, reason: impl ToString) -> Self {
        BusError::Publish {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }

    pub fn subscribe(topic: impl Into<String>, reason: impl ToString) -> Self {
        BusError::Subscribe {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }

    pub fn group(topic: impl Into<String>, reason: impl ToString) -> Self {
        BusError::Group {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<BusError> for DomainError {
    fn from(err: BusError) -> Self {
        let code = match &err {
            BusError::Subscribe { .. } | BusError::Group { .. } => ErrorCode::SubscriptionFailed,
            _ => ErrorCode::TransportError,
        };
        DomainError::new(code, err.to_string())
    }
}

/// Port for publishing payloads to a topic.
///
/// Implementations must ensure:
/// - Payloads published to one topic are delivered in publish order
/// - Errors are propagated to the caller
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one JSON payload to `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError>;
}
