//! EventSubscriber port - Interface for consuming a topic.
//!
//! A subscription yields acknowledgeable [`BusMessage`]s on a channel until
//! its cancellation token fires or the transport closes. New subscriptions
//! observe only messages published after they were established ("at tail").

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::event_publisher::{BusError, EventPublisher};

/// One delivered message.
///
/// Transports that track delivery (consumer groups) attach an acker; for
/// fire-and-forget transports [`BusMessage::ack`] is a no-op.
#[derive(Debug)]
pub struct BusMessage {
    id: String,
    payload: String,
    acker: Option<mpsc::UnboundedSender<String>>,
}

impl BusMessage {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            acker: None,
        }
    }

    /// Routes [`BusMessage::ack`] through `acker`.
    pub fn with_acker(mut self, acker: mpsc::UnboundedSender<String>) -> Self {
        self.acker = Some(acker);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Acknowledges the message. Acking after the subscription ended is ignored.
    pub fn ack(&self) {
        if let Some(acker) = &self.acker {
            let _ = acker.send(self.id.clone());
        }
    }
}

/// Port for subscribing to a topic.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Creates the reader group for `topic` positioned at the current tail.
    ///
    /// Idempotent: an existing group is left untouched.
    async fn ensure_group_at_tail(&self, topic: &str) -> Result<(), BusError>;

    /// Starts consuming `topic` as `consumer`.
    ///
    /// The returned channel closes when `cancel` fires or the transport ends.
    async fn subscribe(
        &self,
        topic: &str,
        consumer: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<BusMessage>, BusError>;
}

/// Combined trait for event bus implementations.
///
/// An EventBus provides both publishing and subscribing capabilities.
pub trait EventBus: EventPublisher + EventSubscriber {}

// Blanket implementation - any type that implements both traits is an EventBus
impl<T: EventPublisher + EventSubscriber> EventBus for T {}
