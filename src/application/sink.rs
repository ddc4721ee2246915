//! Publishes a run's engine events to its conversation topic.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::streaming::EngineEvent;
use crate::ports::{BusError, EventBus, EventPublisher, EventSink};

/// [`EventSink`] bound to one bus topic.
pub struct TopicEventSink {
    bus: Arc<dyn EventBus>,
    topic: String,
}

impl TopicEventSink {
    pub fn new(bus: Arc<dyn EventBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventSink for TopicEventSink {
    async fn publish_event(&self, event: EngineEvent) -> Result<(), BusError> {
        let payload = event
            .encode()
            .map_err(|e| BusError::publish(&self.topic, e))?;
        self.bus.publish(&self.topic, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::domain::streaming::{EventMetadata, EventPayload};

    #[tokio::test]
    async fn publishes_encoded_event_to_topic() {
        let bus = Arc::new(InMemoryEventBus::new().with_recording());
        let sink = TopicEventSink::new(bus.clone(), "chat:c1");

        sink.publish_event(EngineEvent::new(EventMetadata::untagged(), EventPayload::Start))
            .await
            .unwrap();

        let published = bus.published_on("chat:c1");
        assert_eq!(published.len(), 1);
        let decoded = EngineEvent::decode(published[0].as_bytes()).unwrap();
        assert_eq!(decoded.payload, EventPayload::Start);
    }
}
