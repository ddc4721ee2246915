//! In-memory event bus.
//!
//! One `tokio::sync::broadcast` channel per topic. A subscription is a
//! broadcast receiver created at subscribe time, so it only sees payloads
//! published afterwards: "at tail" by construction. Consumer groups and
//! acknowledgement have no meaning in-process and are accepted as no-ops.
//!
//! A topic exists only while someone is subscribed to it. Payloads published
//! to a topic nobody watches are dropped, and the topic entry is pruned as
//! soon as its last receiver goes away. Tests can opt into recording every
//! published payload with [`InMemoryEventBus::with_recording`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::ports::{BusError, BusMessage, EventPublisher, EventSubscriber};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Delivery {
    id: String,
    payload: String,
}

type Topics = Arc<RwLock<HashMap<String, broadcast::Sender<Delivery>>>>;

/// In-process topic fan-out.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new().with_recording());
/// let rx = bus.subscribe("chat:a", "ws-forwarder:a", cancel).await?;
/// bus.publish("chat:a", payload).await?;
/// assert_eq!(bus.published_on("chat:a").len(), 1);
/// ```
pub struct InMemoryEventBus {
    capacity: usize,
    topics: Topics,
    recorded: Option<RwLock<Vec<(String, String)>>>,
    subscriptions: AtomicUsize,
    sequence: AtomicU64,
}

impl InMemoryEventBus {
    /// Creates a bus with the default per-topic buffer.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus whose topics buffer up to `capacity` undelivered payloads.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(RwLock::new(HashMap::new())),
            recorded: None,
            subscriptions: AtomicUsize::new(0),
            sequence: AtomicU64::new(0),
        }
    }

    /// Keeps a copy of every published payload. Unbounded; tests only.
    pub fn with_recording(mut self) -> Self {
        self.recorded = Some(RwLock::new(Vec::new()));
        self
    }

    /// Subscribes under the map lock so pruning never races a new receiver.
    fn receiver(&self, topic: &str) -> broadcast::Receiver<Delivery> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.subscribe();
        }
        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    // === Test Helpers ===

    /// Payloads published to `topic`, in order. Empty unless recording.
    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.recorded
            .as_ref()
            .map(|recorded| {
                recorded
                    .read()
                    .iter()
                    .filter(|(t, _)| t == topic)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of recorded payloads across topics.
    pub fn published_count(&self) -> usize {
        self.recorded
            .as_ref()
            .map(|recorded| recorded.read().len())
            .unwrap_or(0)
    }

    /// Number of `subscribe` calls that succeeded.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Topics that currently have a channel.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }

    /// Live receivers on `topic`.
    pub fn receiver_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drops the topic, ending every subscription on it.
    pub fn close_topic(&self, topic: &str) {
        self.topics.write().remove(topic);
    }
}

/// Removes `topic` if nobody is listening on it any more.
fn prune(topics: &Topics, topic: &str) {
    let mut topics = topics.write();
    if topics
        .get(topic)
        .is_some_and(|sender| sender.receiver_count() == 0)
    {
        topics.remove(topic);
        tracing::trace!(%topic, "in-memory topic pruned");
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        if let Some(recorded) = &self.recorded {
            recorded.write().push((topic.to_string(), payload.clone()));
        }

        // No receivers is not an error: nobody is watching the topic yet.
        let sender = self.topics.read().get(topic).cloned();
        if let Some(sender) = sender {
            let delivery = Delivery {
                id: format!("{}-0", seq),
                payload,
            };
            if sender.send(delivery).is_err() {
                prune(&self.topics, topic);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for InMemoryEventBus {
    async fn ensure_group_at_tail(&self, _topic: &str) -> Result<(), BusError> {
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        consumer: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<BusMessage>, BusError> {
        let mut source = self.receiver(topic);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscriptions.fetch_add(1, Ordering::SeqCst);

        let topics = Arc::clone(&self.topics);
        let topic = topic.to_string();
        let consumer = consumer.to_string();
        tokio::spawn(async move {
            loop {
                let delivery = tokio::select! {
                    _ = cancel.cancelled() => break,
                    recv = source.recv() => recv,
                };
                match delivery {
                    Ok(d) => {
                        if tx.send(BusMessage::new(d.id, d.payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%topic, %consumer, skipped, "subscriber lagged; messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            drop(source);
            prune(&topics, &topic);
            tracing::debug!(%topic, %consumer, "in-memory subscription ended");
        });

        Ok(rx)
    }
}
