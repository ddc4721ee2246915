//! Redis Streams event bus for multi-process deployments.
//!
//! ```text
//!   publish ─► XADD <topic> * payload <json>
//!
//!   ensure_group_at_tail ─► XGROUP CREATE <topic> <group> $ MKSTREAM
//!
//!   subscribe ─► loop { XREADGROUP GROUP <group> <consumer>
//!                        COUNT n BLOCK ms STREAMS <topic> > }
//!   ack       ─► XACK <topic> <group> <id>
//! ```
//!
//! Each subscription reads on its own connection because a blocking
//! XREADGROUP would otherwise stall every command multiplexed behind it.
//! Publishing, group setup, and acknowledgements share one multiplexed
//! connection.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ports::{BusError, BusMessage, EventPublisher, EventSubscriber};

const PAYLOAD_FIELD: &str = "payload";
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Tunables for the Redis Streams bus.
#[derive(Debug, Clone)]
pub struct RedisStreamConfig {
    pub group: String,
    pub block_ms: usize,
    pub batch_size: usize,
    pub channel_capacity: usize,
}

impl Default for RedisStreamConfig {
    fn default() -> Self {
        Self {
            group: "ui".to_string(),
            block_ms: 1000,
            batch_size: 64,
            channel_capacity: 1024,
        }
    }
}

/// Event bus over Redis Streams with consumer groups.
#[derive(Clone)]
pub struct RedisStreamBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    config: RedisStreamConfig,
}

impl RedisStreamBus {
    /// Connects to `url` and prepares the shared connection.
    pub async fn connect(url: &str, config: RedisStreamConfig) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(|e| BusError::Connection(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        tracing::info!(group = %config.group, "connected to redis stream bus");
        Ok(Self {
            client,
            conn,
            config,
        })
    }

    pub fn config(&self) -> &RedisStreamConfig {
        &self.config
    }
}

#[async_trait]
impl EventPublisher for RedisStreamBus {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(topic, "*", &[(PAYLOAD_FIELD, payload)])
            .await
            .map_err(|e: redis::RedisError| BusError::publish(topic, e))?;
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for RedisStreamBus {
    async fn ensure_group_at_tail(&self, topic: &str) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        let created = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(topic)
            .arg(&self.config.group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async::<_, ()>(&mut conn)
            .await;

        match created {
            Ok(()) => {
                tracing::debug!(%topic, group = %self.config.group, "created consumer group at tail");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(BusError::group(topic, e)),
        }
    }

    async fn subscribe(
        &self,
        topic: &str,
        consumer: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<BusMessage>, BusError> {
        let mut read_conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::subscribe(topic, e))?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (ack_tx, ack_rx) = mpsc::unbounded_channel::<String>();

        spawn_acker(
            self.conn.clone(),
            topic.to_string(),
            self.config.group.clone(),
            ack_rx,
        );

        let topic = topic.to_string();
        let consumer = consumer.to_string();
        let options = StreamReadOptions::default()
            .group(&self.config.group, &consumer)
            .count(self.config.batch_size)
            .block(self.config.block_ms);

        tokio::spawn(async move {
            let keys = [topic.as_str()];
            let ids = [">"];

            loop {
                let read = tokio::select! {
                    _ = cancel.cancelled() => break,
                    read = read_conn.xread_options::<_, _, Option<StreamReadReply>>(&keys, &ids, &options) => read,
                };

                match read {
                    Ok(Some(reply)) => {
                        for entry in reply.keys.into_iter().flat_map(|k| k.ids) {
                            let payload: String = entry.get(PAYLOAD_FIELD).unwrap_or_default();
                            let msg = BusMessage::new(entry.id, payload).with_acker(ack_tx.clone());
                            if tx.send(msg).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) if e.is_connection_dropped() || e.is_io_error() => {
                        tracing::warn!(%topic, %consumer, error = %e, "redis subscription lost");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(%topic, %consumer, error = %e, "XREADGROUP failed; retrying");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(RETRY_DELAY) => {}
                        }
                    }
                }
            }
            tracing::debug!(%topic, %consumer, "redis subscription ended");
        });

        Ok(rx)
    }
}

/// Issues XACK for every id sent on `acks` until all senders are gone.
fn spawn_acker(
    mut conn: MultiplexedConnection,
    topic: String,
    group: String,
    mut acks: mpsc::UnboundedReceiver<String>,
) {
    tokio::spawn(async move {
        while let Some(id) = acks.recv().await {
            let acked: Result<i64, redis::RedisError> = conn.xack(&topic, &group, &[&id]).await;
            if let Err(e) = acked {
                tracing::warn!(%topic, message_id = %id, error = %e, "XACK failed");
            }
        }
    });
}
