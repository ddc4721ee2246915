//! Event bus configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Which transport carries engine events.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusBackend {
    #[default]
    Memory,
    Redis,
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub backend: BusBackend,

    /// Redis connection URL (required for the redis backend)
    pub redis_url: Option<String>,

    /// Consumer group readers join
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Consumer name prefix; the conversation id is appended
    #[serde(default = "default_consumer_prefix")]
    pub consumer_prefix: String,

    /// Topic prefix; the conversation id is appended
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Buffered messages per subscription
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// XREADGROUP block time in milliseconds
    #[serde(default = "default_block_ms")]
    pub block_ms: usize,
}

impl BusConfig {
    /// Validate bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channel_capacity == 0 {
            return Err(ValidationError::ZeroCapacity("bus.channel_capacity"));
        }
        if self.backend == BusBackend::Redis {
            let url = self
                .redis_url
                .as_deref()
                .ok_or(ValidationError::MissingRequired("bus.redis_url"))?;
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ValidationError::InvalidRedisUrl);
            }
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::Memory,
            redis_url: None,
            consumer_group: default_consumer_group(),
            consumer_prefix: default_consumer_prefix(),
            topic_prefix: default_topic_prefix(),
            channel_capacity: default_channel_capacity(),
            block_ms: default_block_ms(),
        }
    }
}

fn default_consumer_group() -> String {
    "ui".to_string()
}

fn default_consumer_prefix() -> String {
    "ws-forwarder".to_string()
}

fn default_topic_prefix() -> String {
    "chat:".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_block_ms() -> usize {
    1000
}
