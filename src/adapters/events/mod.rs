//! Event bus adapters.
//!
//! - `InMemoryEventBus` - in-process broadcast per topic (single process, tests)
//! - `RedisStreamBus` - Redis Streams with consumer groups (multi-process)

mod in_memory;
mod redis_stream;

pub use in_memory::InMemoryEventBus;
pub use redis_stream::{RedisStreamBus, RedisStreamConfig};
