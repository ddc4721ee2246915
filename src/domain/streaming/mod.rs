//! Streaming module - from engine events to viewer frames.
//!
//! - `events` - the engine event carried on the bus
//! - `frames` - timeline and semantic wire frames
//! - `tool_cache` - tool-call correlation for result rendering
//! - `version` - monotonic version stamps
//! - `translator` - the event → frames mapping

mod events;
mod frames;
mod tool_cache;
mod translator;
mod version;

pub use events::{EngineEvent, EventMetadata, EventPayload, ToolCall, ToolResult};
pub use frames::{Protocol, SemEvent, TimelineEvent, TimelineEventType, WireFrame};
pub use tool_cache::{CachedToolCall, ToolCallCache};
pub use translator::{EventTranslator, DEFAULT_LOG_LEVEL};
pub use version::VersionClock;
