//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the streaming core and the outside world. Adapters implement these ports.
//!
//! ## Bus Ports
//!
//! - `EventPublisher` - Publish JSON payloads to a topic
//! - `EventSubscriber` - Consume a topic from its tail with acknowledgement
//! - `EventBus` - Both of the above
//!
//! ## Inference Ports
//!
//! - `Engine` / `EngineFactory` - The inference engine, one per conversation
//! - `EventSink` - Where a run publishes its events
//! - `ToolRegistry` - Tools available to the engine's tool loop
//!
//! ## Viewer Ports
//!
//! - `ViewerConnection` - A client that frames are pushed to

mod engine;
mod event_publisher;
mod event_subscriber;
mod tool_registry;
mod viewer;

pub use engine::{Engine, EngineError, EngineFactory, EventSink, RunContext, RunFailure};
pub use event_publisher::{BusError, EventPublisher};
pub use event_subscriber::{BusMessage, EventBus, EventSubscriber};
pub use tool_registry::{ToolDescriptor, ToolError, ToolRegistry};
pub use viewer::ViewerConnection;
