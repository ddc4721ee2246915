//! Application layer - the streaming fan-out core.
//!
//! ```text
//!   /ws ──attach──►┐                         ┌──► viewer
//!                  │  ConversationRegistry   │
//!   /chat ─submit─►┤  └─ Conversation ─── EventReader ─► Broadcaster ──► viewer
//!                  │       ├─ RunAdmission   ▲           └──► viewer
//!                  │       └─ Idle manager   │
//!                  └─ engine ──► sink ──► bus topic
//! ```
//!
//! - `StreamingHub` - entry point used by the HTTP and socket adapters
//! - `ConversationRegistry` - exactly-once conversation creation
//! - `EventReader` - per-conversation bus consumer
//! - `Broadcaster` - best-effort fan-out to viewers
//! - `IdleLifecycleManager` - reader teardown when nobody watches
//! - `RunAdmission` - one run per conversation

mod admission;
mod broadcaster;
mod conversation;
mod error;
mod hub;
mod idle;
mod reader;
mod registry;
mod sink;

pub use admission::{AdmittedRun, RunAdmission};
pub use broadcaster::{BroadcastOutcome, Broadcaster};
pub use conversation::{Conversation, StreamingSettings};
pub use error::StreamError;
pub use hub::StreamingHub;
pub use idle::IdleLifecycleManager;
pub use reader::{EventReader, MessageOutcome};
pub use registry::ConversationRegistry;
pub use sink::TopicEventSink;
