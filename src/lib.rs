//! Webchat - multi-viewer streaming backend for agent inference.
//!
//! A client opens `GET /ws?conv_id=…` to watch a conversation and posts
//! prompts to `POST /chat`. Each admitted run drives an engine that publishes
//! inference events to the conversation's bus topic; one reader per
//! conversation translates those events into wire frames and fans them out to
//! every attached viewer.
//!
//! ```text
//!  POST /chat ─► RunAdmission ─► Engine ─► EventBus (topic chat:<conv_id>)
//!                                               │
//!  GET /ws ─► ConversationRegistry              ▼
//!                 │                        EventReader ─► EventTranslator
//!                 └── viewers ◄── Broadcaster ◄──────────────┘
//! ```
//!
//! Layout follows ports and adapters: [`domain`] holds the pure types and the
//! translator, [`ports`] the traits at the transport and engine seams,
//! [`application`] the per-conversation orchestration, [`adapters`] the bus,
//! engine, HTTP, and WebSocket implementations, and [`config`] the
//! environment-driven settings.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
