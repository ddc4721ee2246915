//! Domain layer containing the streaming vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `transcript` - Conversation blocks consumed and extended by the engine
//! - `streaming` - Engine events, wire frames, and the translation between them
//! - `profile` - Named engine presets selectable per conversation

pub mod foundation;
pub mod profile;
pub mod streaming;
pub mod transcript;
