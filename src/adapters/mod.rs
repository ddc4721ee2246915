//! Adapters - concrete implementations of the ports plus the HTTP surface.

pub mod engine;
pub mod events;
pub mod http;
pub mod websocket;
