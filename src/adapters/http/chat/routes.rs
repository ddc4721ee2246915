//! HTTP routes for the chat endpoints.

use axum::{routing::post, Router};

use super::handlers::{chat, chat_with_profile, ChatHandlers};

/// Creates the chat router.
pub fn chat_routes(handlers: ChatHandlers) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/:profile", post(chat_with_profile))
        .with_state(handlers)
}
