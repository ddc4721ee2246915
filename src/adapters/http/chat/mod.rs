//! Chat HTTP adapter - prompt submission.

mod dto;
mod handlers;
mod routes;

pub use dto::{ChatOverrides, ChatParams, ChatRequest, ChatResponse, ConflictResponse, ErrorResponse};
pub use handlers::{chat, chat_with_profile, ChatApiError, ChatHandlers};
pub use routes::chat_routes;
