//! HTTP adapters - REST endpoints and router assembly.

pub mod chat;
pub mod profiles;
mod router;

pub use chat::{chat_routes, ChatHandlers};
pub use profiles::{profile_routes, ProfileHandlers};
pub use router::{app_router, AppState};
