//! HTTP routes for profile listing.

use axum::{routing::get, Router};

use super::handlers::{list_profiles, ProfileHandlers};

/// Creates the profiles router.
pub fn profile_routes(handlers: ProfileHandlers) -> Router {
    Router::new()
        .route("/api/chat/profiles", get(list_profiles))
        .with_state(handlers)
}
