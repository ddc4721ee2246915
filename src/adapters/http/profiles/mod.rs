//! Profiles HTTP adapter - profile listing and per-request profile selection.
//!
//! A request picks its profile, in order of precedence, from the
//! `/chat/{profile}` path segment, the `profile` query parameter, or the
//! `chat_profile` cookie. Nothing selected means the `default` profile.

mod handlers;
mod routes;
mod selection;

pub use handlers::{list_profiles, ProfileHandlers};
pub use routes::profile_routes;
pub use selection::{requested_profile, PROFILE_COOKIE};
