//! HTTP handler listing the available chat profiles.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::domain::profile::{ChatProfile, ProfileCatalog};

#[derive(Clone)]
pub struct ProfileHandlers {
    profiles: Arc<ProfileCatalog>,
}

impl ProfileHandlers {
    pub fn new(profiles: Arc<ProfileCatalog>) -> Self {
        Self { profiles }
    }
}

/// GET /api/chat/profiles - `[{slug, default_prompt}]`, ordered by slug
pub async fn list_profiles(State(handlers): State<ProfileHandlers>) -> Json<Vec<ChatProfile>> {
    Json(handlers.profiles.list().into_iter().cloned().collect())
}
