//! Router assembly - every endpoint plus the tracing and CORS layers.

use std::sync::Arc;

use ::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::adapters::websocket::{websocket_routes, WebSocketState};
use crate::application::StreamingHub;
use crate::domain::profile::ProfileCatalog;

use super::chat::{chat_routes, ChatHandlers};
use super::profiles::{profile_routes, ProfileHandlers};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<StreamingHub>,
    pub viewer_queue_capacity: usize,
    pub profiles: Arc<ProfileCatalog>,
}

impl AppState {
    /// State offering only the default profile.
    pub fn new(hub: Arc<StreamingHub>, viewer_queue_capacity: usize) -> Self {
        Self {
            hub,
            viewer_queue_capacity,
            profiles: Arc::new(ProfileCatalog::default()),
        }
    }

    pub fn with_profiles(mut self, profiles: ProfileCatalog) -> Self {
        self.profiles = Arc::new(profiles);
        self
    }
}

/// Builds the application router: `POST /chat`, `POST /chat/:profile`,
/// `GET /api/chat/profiles` and `GET /ws`.
///
/// An empty `cors_origins` list allows any origin.
pub fn app_router(state: AppState, cors_origins: &[String]) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .merge(chat_routes(ChatHandlers::new(
            state.hub.clone(),
            state.profiles.clone(),
        )))
        .merge(profile_routes(ProfileHandlers::new(state.profiles.clone())))
        .merge(websocket_routes(WebSocketState::new(
            state.hub,
            state.profiles,
            state.viewer_queue_capacity,
        )))
        .layer(trace_layer)
        .layer(build_cors_layer(cors_origins))
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        tracing::debug!("CORS: allowing any origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    tracing::info!("CORS: Allowing {} origin(s)", allowed.len());
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE])
}
