//! HTTP handlers for submitting prompts.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::profiles::requested_profile;
use crate::application::{StreamError, StreamingHub};
use crate::domain::foundation::{ConversationId, DomainError, ErrorCode};
use crate::domain::profile::ProfileCatalog;

use super::dto::{ChatParams, ChatRequest, ChatResponse, ConflictResponse, ErrorResponse};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ChatHandlers {
    hub: Arc<StreamingHub>,
    profiles: Arc<ProfileCatalog>,
}

impl ChatHandlers {
    pub fn new(hub: Arc<StreamingHub>, profiles: Arc<ProfileCatalog>) -> Self {
        Self { hub, profiles }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /chat - Submit a prompt and start a run
///
/// The profile comes from `?profile=` or the `chat_profile` cookie.
pub async fn chat(
    State(handlers): State<ChatHandlers>,
    Query(params): Query<ChatParams>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatApiError> {
    let profile = requested_profile(params.profile.as_deref(), &headers);
    start_run(&handlers, profile.as_deref(), body).await
}

/// POST /chat/:profile - Submit a prompt using the profile named in the path
pub async fn chat_with_profile(
    State(handlers): State<ChatHandlers>,
    Path(profile): Path<String>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatApiError> {
    start_run(&handlers, Some(&profile), body).await
}

async fn start_run(
    handlers: &ChatHandlers,
    profile: Option<&str>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatApiError> {
    let Json(req) = body.map_err(|rejection| DomainError::validation(rejection.body_text()))?;

    if req.prompt.trim().is_empty() {
        return Err(DomainError::validation("prompt cannot be empty").into());
    }

    let conv_id = if req.conv_id.trim().is_empty() {
        ConversationId::generate()
    } else {
        ConversationId::new(req.conv_id).map_err(DomainError::from)?
    };

    let profile = handlers
        .profiles
        .resolve(profile)?
        .with_system_prompt(req.overrides.system_prompt.as_deref());

    let admitted = handlers.hub.submit(&conv_id, &profile, &req.prompt).await?;

    Ok(Json(ChatResponse {
        run_id: admitted.run_id.to_string(),
        conv_id: conv_id.to_string(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct ChatApiError(pub DomainError);

impl From<DomainError> for ChatApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<StreamError> for ChatApiError {
    fn from(err: StreamError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ChatApiError {
    fn into_response(self) -> Response {
        handle_chat_error(self.0)
    }
}

fn handle_chat_error(error: DomainError) -> Response {
    match error.code() {
        ErrorCode::ValidationFailed => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::from(&error))).into_response()
        }
        ErrorCode::ProfileNotFound => {
            (StatusCode::NOT_FOUND, Json(ErrorResponse::from(&error))).into_response()
        }
        ErrorCode::RunInProgress => {
            let detail = |key: &str| error.details.get(key).cloned().unwrap_or_default();
            let (conv_id, run_id) = (detail("conv_id"), detail("run_id"));
            tracing::debug!(%conv_id, %run_id, "rejected submission: run in progress");
            (
                StatusCode::CONFLICT,
                Json(ConflictResponse::run_in_progress(conv_id, run_id)),
            )
                .into_response()
        }
        ErrorCode::SubscriptionFailed | ErrorCode::EngineUnavailable | ErrorCode::TransportError => {
            tracing::warn!(code = %error.code(), "Streaming unavailable: {}", error.message());
            (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse::from(&error))).into_response()
        }
    }
}
