//! Data transfer objects for the chat endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::DomainError;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request to start a run.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    /// Empty means "start a new conversation".
    #[serde(default)]
    pub conv_id: String,
    /// Applied only when this request creates the conversation.
    #[serde(default)]
    pub overrides: ChatOverrides,
}

/// Per-request adjustments to the selected profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatOverrides {
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Query parameters accepted by `POST /chat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatParams {
    #[serde(default)]
    pub profile: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Response when a run was admitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub run_id: String,
    pub conv_id: String,
}

/// Body of a 409 when a run is already in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResponse {
    pub error: String,
    pub conv_id: String,
    pub run_id: String,
}

impl ConflictResponse {
    pub fn run_in_progress(conv_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            error: "run in progress".to_string(),
            conv_id: conv_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&DomainError> for ErrorResponse {
    fn from(err: &DomainError) -> Self {
        let details = (!err.details.is_empty()).then(|| {
            serde_json::Value::Object(
                err.details
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            )
        });
        Self {
            code: err.code().as_str().to_string(),
            message: err.message().to_string(),
            details,
        }
    }
}
