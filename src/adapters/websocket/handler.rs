//! WebSocket upgrade handler for conversation viewers.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Resolve `conv_id` and the profile from the query string or cookie
//! 2. Upgrade to WebSocket
//! 3. Attach a [`WebSocketViewer`] to the conversation
//! 4. Drain queued frames to the socket until either side stops
//! 5. Detach the viewer

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;

use crate::adapters::http::profiles::requested_profile;
use crate::application::StreamingHub;
use crate::domain::foundation::ConversationId;
use crate::domain::profile::{ChatProfile, ProfileCatalog};
use crate::ports::ViewerConnection;

use super::viewer::WebSocketViewer;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    pub hub: Arc<StreamingHub>,
    pub profiles: Arc<ProfileCatalog>,
    /// Frames buffered per viewer before new ones are dropped.
    pub queue_capacity: usize,
}

impl WebSocketState {
    pub fn new(hub: Arc<StreamingHub>, profiles: Arc<ProfileCatalog>, queue_capacity: usize) -> Self {
        Self {
            hub,
            profiles,
            queue_capacity,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub conv_id: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

/// Handle WebSocket upgrade requests for a conversation.
///
/// Route: `GET /ws?conv_id=<id>[&profile=<slug>]`
///
/// The profile falls back to the `chat_profile` cookie, then `default`; it
/// only applies if this connection creates the conversation. A missing
/// `conv_id` or an unknown profile still upgrades, then gets a single error
/// frame and a close.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<WebSocketState>,
) -> Response {
    let conv_id = params
        .conv_id
        .and_then(|id| ConversationId::new(id).ok());
    let profile = state
        .profiles
        .resolve(requested_profile(params.profile.as_deref(), &headers).as_deref());

    ws.on_upgrade(move |socket| async move {
        match (conv_id, profile) {
            (None, _) => reject(socket, "missing conv_id").await,
            (Some(_), Err(e)) => reject(socket, e.message()).await,
            (Some(conv_id), Ok(profile)) => handle_socket(socket, conv_id, profile, state).await,
        }
    })
}

/// Run an attached connection until the client goes away.
async fn handle_socket(
    mut socket: WebSocket,
    conv_id: ConversationId,
    profile: ChatProfile,
    state: WebSocketState,
) {
    let (viewer, mut outbound) = WebSocketViewer::channel(state.queue_capacity);
    let client_id = viewer.client_id();

    let conv = match state.hub.attach(&conv_id, &profile, Arc::new(viewer)).await {
        Ok(conv) => conv,
        Err(e) => {
            tracing::warn!(conv_id = %conv_id, error = %e, "cannot attach viewer");
            let _ = socket
                .send(Message::Text(json!({ "error": e.to_string() }).to_string()))
                .await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sender, mut receiver) = socket.split();

    // Forward queued frames to the client
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sender.send(Message::Text(frame)).await {
                tracing::debug!(%client_id, "Send error, closing connection: {}", e);
                break;
            }
        }
    });

    // Inbound frames only prove liveness
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    tracing::debug!(%client_id, "Client sent close frame");
                    break;
                }
                Ok(_) => {
                    tracing::trace!(%client_id, "inbound frame ignored");
                }
                Err(e) => {
                    tracing::debug!(%client_id, "Receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.detach(&conv, &client_id);
}

/// Send a single error frame and close.
async fn reject(mut socket: WebSocket, reason: &str) {
    tracing::debug!(reason, "rejecting websocket connection");
    let _ = socket
        .send(Message::Text(json!({ "error": reason }).to_string()))
        .await;
    let _ = socket.send(Message::Close(None)).await;
}

/// Creates the router for the WebSocket endpoint.
pub fn websocket_routes(state: WebSocketState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}
