//! Integration tests for the HTTP surface.
//!
//! These tests drive the assembled router with `oneshot` requests:
//! 1. `POST /chat` admits runs and generates conversation ids
//! 2. A second submission during a run is rejected with 409
//! 3. Malformed requests are rejected with 400
//! 4. Profiles are listed and selected by path, query or cookie

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use webchat::adapters::engine::{EchoEngineConfig, EchoEngineFactory, InMemoryToolRegistry};
use webchat::adapters::events::InMemoryEventBus;
use webchat::adapters::http::{app_router, AppState};
use webchat::application::{StreamingHub, StreamingSettings};
use webchat::domain::foundation::ConversationId;
use webchat::domain::profile::{ChatProfile, ProfileCatalog};
use webchat::domain::transcript::BlockRole;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn test_app(chunk_delay: Duration) -> (Router, Arc<StreamingHub>) {
    let bus = Arc::new(InMemoryEventBus::new());
    let engines = Arc::new(EchoEngineFactory::new(EchoEngineConfig {
        chunk_delay,
        ..Default::default()
    }));
    let tools = Arc::new(InMemoryToolRegistry::with_builtin_tools());
    let hub = Arc::new(StreamingHub::new(
        bus,
        engines,
        tools,
        StreamingSettings::default(),
    ));
    let profiles = ProfileCatalog::new([
        ChatProfile::default(),
        ChatProfile::new("agent", "You are a helpful assistant. Be concise.").unwrap(),
    ]);
    (
        app_router(AppState::new(hub.clone(), 64).with_profiles(profiles), &[]),
        hub,
    )
}

fn post_chat(body: Value) -> Request<Body> {
    post_chat_to("/chat", body)
}

fn post_chat_to(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn conversation_profile(hub: &StreamingHub, conv_id: &str) -> String {
    let id = ConversationId::new(conv_id).unwrap();
    let conv = hub.registry().get(&id).await.expect("conversation registered");
    conv.profile().to_string()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn wait_until_idle(hub: &StreamingHub, conv_id: &str) {
    let id = ConversationId::new(conv_id).unwrap();
    let conv = hub.registry().get(&id).await.expect("conversation registered");
    tokio::time::timeout(Duration::from_secs(5), async {
        while conv.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("run finished");
}

// =============================================================================
// POST /chat
// =============================================================================

#[tokio::test]
async fn chat_admits_run_for_given_conversation() {
    let (app, hub) = test_app(Duration::ZERO);

    let (status, body) = send(&app, post_chat(json!({"prompt": "hi", "conv_id": "c1"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conv_id"], "c1");
    assert!(!body["run_id"].as_str().unwrap().is_empty());
    assert_eq!(hub.registry().len().await, 1);
}

#[tokio::test]
async fn chat_generates_conversation_id_when_empty() {
    let (app, _hub) = test_app(Duration::ZERO);

    let (status, body) = send(&app, post_chat(json!({"prompt": "hi", "conv_id": ""}))).await;
    assert_eq!(status, StatusCode::OK);
    let generated = body["conv_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let (_, other) = send(&app, post_chat(json!({"prompt": "hi"}))).await;
    assert_ne!(other["conv_id"], body["conv_id"]);
}

#[tokio::test]
async fn concurrent_submission_is_rejected_with_conflict() {
    let (app, hub) = test_app(Duration::from_millis(100));

    let (status, first) = send(
        &app,
        post_chat(json!({"prompt": "one two three four five", "conv_id": "busy"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, conflict) =
        send(&app, post_chat(json!({"prompt": "again", "conv_id": "busy"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        conflict,
        json!({"error": "run in progress", "conv_id": "busy", "run_id": first["run_id"]})
    );

    // The rejected prompt must not have touched the transcript
    let conv = hub
        .registry()
        .get(&ConversationId::new("busy").unwrap())
        .await
        .unwrap();
    assert!(conv
        .transcript()
        .blocks()
        .iter()
        .all(|b| b.text != "again"));
}

#[tokio::test]
async fn conversation_accepts_new_run_after_previous_finishes() {
    let (app, hub) = test_app(Duration::ZERO);

    let (status, first) = send(&app, post_chat(json!({"prompt": "hi", "conv_id": "c2"}))).await;
    assert_eq!(status, StatusCode::OK);
    wait_until_idle(&hub, "c2").await;

    let (status, second) =
        send(&app, post_chat(json!({"prompt": "hello", "conv_id": "c2"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["run_id"], second["run_id"]);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (app, _hub) = test_app(Duration::ZERO);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn missing_prompt_is_bad_request() {
    let (app, _hub) = test_app(Duration::ZERO);

    let (status, _) = send(&app, post_chat(json!({"conv_id": "c3"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post_chat(json!({"prompt": "   ", "conv_id": "c3"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_only_accepts_post() {
    let (app, _hub) = test_app(Duration::ZERO);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/chat")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Profiles
// =============================================================================

#[tokio::test]
async fn profiles_are_listed_with_default_prompts() {
    let (app, _hub) = test_app(Duration::ZERO);

    let request = Request::builder()
        .uri("/api/chat/profiles")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"slug": "agent", "default_prompt": "You are a helpful assistant. Be concise."},
            {"slug": "default", "default_prompt": "You are an assistant"}
        ])
    );
}

#[tokio::test]
async fn chat_without_profile_uses_default() {
    let (app, hub) = test_app(Duration::ZERO);

    let (status, _) = send(&app, post_chat(json!({"prompt": "hi", "conv_id": "plain"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversation_profile(&hub, "plain").await, "default");
}

#[tokio::test]
async fn profile_in_path_selects_engine_preset() {
    let (app, hub) = test_app(Duration::ZERO);

    let (status, body) = send(
        &app,
        post_chat_to("/chat/agent", json!({"prompt": "hi", "conv_id": "p1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conv_id"], "p1");
    assert_eq!(conversation_profile(&hub, "p1").await, "agent");

    wait_until_idle(&hub, "p1").await;
    let conv = hub
        .registry()
        .get(&ConversationId::new("p1").unwrap())
        .await
        .unwrap();
    let first = conv.transcript().blocks()[0].clone();
    assert_eq!(first.role, BlockRole::System);
    assert_eq!(first.text, "You are a helpful assistant. Be concise.");
}

#[tokio::test]
async fn profile_query_parameter_selects_profile() {
    let (app, hub) = test_app(Duration::ZERO);

    let (status, _) = send(
        &app,
        post_chat_to("/chat?profile=agent", json!({"prompt": "hi", "conv_id": "q1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversation_profile(&hub, "q1").await, "agent");
}

#[tokio::test]
async fn profile_cookie_selects_profile() {
    let (app, hub) = test_app(Duration::ZERO);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "theme=dark; chat_profile=agent")
        .body(Body::from(json!({"prompt": "hi", "conv_id": "k1"}).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversation_profile(&hub, "k1").await, "agent");
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let (app, hub) = test_app(Duration::ZERO);

    let (status, body) = send(
        &app,
        post_chat_to("/chat/nope", json!({"prompt": "hi", "conv_id": "u1"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PROFILE_NOT_FOUND");
    assert_eq!(body["details"]["profile"], "nope");
    assert_eq!(hub.registry().len().await, 0);
}

#[tokio::test]
async fn system_prompt_override_replaces_profile_prompt() {
    let (app, hub) = test_app(Duration::ZERO);

    let (status, _) = send(
        &app,
        post_chat_to(
            "/chat/agent",
            json!({
                "prompt": "hi",
                "conv_id": "o1",
                "overrides": {"system_prompt": "Answer in French."}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    wait_until_idle(&hub, "o1").await;

    let conv = hub
        .registry()
        .get(&ConversationId::new("o1").unwrap())
        .await
        .unwrap();
    let blocks = conv.transcript().blocks().to_vec();
    assert_eq!(blocks[0].role, BlockRole::System);
    assert_eq!(blocks[0].text, "Answer in French.");
    assert_eq!(blocks.iter().filter(|b| b.role == BlockRole::System).count(), 1);
}
