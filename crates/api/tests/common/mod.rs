//! Shared helpers for the API integration tests.
//!
//! Mirrors the router construction in `main.rs` so tests exercise the
//! same middleware stack (CORS, request ID, timeout, tracing, panic
//! recovery) that production uses, wired to a fresh in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use conclave_api::config::ServerConfig;
use conclave_api::router::build_app_router;
use conclave_api::state::AppState;
use conclave_engine::{
    AuditChain, DefaultVoterAuthorizer, SideEffectRunner, WorkflowEngine,
};
use conclave_events::{BusDispatcher, NotificationBus, NullDocumentCollaborator};
use conclave_store::MemoryStore;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        sla_sweep_interval_secs: 60,
    }
}

/// Build the full application router over a fresh in-memory store.
pub fn build_test_app() -> Router {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(NotificationBus::default());

    let chain = AuditChain::new(store.clone());
    let effects = SideEffectRunner::new(
        Arc::new(BusDispatcher::new(bus.clone())),
        Arc::new(NullDocumentCollaborator),
    );
    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        store.clone(),
        chain,
        effects,
        Arc::new(DefaultVoterAuthorizer),
    ));

    let state = AppState {
        engine,
        bus,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Identity headers for a clerk-level actor.
pub fn clerk_headers(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder
        .header("x-actor-id", "clerk-1")
        .header("x-actor-name", "Casey Clerk")
        .header("x-actor-roles", "Clerk")
}

/// Identity headers for a board member.
pub fn board_headers(
    builder: axum::http::request::Builder,
    id: &str,
) -> axum::http::request::Builder {
    builder
        .header("x-actor-id", id)
        .header("x-actor-roles", "Board")
}

/// Send a GET request (no actor headers).
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a GET request with clerk identity headers.
pub async fn get_as_clerk(app: Router, uri: &str) -> Response<Body> {
    let request = clerk_headers(Request::builder().uri(uri))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a request with a JSON body and the given method and headers.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    builder_fn: impl FnOnce(axum::http::request::Builder) -> axum::http::request::Builder,
    body: serde_json::Value,
) -> Response<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = builder_fn(builder)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Request body for a minimal document approval definition:
/// draft -> pending-review -> approved/rejected, with Board-gated
/// approve/reject transitions that require a comment.
pub fn doc_approval_body() -> serde_json::Value {
    serde_json::json!({
        "name": "Document Approval",
        "category": "policies",
        "states": [
            { "id": "draft", "label": "Draft", "is_initial": true },
            { "id": "pending-review", "label": "Pending Review" },
            { "id": "approved", "label": "Approved", "is_final": true },
            { "id": "rejected", "label": "Rejected", "is_final": true }
        ],
        "transitions": [
            { "id": "submit", "from": "draft", "to": "pending-review" },
            {
                "id": "approve",
                "from": "pending-review",
                "to": "approved",
                "required_roles": ["Board"],
                "requires_comment": true
            },
            {
                "id": "reject",
                "from": "pending-review",
                "to": "rejected",
                "required_roles": ["Board"],
                "requires_comment": true
            }
        ]
    })
}
