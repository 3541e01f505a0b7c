//! Tests for the error envelope: status codes and machine-readable
//! error codes across the domain taxonomy.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{body_json, build_test_app, clerk_headers, doc_approval_body, get, send_json};

#[tokio::test]
async fn missing_actor_header_is_bad_request() {
    let app = build_test_app();
    let response = send_json(
        app,
        "POST",
        "/api/v1/definitions",
        |b| b, // no identity headers
        doc_approval_body(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["error"].as_str().unwrap().contains("x-actor-id"));
}

#[tokio::test]
async fn unknown_definition_returns_not_found_envelope() {
    let app = build_test_app();
    let response = get(
        app,
        "/api/v1/definitions/00000000-0000-0000-0000-000000000000",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unknown_instance_returns_not_found_envelope() {
    let app = build_test_app();
    let response = get(
        app,
        "/api/v1/instances/00000000-0000-0000-0000-000000000000/history",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn overlong_definition_name_is_rejected_before_the_engine() {
    let app = build_test_app();
    let mut body = doc_approval_body();
    body["name"] = json!("x".repeat(300));

    let response = send_json(app, "POST", "/api/v1/definitions", clerk_headers, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn verify_on_untouched_partition_reports_valid_empty_chain() {
    let app = build_test_app();
    let response = get(app, "/api/v1/audit/nothing-here/verify").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["chain_valid"], true);
    assert_eq!(json["data"]["verified_entries"], 0);
}
