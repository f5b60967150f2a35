//! Error handling tests for the ingestion endpoint.
//!
//! A structurally broken batch is rejected whole; individually malformed
//! events are skipped and reported while the rest of the batch commits.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};
use stats_store::StatsStore;

#[tokio::test]
async fn test_invalid_json_returns_400() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/track")
        .content_type("application/json")
        .bytes("not json at all".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));
}

#[tokio::test]
async fn test_empty_batch_returns_400() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(vec![]).into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("at least one event"));
}

#[tokio::test]
async fn test_array_body_returns_400() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    // The endpoint takes `{ "events": [...] }`, not a bare array.
    let response = server
        .post("/track")
        .content_type("application/json")
        .bytes("[]".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_batch_returns_400() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(fixtures::page_views(1001)).into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("exceeds"));
}

#[tokio::test]
async fn test_invalid_events_skipped_valid_committed() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![
        fixtures::page_view("sess-1"),
        // Unrecognized type
        serde_json::json!({
            "type": "teleport", "pageId": "page-1", "sessionId": "s", "timestamp": 1i64
        }),
        // Click without component context
        serde_json::json!({
            "type": "click", "pageId": "page-1", "sessionId": "s", "timestamp": 1i64
        }),
        // Conversion without a typed payload
        serde_json::json!({
            "type": "conversion", "pageId": "page-1", "sessionId": "s", "timestamp": 1i64
        }),
        // Non-positive timestamp
        serde_json::json!({
            "type": "page-view", "pageId": "page-1", "sessionId": "s", "timestamp": 0i64
        }),
        fixtures::page_view("sess-2"),
    ];

    let response = server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["processedCount"], 2);
    assert_eq!(body["errors"].as_array().unwrap().len(), 4);

    // The valid events committed despite the rejects.
    let page = ctx.store.page_stats("page-1").await.unwrap().unwrap();
    assert_eq!(page.views, 2);
}

#[tokio::test]
async fn test_event_missing_required_field_reported() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![serde_json::json!({
        "type": "page-view", "sessionId": "s", "timestamp": 1i64
    })];

    let response = server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["processedCount"], 0);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("event[0]"));
}

#[tokio::test]
async fn test_unknown_page_stats_returns_404() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/stats/pages/never-seen").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("never-seen"));
}
