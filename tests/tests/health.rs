//! Health probe tests.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::setup::TestContext;

#[tokio::test]
async fn test_live_probe_always_ok() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server.get("/health/live").await.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_ready_probe_ok_when_store_healthy() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server.get("/health/ready").await.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_health_report_shape() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storeConnected"], true);
    assert_eq!(body["workersRunning"], true);
    assert!(body["eventsReceived"].is_u64());
}
