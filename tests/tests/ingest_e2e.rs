//! End-to-end ingestion tests: batches in through the real router,
//! aggregates verified through the stats read surface.

use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};
use stats_store::StatsStore;

#[tokio::test]
async fn test_batch_ingest_reflects_in_page_stats() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![
        fixtures::page_view("sess-1"),
        fixtures::page_view("sess-1"),
        fixtures::page_view("sess-2"),
        fixtures::conversion("sess-2"),
    ];

    let response = server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["processedCount"], 4);
    assert!(body.get("errors").is_none());

    let stats = server.get("/stats/pages/page-1").await;
    stats.assert_status_ok();
    let stats: serde_json::Value = stats.json();
    assert_eq!(stats["views"], 3);
    assert_eq!(stats["uniqueVisitors"], 2);
    assert_eq!(stats["conversions"], 1);
    // 3 views, 1 conversion
    assert!((stats["conversionRate"].as_f64().unwrap() - 33.333).abs() < 0.01);
}

#[tokio::test]
async fn test_component_events_roll_up_per_variant() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![
        fixtures::component_event("component-view", "sess-1", "hero", "a"),
        fixtures::component_event("component-view", "sess-2", "hero", "a"),
        fixtures::component_event("component-view", "sess-3", "hero", "b"),
        fixtures::component_event("click", "sess-3", "hero", "b"),
    ];

    server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await
        .assert_status_ok();

    let response = server
        .get("/stats/pages/page-1/components")
        .add_query_param("componentId", "hero")
        .await;
    response.assert_status_ok();

    let rows: serde_json::Value = response.json();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let a = rows.iter().find(|r| r["variant"] == "a").unwrap();
    let b = rows.iter().find(|r| r["variant"] == "b").unwrap();
    assert_eq!(a["views"], 2);
    assert_eq!(b["views"], 1);
    assert_eq!(b["clicks"], 1);
    assert_eq!(b["clickThroughRate"], 100.0);
}

#[tokio::test]
async fn test_replayed_batch_doubles_counters() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![
        fixtures::component_event("component-view", "sess-1", "hero", "a"),
        fixtures::component_event("component-view", "sess-2", "hero", "a"),
    ];
    let payload = fixtures::batch(events);

    for _ in 0..2 {
        server
            .post("/track")
            .content_type("application/json")
            .bytes(payload.clone().into())
            .await
            .assert_status_ok();
    }

    let rows = ctx.store.component_stats("page-1", Some("hero")).await.unwrap();
    assert_eq!(
        rows[0].views, 4,
        "at-least-once delivery: replay doubles the single-batch delta"
    );
}

#[tokio::test]
async fn test_exit_event_updates_session() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![fixtures::page_view("sess-9"), fixtures::exit_event("sess-9")];
    server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await
        .assert_status_ok();

    let session = ctx.store.session("sess-9").await.unwrap().unwrap();
    assert_eq!(session.time_on_page_ms, Some(30_000));
    assert_eq!(session.max_scroll_depth, Some(75.0));
}

#[tokio::test]
async fn test_beacon_endpoint_aggregates_asynchronously() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![fixtures::page_view("sess-5"), fixtures::exit_event("sess-5")];
    let response = server
        .post("/track/beacon")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await;

    response.assert_status(axum::http::StatusCode::ACCEPTED);

    // Aggregation runs in a detached task; give it a moment.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let session = ctx.store.session("sess-5").await.unwrap().unwrap();
    assert_eq!(session.page_views, 1);
    assert_eq!(session.time_on_page_ms, Some(30_000));
}

#[tokio::test]
async fn test_export_events_json_and_csv() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![
        fixtures::component_event("component-view", "sess-1", "hero", "a"),
        fixtures::component_event("click", "sess-1", "hero", "a"),
    ];
    server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await
        .assert_status_ok();

    let json = server
        .get("/export/events")
        .add_query_param("pageId", "page-1")
        .await;
    json.assert_status_ok();
    let body: serde_json::Value = json.json();
    assert_eq!(body["pageId"], "page-1");
    assert_eq!(body["events"].as_array().unwrap().len(), 2);

    let csv = server
        .get("/export/events")
        .add_query_param("pageId", "page-1")
        .add_query_param("format", "csv")
        .await;
    csv.assert_status_ok();
    let text = csv.text();
    assert!(text.starts_with("type,pageId,sessionId,timestamp"));
    assert_eq!(text.lines().count(), 3, "header plus two rows");
}

#[tokio::test]
async fn test_export_aggregates() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![
        fixtures::page_view("sess-1"),
        fixtures::component_event("component-view", "sess-1", "hero", "b"),
    ];
    server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await
        .assert_status_ok();

    let response = server
        .get("/export/aggregates")
        .add_query_param("pageId", "page-1")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["page"]["views"], 1);
    assert_eq!(body["components"][0]["componentId"], "hero");
    assert_eq!(body["components"][0]["variant"], "b");
}
