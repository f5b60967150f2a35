//! Stats read surface tests, including the significance endpoint's
//! insufficient-data vs no-difference distinction.

use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};
use split_core::Variant;
use stats_store::{ComponentCounter, StatsStore};

/// Seed decisive component tallies directly into the store.
async fn seed_component(
    ctx: &TestContext,
    component: &str,
    a: (u64, u64),
    b: (u64, u64),
) {
    for (variant, (views, conversions)) in [(Variant::A, a), (Variant::B, b)] {
        ctx.store
            .incr_component("page-1", component, variant, ComponentCounter::Views, views, 1)
            .await
            .unwrap();
        ctx.store
            .incr_component(
                "page-1",
                component,
                variant,
                ComponentCounter::Conversions,
                conversions,
                1,
            )
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_significance_insufficient_data() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    seed_component(&ctx, "hero", (5, 2), (5, 4)).await;

    let response = server
        .get("/stats/pages/page-1/components/hero/significance")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["isSignificant"], false);
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["insufficientData"], true);
    assert!(body["recommendation"]
        .as_str()
        .unwrap()
        .starts_with("Insufficient data"));
}

#[tokio::test]
async fn test_significance_no_difference_reads_differently() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    seed_component(&ctx, "hero", (1000, 100), (1000, 100)).await;

    let response = server
        .get("/stats/pages/page-1/components/hero/significance")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["isSignificant"], false);
    assert_eq!(body["insufficientData"], false);
    assert!(body["winningVariant"].is_null());
    assert!(body["recommendation"]
        .as_str()
        .unwrap()
        .contains("No significant difference"));
}

#[tokio::test]
async fn test_significance_detects_winner() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    seed_component(&ctx, "hero", (1000, 100), (1000, 150)).await;

    let response = server
        .get("/stats/pages/page-1/components/hero/significance")
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["isSignificant"], true);
    assert_eq!(body["winningVariant"], "b");
    let improvement = body["improvementRate"].as_f64().unwrap();
    assert!((improvement - 50.0).abs() < 0.5, "expected ~50%, got {}", improvement);
    assert!(body["recommendation"].as_str().unwrap().contains("Variant b"));
}

#[tokio::test]
async fn test_page_stats_include_daily_breakdown_and_bounce() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let events = vec![
        fixtures::page_view("sess-1"),
        fixtures::page_view("sess-1"),
        fixtures::page_view("sess-2"),
    ];
    server
        .post("/track")
        .content_type("application/json")
        .bytes(fixtures::batch(events).into())
        .await
        .assert_status_ok();

    let response = server.get("/stats/pages/page-1").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let daily = body["daily"].as_object().unwrap();
    assert_eq!(daily.len(), 1, "all views landed today");
    let today = daily.values().next().unwrap();
    assert_eq!(today["views"], 3);

    // sess-2 bounced (single page view), sess-1 did not.
    assert_eq!(body["bounceRate"], 50.0);
}

#[tokio::test]
async fn test_component_filter_narrows_rows() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");
    seed_component(&ctx, "hero", (10, 1), (10, 2)).await;
    seed_component(&ctx, "cta", (10, 1), (10, 2)).await;

    let all = server.get("/stats/pages/page-1/components").await;
    let all: serde_json::Value = all.json();
    assert_eq!(all.as_array().unwrap().len(), 4);

    let narrowed = server
        .get("/stats/pages/page-1/components")
        .add_query_param("componentId", "cta")
        .await;
    let narrowed: serde_json::Value = narrowed.json();
    let rows = narrowed.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["componentId"] == "cta"));
}
