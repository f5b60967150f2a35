//! Full client-to-server path: the client pipeline delivers through its
//! transport seam into the real router, and the aggregates land in the
//! store.

use async_trait::async_trait;
use axum_test::TestServer;
use std::sync::Arc;

use client_pipeline::{PageContext, Pipeline, PipelineConfig, SessionManager, Transport, VariantOverrides};
use integration_tests::setup::TestContext;
use split_core::{
    EventKind, Result as CoreResult, Error, TrackingEvent, CONVERSION_TYPE_KEY,
};
use stats_store::StatsStore;

/// Transport that posts batches straight into the test server's router.
struct ServerTransport {
    server: Arc<TestServer>,
}

#[async_trait]
impl Transport for ServerTransport {
    async fn deliver(&self, events: &[TrackingEvent]) -> CoreResult<()> {
        let body = serde_json::to_vec(&serde_json::json!({ "events": events }))?;

        let response = self
            .server
            .post("/track")
            .content_type("application/json")
            .bytes(body.into())
            .await;

        if response.status_code() != 200 {
            return Err(Error::delivery(format!(
                "ingestion endpoint returned {}",
                response.status_code()
            )));
        }
        Ok(())
    }

    fn beacon(&self, _events: Vec<TrackingEvent>) -> bool {
        false
    }
}

#[tokio::test]
async fn test_pipeline_delivers_into_aggregates() {
    let ctx = TestContext::new();
    let server = Arc::new(TestServer::new(ctx.router.clone()).expect("Failed to create test server"));

    let transport = Arc::new(ServerTransport {
        server: server.clone(),
    });
    let pipeline = Pipeline::new(PipelineConfig::default(), transport);

    // A visitor arrives and gets a stable variant for the hero component.
    let manager = SessionManager::without_stores();
    let ctx_page = PageContext::new("page-1", "Mozilla/5.0 (Windows NT 10.0; Win64; x64)");
    let mut session = manager.get_or_create(&ctx_page);
    let variant = manager.variant_for(&mut session, "hero", &VariantOverrides::default());

    pipeline.track(TrackingEvent::new(
        EventKind::PageView,
        &session.page_id,
        &session.id,
        1_704_067_200_000,
    ));
    pipeline.observe_component(&session, "hero", variant, 0.8);

    let mut conversion = TrackingEvent::new(
        EventKind::Conversion,
        &session.page_id,
        &session.id,
        1_704_067_260_000,
    )
    .with_component("hero", variant);
    conversion
        .payload
        .insert(CONVERSION_TYPE_KEY.into(), serde_json::json!("signup"));
    pipeline.track(conversion);

    pipeline.flush(true).await.expect("flush should deliver");

    // Everything the pipeline sent is now aggregated server-side.
    let page = ctx.store.page_stats("page-1").await.unwrap().unwrap();
    assert_eq!(page.views, 1);
    assert_eq!(page.conversions, 1);

    let rows = ctx.store.component_stats("page-1", Some("hero")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].variant, variant);
    assert_eq!(rows[0].views, 1);
    assert_eq!(rows[0].conversions, 1);

    let stored = ctx.store.session(&session.id).await.unwrap().unwrap();
    assert!(stored.converted);
}
