//! API routes.

pub mod export;
pub mod health;
pub mod ingest;
pub mod stats;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/track", post(ingest::ingest_handler))
        .route("/track/beacon", post(ingest::beacon_handler))
        .route("/stats/pages/:page_id", get(stats::page_stats_handler))
        .route(
            "/stats/pages/:page_id/components",
            get(stats::component_stats_handler),
        )
        .route(
            "/stats/pages/:page_id/components/:component_id/significance",
            get(stats::significance_handler),
        )
        .route("/export/events", get(export::export_events_handler))
        .route("/export/aggregates", get(export::export_aggregates_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
