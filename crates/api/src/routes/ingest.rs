//! Ingestion endpoint handlers.
//!
//! `/track` is the primary endpoint: it validates per event, commits the
//! valid ones, and reports the rest in `errors[]`. `/track/beacon` accepts
//! the same shape for teardown-time exit events: it acknowledges
//! immediately and aggregates in a detached task, so an unloading page is
//! never kept waiting.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use split_core::limits::{MAX_BATCH_EVENTS, MAX_BATCH_SIZE_BYTES};
use split_core::TrackRequest;
use telemetry::metrics;

use crate::response::{ApiError, TrackResponse};
use crate::state::AppState;

/// POST /track - primary batch ingestion endpoint.
pub async fn ingest_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TrackResponse>, ApiError> {
    let start = Instant::now();

    metrics().batches_received.inc();

    // Check payload size before parsing
    if body.len() > MAX_BATCH_SIZE_BYTES {
        return Err(ApiError::bad_request(format!(
            "payload size {}KB exceeds {}KB limit",
            body.len() / 1024,
            MAX_BATCH_SIZE_BYTES / 1024
        )));
    }

    let request = TrackRequest::parse(&body).map_err(|e| {
        debug!(error = %e, "rejected malformed batch");
        ApiError::bad_request(e.to_string())
    })?;

    if request.events.is_empty() {
        return Err(ApiError::bad_request("batch must contain at least one event"));
    }

    let total_events = request.events.len();
    if total_events > MAX_BATCH_EVENTS {
        return Err(ApiError::bad_request(format!(
            "batch has {} events, exceeds {} limit",
            total_events, MAX_BATCH_EVENTS
        )));
    }

    metrics().events_received.inc_by(total_events as u64);

    let report = state.aggregator.ingest(request.events).await.map_err(|e| {
        error!(error = %e, "aggregation failed");
        metrics().aggregation_errors.inc();
        ApiError::internal("failed to process events")
    })?;

    let rejected = report.errors.len();
    if rejected > 0 {
        warn!(
            accepted = report.processed_count,
            rejected = rejected,
            "some events failed validation"
        );
        metrics().events_failed_validation.inc_by(rejected as u64);
    }
    metrics()
        .events_aggregated
        .inc_by(report.processed_count as u64);

    let latency_ms = start.elapsed().as_millis() as u64;
    metrics().ingest_latency_ms.observe(latency_ms);

    info!(
        accepted = report.processed_count,
        rejected = rejected,
        latency_ms = latency_ms,
        "batch processed"
    );

    Ok(Json(TrackResponse::from_report(report)))
}

/// POST /track/beacon - best-effort ingestion for teardown-time events.
///
/// Always acknowledges with 202; parse and aggregation failures are logged,
/// never reported back, since there is nobody left on the page to read them.
pub async fn beacon_handler(State(state): State<AppState>, body: Bytes) -> StatusCode {
    metrics().beacon_batches_received.inc();

    let request = match TrackRequest::parse(&body) {
        Ok(request) if !request.events.is_empty() => request,
        Ok(_) => return StatusCode::ACCEPTED,
        Err(e) => {
            debug!(error = %e, "discarded malformed beacon payload");
            return StatusCode::ACCEPTED;
        }
    };

    let aggregator = state.aggregator.clone();
    tokio::spawn(async move {
        match aggregator.ingest(request.events).await {
            Ok(report) => {
                metrics()
                    .events_aggregated
                    .inc_by(report.processed_count as u64);
                if !report.errors.is_empty() {
                    metrics()
                        .events_failed_validation
                        .inc_by(report.errors.len() as u64);
                }
            }
            Err(e) => {
                warn!(error = %e, "beacon aggregation failed");
                metrics().aggregation_errors.inc();
            }
        }
    });

    StatusCode::ACCEPTED
}
