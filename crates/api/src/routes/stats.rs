//! Stats read surface for the reporting UI.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use stats_store::{
    component_stats_view, page_stats_view, significance_report, ComponentStatsView,
    PageStatsView, SignificanceReport,
};

use crate::response::ApiError;
use crate::state::AppState;

/// GET /stats/pages/:page_id - page counters plus derived rates and the
/// daily breakdown.
pub async fn page_stats_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Json<PageStatsView>, ApiError> {
    let view = page_stats_view(state.store(), &page_id).await?;

    view.map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no stats recorded for page {}", page_id)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatsQuery {
    pub component_id: Option<String>,
}

/// GET /stats/pages/:page_id/components - component counter rows with
/// derived rates, optionally narrowed with `?componentId=`.
pub async fn component_stats_handler(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Query(query): Query<ComponentStatsQuery>,
) -> Result<Json<Vec<ComponentStatsView>>, ApiError> {
    let rows =
        component_stats_view(state.store(), &page_id, query.component_id.as_deref()).await?;
    Ok(Json(rows))
}

/// GET /stats/pages/:page_id/components/:component_id/significance -
/// significance verdict plus a plain-language recommendation.
pub async fn significance_handler(
    State(state): State<AppState>,
    Path((page_id, component_id)): Path<(String, String)>,
) -> Result<Json<SignificanceReport>, ApiError> {
    let report = significance_report(
        state.store(),
        &page_id,
        &component_id,
        state.confidence_level,
    )
    .await?;
    Ok(Json(report))
}
