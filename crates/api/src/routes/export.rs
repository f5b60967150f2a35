//! Bulk export surface: raw event records and aggregates, as structured
//! JSON or row-oriented CSV, filterable by page.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use split_core::TrackingEvent;
use stats_store::{component_stats_view, page_stats_view, ComponentStatsView, PageStatsView};

use crate::response::ApiError;
use crate::state::AppState;

/// Cap on exported event rows per request.
const EXPORT_EVENT_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub page_id: String,
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsExport {
    page_id: String,
    events: Vec<TrackingEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregatesExport {
    page_id: String,
    page: Option<PageStatsView>,
    components: Vec<ComponentStatsView>,
}

/// GET /export/events?pageId=&format=json|csv
pub async fn export_events_handler(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let events = state
        .store()
        .events_for_page(&query.page_id, EXPORT_EVENT_LIMIT)
        .await?;

    match query.format {
        ExportFormat::Json => Ok(Json(EventsExport {
            page_id: query.page_id,
            events,
        })
        .into_response()),
        ExportFormat::Csv => Ok(csv_response(events_csv(&events))),
    }
}

/// GET /export/aggregates?pageId=&format=json|csv
pub async fn export_aggregates_handler(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let page = page_stats_view(state.store(), &query.page_id).await?;
    let components = component_stats_view(state.store(), &query.page_id, None).await?;

    match query.format {
        ExportFormat::Json => Ok(Json(AggregatesExport {
            page_id: query.page_id,
            page,
            components,
        })
        .into_response()),
        ExportFormat::Csv => Ok(csv_response(aggregates_csv(&components))),
    }
}

fn events_csv(events: &[TrackingEvent]) -> String {
    let mut out = String::from(
        "type,pageId,sessionId,timestamp,componentId,variant,payload,metadata\n",
    );

    for event in events {
        let payload = serde_json::to_string(&event.payload).unwrap_or_else(|_| "{}".into());
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_else(|_| "{}".into());

        let fields = [
            event.kind.as_str().to_string(),
            event.page_id.clone(),
            event.session_id.clone(),
            event.timestamp.to_string(),
            event.component_id.clone().unwrap_or_default(),
            event.variant.map(|v| v.as_str().to_string()).unwrap_or_default(),
            payload,
            metadata,
        ];
        push_row(&mut out, &fields);
    }

    out
}

fn aggregates_csv(components: &[ComponentStatsView]) -> String {
    let mut out = String::from(
        "componentId,variant,views,clicks,conversions,clickThroughRate,conversionRate,lastUpdated\n",
    );

    for row in components {
        let fields = [
            row.stats.component_id.clone(),
            row.stats.variant.as_str().to_string(),
            row.stats.views.to_string(),
            row.stats.clicks.to_string(),
            row.stats.conversions.to_string(),
            format!("{:.4}", row.click_through_rate),
            format!("{:.4}", row.conversion_rate),
            row.stats.last_updated.to_rfc3339(),
        ];
        push_row(&mut out, &fields);
    }

    out
}

fn push_row(out: &mut String, fields: &[String]) {
    let row: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_response(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use split_core::{EventKind, Variant};

    #[test]
    fn test_csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_events_csv_shape() {
        let event = TrackingEvent::new(EventKind::Click, "page-1", "sess-1", 42)
            .with_component("hero", Variant::B);

        let csv = events_csv(&[event]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "type,pageId,sessionId,timestamp,componentId,variant,payload,metadata"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("click,page-1,sess-1,42,hero,b,"));
    }
}
