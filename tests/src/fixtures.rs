//! Test fixtures and event generators.

use chrono::Utc;
use uuid::Uuid;

/// Default page used across fixtures.
pub const PAGE_ID: &str = "page-1";

/// Generate a valid page-view event JSON.
pub fn page_view(session_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "page-view",
        "pageId": PAGE_ID,
        "sessionId": session_id,
        "timestamp": Utc::now().timestamp_millis(),
    })
}

/// Generate a component-scoped event JSON.
pub fn component_event(
    kind: &str,
    session_id: &str,
    component_id: &str,
    variant: &str,
) -> serde_json::Value {
    serde_json::json!({
        "type": kind,
        "pageId": PAGE_ID,
        "sessionId": session_id,
        "timestamp": Utc::now().timestamp_millis(),
        "componentId": component_id,
        "variant": variant,
    })
}

/// Generate a conversion event with the required typed payload.
pub fn conversion(session_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "conversion",
        "pageId": PAGE_ID,
        "sessionId": session_id,
        "timestamp": Utc::now().timestamp_millis(),
        "payload": { "conversionType": "signup" },
    })
}

/// Generate an exit event carrying teardown metadata.
pub fn exit_event(session_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "exit",
        "pageId": PAGE_ID,
        "sessionId": session_id,
        "timestamp": Utc::now().timestamp_millis(),
        "metadata": { "timeOnPage": 30_000, "maxScrollDepth": 75.0 },
    })
}

/// Generate N page-view events with fresh session ids.
pub fn page_views(n: usize) -> Vec<serde_json::Value> {
    (0..n)
        .map(|_| page_view(&Uuid::new_v4().to_string()))
        .collect()
}

/// Wrap events in the ingestion request shape.
pub fn batch(events: Vec<serde_json::Value>) -> String {
    serde_json::json!({ "events": events }).to_string()
}
