//! Tracking event types and per-event batch validation.
//!
//! Events arrive as camelCase JSON from the client pipeline. Parsing and
//! validation happen per event so one malformed entry never aborts the
//! surrounding batch; failures are collected and reported alongside the
//! events that did commit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use validator::Validate;

use crate::error::{Error, Result};
use crate::limits::MAX_EVENT_DATA_BYTES;
use crate::session::Variant;

/// All recognized tracking event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PageView,
    ComponentView,
    ComponentHide,
    Click,
    Scroll,
    FormSubmit,
    Conversion,
    Custom,
    Exit,
}

impl EventKind {
    /// Returns the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "page-view",
            Self::ComponentView => "component-view",
            Self::ComponentHide => "component-hide",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::FormSubmit => "form-submit",
            Self::Conversion => "conversion",
            Self::Custom => "custom",
            Self::Exit => "exit",
        }
    }

    /// Critical kinds force an immediate client-side flush.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Conversion | Self::FormSubmit)
    }

    /// Kinds that must carry a component ID and variant.
    pub fn requires_component(&self) -> bool {
        matches!(self, Self::ComponentView | Self::ComponentHide | Self::Click)
    }
}

/// Payload key identifying what kind of conversion an event records.
pub const CONVERSION_TYPE_KEY: &str = "conversionType";

/// A single interaction event, tagged with its session and variant context.
///
/// Created by the client pipeline, consumed exactly once by aggregation;
/// never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Owning page.
    #[validate(length(min = 1, max = 128))]
    pub page_id: String,

    /// Session this event belongs to.
    #[validate(length(min = 1, max = 128))]
    pub session_id: String,

    /// Unix timestamp in milliseconds.
    pub timestamp: i64,

    /// Component the event refers to, when component-scoped.
    #[validate(length(min = 1, max = 128))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,

    /// Variant shown when the event fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,

    /// Free-form event payload (form fields, conversion type, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub payload: HashMap<String, Value>,

    /// Free-form client metadata (url, referrer, scroll depth, durations).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl TrackingEvent {
    /// Creates an event with empty payload and metadata.
    pub fn new(
        kind: EventKind,
        page_id: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            kind,
            page_id: page_id.into(),
            session_id: session_id.into(),
            timestamp,
            component_id: None,
            variant: None,
            payload: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Attaches component context.
    pub fn with_component(mut self, component_id: impl Into<String>, variant: Variant) -> Self {
        self.component_id = Some(component_id.into());
        self.variant = Some(variant);
        self
    }

    /// Reads an integer metadata field.
    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }

    /// Reads a float metadata field.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    /// Reads a string metadata field.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Validate a tracking event beyond what serde enforces structurally.
pub fn validate_event(event: &TrackingEvent) -> Result<()> {
    event
        .validate()
        .map_err(|e| Error::validation(e.to_string()))?;

    if event.page_id.is_empty() {
        return Err(Error::missing_field("pageId"));
    }
    if event.session_id.is_empty() {
        return Err(Error::missing_field("sessionId"));
    }
    if event.timestamp <= 0 {
        return Err(Error::validation(
            "timestamp must be a positive epoch-milliseconds value",
        ));
    }

    if event.kind.requires_component() {
        if event.component_id.is_none() {
            return Err(Error::missing_field("componentId"));
        }
        if event.variant.is_none() {
            return Err(Error::missing_field("variant"));
        }
    }

    if event.kind == EventKind::Conversion && !event.payload.contains_key(CONVERSION_TYPE_KEY) {
        return Err(Error::missing_field("payload.conversionType"));
    }

    let payload_size = serde_json::to_vec(&event.payload).map(|v| v.len()).unwrap_or(0);
    if payload_size > MAX_EVENT_DATA_BYTES {
        return Err(Error::validation(format!(
            "payload {}KB exceeds {}KB limit",
            payload_size / 1024,
            MAX_EVENT_DATA_BYTES / 1024
        )));
    }

    Ok(())
}

/// Ingestion request body: `{ "events": [...] }`.
///
/// Events are kept as raw JSON values so each one is parsed and validated
/// independently.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRequest {
    pub events: Vec<Value>,
}

impl TrackRequest {
    /// Parse the request body. A structurally invalid body (not an object
    /// with an `events` array) is a batch-level error.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::validation(format!("invalid request body: {}", e)))
    }
}

/// Decode a batch of raw events, validating each independently.
///
/// Returns the decoded events plus one error per rejected entry. A rejected
/// event never aborts the rest of the batch.
pub fn decode_batch(raw: Vec<Value>) -> (Vec<TrackingEvent>, Vec<Error>) {
    let mut events = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for (i, value) in raw.into_iter().enumerate() {
        let event: TrackingEvent = match serde_json::from_value(value) {
            Ok(event) => event,
            Err(e) => {
                errors.push(Error::validation(format!("event[{}]: {}", i, e)));
                continue;
            }
        };

        match validate_event(&event) {
            Ok(()) => events.push(event),
            Err(e) => errors.push(Error::validation(format!("event[{}]: {}", i, e))),
        }
    }

    (events, errors)
}
