//! Aggregate counter types.
//!
//! Counters are create-if-absent-else-increment and never decremented;
//! replaying a batch increments them again. Derived rates live on the
//! read-surface views, not on the stored counters.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use split_core::Variant;

/// Counter selector for component-level increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentCounter {
    Views,
    Clicks,
    Conversions,
}

/// Per-(component, variant) counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStats {
    pub page_id: String,
    pub component_id: String,
    pub variant: Variant,
    pub views: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub last_updated: DateTime<Utc>,
}

impl ComponentStats {
    pub fn new(page_id: impl Into<String>, component_id: impl Into<String>, variant: Variant) -> Self {
        Self {
            page_id: page_id.into(),
            component_id: component_id.into(),
            variant,
            views: 0,
            clicks: 0,
            conversions: 0,
            last_updated: Utc::now(),
        }
    }

    /// Apply an increment to the selected counter.
    pub fn incr(&mut self, counter: ComponentCounter, by: u64) {
        match counter {
            ComponentCounter::Views => self.views += by,
            ComponentCounter::Clicks => self.clicks += by,
            ComponentCounter::Conversions => self.conversions += by,
        }
        self.last_updated = Utc::now();
    }
}

/// One day's slice of page activity.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCounters {
    pub views: u64,
    pub conversions: u64,
}

/// Per-page counters with a date-keyed breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    pub page_id: String,
    pub views: u64,
    pub unique_visitors: u64,
    pub conversions: u64,
    pub last_updated: DateTime<Utc>,
    /// Date (YYYY-MM-DD) → counters for that day.
    #[serde(default)]
    pub daily: BTreeMap<String, DailyCounters>,
}

impl PageStats {
    pub fn new(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            views: 0,
            unique_visitors: 0,
            conversions: 0,
            last_updated: Utc::now(),
            daily: BTreeMap::new(),
        }
    }

    pub fn record_view(&mut self, timestamp_ms: i64) {
        self.views += 1;
        self.daily.entry(day_key(timestamp_ms)).or_default().views += 1;
        self.last_updated = Utc::now();
    }

    pub fn record_conversion(&mut self, timestamp_ms: i64) {
        self.conversions += 1;
        self.daily.entry(day_key(timestamp_ms)).or_default().conversions += 1;
        self.last_updated = Utc::now();
    }
}

/// UTC calendar day for an epoch-milliseconds timestamp.
pub fn day_key(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
