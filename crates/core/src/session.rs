//! Session and variant assignment types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::limits::SESSION_TTL_DAYS;

/// One of the two content alternatives shown to a visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    A,
    B,
}

impl Variant {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }

    /// The opposite variant.
    pub fn other(&self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Parses `a`/`b` (case-insensitive); anything else is None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device bucket derived from the visitor's user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

/// Tablet patterns checked before mobile patterns: tablet user agents
/// usually also contain a mobile marker.
const TABLET_PATTERNS: &[&str] = &["ipad", "tablet", "kindle", "silk", "playbook"];

const MOBILE_PATTERNS: &[&str] = &[
    "mobile",
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "windows phone",
    "opera mini",
];

impl DeviceClass {
    /// Classifies a user-agent string into one of the three buckets.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();

        if TABLET_PATTERNS.iter().any(|p| ua.contains(p)) {
            Self::Tablet
        } else if MOBILE_PATTERNS.iter().any(|p| ua.contains(p)) {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

/// Traffic attribution captured from the entry request, when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
}

/// A variant assignment for one component within a session.
///
/// `forced` marks assignments set through an explicit override rather than a
/// random draw, so analysis can exclude them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedVariant {
    pub variant: Variant,
    #[serde(default)]
    pub forced: bool,
}

/// A visitor's interaction lifecycle with a page.
///
/// Created on first contact. The session manager writes variant assignments;
/// the aggregator writes page-view counts, conversion state, and exit
/// metrics. Never deleted directly; it expires by a sliding 30-day window.
///
/// `persistent: false` marks an ephemeral session created when no durable
/// client store was available. Such sessions are scoped to a single page
/// load and must not be treated as real experiment samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Globally unique session ID (UUID v4 string).
    pub id: String,
    /// Owning page.
    pub page_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub device: DeviceClass,
    /// Browser label, "unknown" when unparseable.
    pub browser: String,
    #[serde(default)]
    pub attribution: Attribution,
    /// Component ID → assigned variant. Immutable once written, except for
    /// explicit overrides.
    #[serde(default)]
    pub assignments: HashMap<String, AssignedVariant>,
    #[serde(default)]
    pub page_views: u64,
    /// Monotonic: once true, never reverts.
    #[serde(default)]
    pub converted: bool,
    /// Earliest observed conversion timestamp (epoch millis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_on_page_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scroll_depth: Option<f64>,
    #[serde(default = "default_persistent")]
    pub persistent: bool,
}

fn default_persistent() -> bool {
    true
}

impl Session {
    /// Creates a new durable session.
    pub fn new(page_id: impl Into<String>, device: DeviceClass, browser: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            page_id: page_id.into(),
            created_at: now,
            last_activity_at: now,
            device,
            browser: browser.into(),
            attribution: Attribution::default(),
            assignments: HashMap::new(),
            page_views: 0,
            converted: false,
            converted_at: None,
            time_on_page_ms: None,
            max_scroll_depth: None,
            persistent: true,
        }
    }

    /// Creates an ephemeral session scoped to a single page load.
    pub fn ephemeral(
        page_id: impl Into<String>,
        device: DeviceClass,
        browser: impl Into<String>,
    ) -> Self {
        let mut session = Self::new(page_id, device, browser);
        session.persistent = false;
        session
    }

    /// Refreshes the sliding activity window.
    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    /// Whether the sliding 30-day window has elapsed.
    pub fn is_expired(&self) -> bool {
        Utc::now() - self.last_activity_at > Duration::days(SESSION_TTL_DAYS)
    }

    /// Looks up a previously persisted assignment.
    pub fn assignment(&self, component_id: &str) -> Option<AssignedVariant> {
        self.assignments.get(component_id).copied()
    }

    /// Records an assignment for a component.
    ///
    /// A plain draw never replaces an existing assignment: a visitor must
    /// not flip variants mid-test. Forced (override) assignments do replace,
    /// and stay marked as forced.
    pub fn assign(&mut self, component_id: &str, variant: Variant, forced: bool) -> AssignedVariant {
        use std::collections::hash_map::Entry;

        match self.assignments.entry(component_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if forced {
                    entry.insert(AssignedVariant { variant, forced });
                }
                *entry.get()
            }
            Entry::Vacant(entry) => *entry.insert(AssignedVariant { variant, forced }),
        }
    }

    /// Marks the session converted. Monotonic: the flag only ever sets, and
    /// the timestamp keeps the earliest value observed.
    pub fn mark_converted(&mut self, timestamp_ms: i64) {
        self.converted = true;
        self.converted_at = Some(match self.converted_at {
            Some(existing) => existing.min(timestamp_ms),
            None => timestamp_ms,
        });
    }
}
