//! Sensitive-field scrubbing.
//!
//! Scrubbing happens at enqueue time, not transmit time, so a sensitive
//! value never sits in the buffer in cleartext.

use serde_json::Value;
use split_core::TrackingEvent;
use std::collections::HashMap;

/// Denylist substrings matched case-insensitively against payload keys.
const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "card",
    "cvv",
    "cvc",
    "ssn",
    "secret",
    "token",
    "credential",
];

/// Replacement marker for scrubbed values.
pub const REDACTED: &str = "[redacted]";

/// Whether a payload key matches the denylist.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| key.contains(p))
}

/// Replace the values of denylisted keys in a payload map.
pub fn scrub_payload(payload: &mut HashMap<String, Value>) {
    for (key, value) in payload.iter_mut() {
        if is_sensitive_key(key) {
            *value = Value::String(REDACTED.to_string());
        }
    }
}

/// Scrub an event's payload in place before it enters the queue.
pub fn scrub_event(event: &mut TrackingEvent) {
    scrub_payload(&mut event.payload);
}
