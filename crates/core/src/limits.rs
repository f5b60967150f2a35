//! Size limits and tunable defaults for the split engine.
//!
//! Batch limits bound the ingestion endpoint's working set; pipeline defaults
//! match the documented configuration knobs. The `#[validate]` derive macro
//! requires literal values in attributes, so field limits are duplicated
//! there. Keep both in sync when modifying.

// === Batch limits ===

/// Maximum batch payload size in bytes (1MB).
pub const MAX_BATCH_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum events per ingested batch.
pub const MAX_BATCH_EVENTS: usize = 1000;

/// Maximum serialized payload/metadata map size per event in bytes (16KB).
pub const MAX_EVENT_DATA_BYTES: usize = 16 * 1024;

// === String field limits (chars) ===

/// Page, session, and component identifier max length.
pub const MAX_ID_LEN: usize = 128;

/// Browser label max length.
pub const MAX_BROWSER_LEN: usize = 64;

/// Attribution source/campaign max length.
pub const MAX_ATTRIBUTION_LEN: usize = 256;

// === Client pipeline defaults ===

/// Events accumulated before a size-triggered flush.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Periodic flush cadence in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Bounded queue capacity; oldest events are dropped beyond this.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 100;

/// Visibility ratio at which a component counts as viewed.
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

// === Significance defaults ===

/// Confidence level at which a difference is reported as significant.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Samples required per arm before a test result is meaningful.
pub const MIN_SAMPLE_SIZE: u64 = 10;

// === Session lifetime ===

/// Sliding session expiry window in days.
pub const SESSION_TTL_DAYS: i64 = 30;
