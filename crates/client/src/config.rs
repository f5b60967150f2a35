//! Client pipeline configuration.

use split_core::limits::{
    DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_VISIBILITY_THRESHOLD,
};

/// Configuration for one pipeline instance.
///
/// A pipeline is constructed explicitly and injected into call sites; there
/// is no process-wide pipeline state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PipelineConfig {
    /// Base URL of the ingestion service (e.g. "http://localhost:8080").
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Events accumulated before a size-triggered flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Periodic flush cadence in milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Bounded queue capacity; oldest events are dropped beyond this.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Visibility ratio at which a component counts as viewed.
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    /// Whether component-hide events fire on exit transitions.
    #[serde(default)]
    pub track_hides: bool,
}

fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

fn default_visibility_threshold() -> f64 {
    DEFAULT_VISIBILITY_THRESHOLD
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_queue_size: default_max_queue_size(),
            visibility_threshold: default_visibility_threshold(),
            track_hides: false,
        }
    }
}
