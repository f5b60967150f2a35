//! Application state shared across handlers.

use std::sync::Arc;

use split_core::limits::DEFAULT_CONFIDENCE_LEVEL;
use stats_store::{Aggregator, StatsStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Batch aggregator over the stats store.
    pub aggregator: Aggregator,
    /// Confidence level used by the significance read surface.
    pub confidence_level: f64,
}

impl AppState {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            aggregator: Aggregator::new(store),
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
        }
    }

    /// Override the significance confidence level.
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn store(&self) -> &Arc<dyn StatsStore> {
        self.aggregator.store()
    }
}
