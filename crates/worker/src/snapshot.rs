//! Snapshot worker: periodically flushes the store to its durable medium.

use std::sync::Arc;
use tracing::{debug, error};

use split_core::Result;
use stats_store::StatsStore;
use telemetry::metrics;

/// Periodically persists buffered store state.
pub struct SnapshotWorker {
    store: Arc<dyn StatsStore>,
}

impl SnapshotWorker {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    /// Run one persistence pass.
    pub async fn run(&self) -> Result<()> {
        match self.store.persist().await {
            Ok(()) => {
                debug!("store state persisted");
                metrics().snapshots_written.inc();
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to persist store state");
                metrics().snapshot_errors.inc();
                Err(e)
            }
        }
    }
}
