//! Session expiry worker.
//!
//! Sessions are never deleted by the aggregation path; they leave the store
//! only when their sliding 30-day activity window elapses. This worker is
//! the server-side face of that window.

use std::sync::Arc;
use tracing::{debug, info};

use split_core::Result;
use stats_store::StatsStore;
use telemetry::metrics;

/// Sweeps sessions idle past the sliding expiry window.
pub struct ExpiryWorker {
    store: Arc<dyn StatsStore>,
}

impl ExpiryWorker {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    /// Run one sweep.
    pub async fn run(&self) -> Result<()> {
        let removed = self.store.expire_sessions().await?;

        if removed > 0 {
            info!(removed, "expired idle sessions");
            metrics().sessions_expired.inc_by(removed as u64);
        } else {
            debug!("no sessions past the expiry window");
        }

        Ok(())
    }
}
