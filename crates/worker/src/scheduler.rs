//! Worker scheduler for background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

use stats_store::StatsStore;

use crate::expiry::ExpiryWorker;
use crate::snapshot::SnapshotWorker;

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Session expiry sweep interval
    pub expiry_interval: Duration,
    /// Store persistence interval
    pub snapshot_interval: Duration,
    /// Metrics log interval
    pub metrics_flush_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            expiry_interval: Duration::from_secs(3600), // 1 hour
            snapshot_interval: Duration::from_secs(60), // 1 minute
            metrics_flush_interval: Duration::from_secs(60), // 1 minute
        }
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    store: Arc<dyn StatsStore>,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig, store: Arc<dyn StatsStore>) -> Self {
        Self { config, store }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        // Session expiry worker
        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_expiry_worker().await;
        }));

        // Snapshot worker
        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_snapshot_worker().await;
        }));

        // Metrics flush worker
        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_flush().await;
        }));

        info!("Background workers started");
        handles
    }

    async fn run_expiry_worker(&self) {
        let worker = ExpiryWorker::new(self.store.clone());
        let mut ticker = interval(self.config.expiry_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = worker.run().await {
                error!("Expiry worker error: {}", e);
            }
        }
    }

    async fn run_snapshot_worker(&self) {
        let worker = SnapshotWorker::new(self.store.clone());
        let mut ticker = interval(self.config.snapshot_interval);

        loop {
            ticker.tick().await;

            // Failures already logged and counted by the worker.
            let _ = worker.run().await;
        }
    }

    async fn run_metrics_flush(&self) {
        use telemetry::metrics;

        let mut ticker = interval(self.config.metrics_flush_interval);

        loop {
            ticker.tick().await;

            if let Ok(count) = self.store.session_count().await {
                metrics().tracked_sessions.set(count as u64);
            }

            let snapshot = metrics().snapshot();
            info!(
                batches_received = snapshot.batches_received,
                events_received = snapshot.events_received,
                events_aggregated = snapshot.events_aggregated,
                events_failed_validation = snapshot.events_failed_validation,
                tracked_sessions = snapshot.tracked_sessions,
                sessions_expired = snapshot.sessions_expired,
                ingest_latency_mean_ms = snapshot.ingest_latency_mean_ms,
                "metrics snapshot"
            );
        }
    }
}
