//! Internal metrics collection.
//!
//! Counters accumulate in-process and are periodically logged by the
//! metrics worker as structured snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s
    buckets: [AtomicU64; 10],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 10] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.buckets[Self::BUCKET_BOUNDS.len() - 1].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }
}

/// Collected metrics for the split engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion metrics
    pub batches_received: Counter,
    pub beacon_batches_received: Counter,
    pub events_received: Counter,
    pub events_aggregated: Counter,
    pub events_failed_validation: Counter,
    pub aggregation_errors: Counter,

    // Session lifecycle
    pub sessions_expired: Counter,

    // Snapshot persistence
    pub snapshots_written: Counter,
    pub snapshot_errors: Counter,

    // Latency histograms
    pub ingest_latency_ms: Histogram,

    // Gauges
    pub tracked_sessions: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            batches_received: self.batches_received.get(),
            beacon_batches_received: self.beacon_batches_received.get(),
            events_received: self.events_received.get(),
            events_aggregated: self.events_aggregated.get(),
            events_failed_validation: self.events_failed_validation.get(),
            aggregation_errors: self.aggregation_errors.get(),
            sessions_expired: self.sessions_expired.get(),
            snapshots_written: self.snapshots_written.get(),
            snapshot_errors: self.snapshot_errors.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            tracked_sessions: self.tracked_sessions.get(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub batches_received: u64,
    pub beacon_batches_received: u64,
    pub events_received: u64,
    pub events_aggregated: u64,
    pub events_failed_validation: u64,
    pub aggregation_errors: u64,
    pub sessions_expired: u64,
    pub snapshots_written: u64,
    pub snapshot_errors: u64,
    pub ingest_latency_mean_ms: f64,
    pub tracked_sessions: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
