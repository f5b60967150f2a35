//! Durable keyed stats store and batch aggregation for the split engine.

pub mod aggregate;
pub mod query;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use aggregate::{Aggregator, IngestReport};
pub use query::{
    component_stats_view, page_stats_view, significance_report, ComponentStatsView,
    PageStatsView, SignificanceReport,
};
pub use stats::{ComponentCounter, ComponentStats, DailyCounters, PageStats};
pub use store::{MemoryStore, StatsStore};
