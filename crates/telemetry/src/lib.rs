//! Internal telemetry for the split engine.
//!
//! Metrics stay in-process and surface through structured log snapshots;
//! there is no external metrics system dependency.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
