//! Background workers for the split engine.

pub mod expiry;
pub mod scheduler;
pub mod snapshot;

pub use expiry::ExpiryWorker;
pub use scheduler::{WorkerConfig, WorkerScheduler};
pub use snapshot::SnapshotWorker;
