//! Common test setup functions.

use api::{router, AppState};
use axum::Router;
use stats_store::{MemoryStore, StatsStore};
use std::sync::Arc;
use telemetry::health;

/// Test context exercising the production code paths:
/// the real axum router with all layers, over an in-memory store the test
/// can inspect directly.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone() as Arc<dyn StatsStore>);
        let router = router(state);

        // Readiness probes consult the global registry.
        health().store.set_healthy();
        health().workers.set_healthy();

        Self { store, router }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
