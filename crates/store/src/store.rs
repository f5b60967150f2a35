//! Keyed stats store: trait seam plus the in-memory implementation.
//!
//! Every fold the aggregator performs is a pure increment applied under the
//! owning map's lock, so concurrent batches touching the same popular
//! component never read-modify-write without isolation. The trait is the
//! seam for swapping in a different durable backend.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{info, warn};

use split_core::{DeviceClass, Result, Session, TrackingEvent, Variant};

use crate::snapshot::{self, SnapshotData};
use crate::stats::{ComponentCounter, ComponentStats, PageStats};

/// Metadata keys the aggregator reads off events.
const META_USER_AGENT: &str = "userAgent";
const META_TIME_ON_PAGE: &str = "timeOnPage";
const META_MAX_SCROLL_DEPTH: &str = "maxScrollDepth";

/// Durable keyed store for sessions, counters, and raw event records.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Fold a page-view: upsert the session (create on first sight, else
    /// increment) and the owning page's view counters.
    async fn apply_page_view(&self, event: &TrackingEvent) -> Result<()>;

    /// Atomically increment one component counter.
    async fn incr_component(
        &self,
        page_id: &str,
        component_id: &str,
        variant: Variant,
        counter: ComponentCounter,
        by: u64,
        timestamp_ms: i64,
    ) -> Result<()>;

    /// Fold a conversion: page counters plus the monotonic session flag and
    /// earliest conversion timestamp.
    async fn apply_conversion(&self, event: &TrackingEvent) -> Result<()>;

    /// Fold an exit: session activity, time-on-page, and max scroll depth.
    async fn apply_exit(&self, event: &TrackingEvent) -> Result<()>;

    /// Append a raw per-event record for event-level analysis and export.
    async fn append_event(&self, event: TrackingEvent) -> Result<()>;

    async fn page_stats(&self, page_id: &str) -> Result<Option<PageStats>>;

    /// Component counter rows for a page, optionally narrowed to one
    /// component. Sorted by component then variant for stable output.
    async fn component_stats(
        &self,
        page_id: &str,
        component_id: Option<&str>,
    ) -> Result<Vec<ComponentStats>>;

    async fn session(&self, session_id: &str) -> Result<Option<Session>>;

    async fn sessions_for_page(&self, page_id: &str) -> Result<Vec<Session>>;

    async fn events_for_page(&self, page_id: &str, limit: usize) -> Result<Vec<TrackingEvent>>;

    /// Drop sessions idle past the sliding 30-day window.
    /// Returns the number removed.
    async fn expire_sessions(&self) -> Result<usize>;

    /// Number of session records currently tracked.
    async fn session_count(&self) -> Result<usize>;

    /// Flush buffered state to the durable medium. Backends that write
    /// through on every fold have nothing to do here.
    async fn persist(&self) -> Result<()> {
        Ok(())
    }
}

type ComponentKey = (String, String, Variant);

/// In-memory store. Each aggregate family lives behind its own lock;
/// locks are taken one at a time and increments commute, so partitions can
/// fold concurrently.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
    page_sessions: Mutex<HashMap<String, HashSet<String>>>,
    pages: Mutex<HashMap<String, PageStats>>,
    components: Mutex<HashMap<ComponentKey, ComponentStats>>,
    events: Mutex<Vec<TrackingEvent>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot file: loaded now if present, written
    /// by `persist`. An unreadable snapshot starts the store empty rather
    /// than refusing to serve.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self::new();

        match snapshot::load_snapshot(&path) {
            Ok(Some(data)) => {
                info!(path = %path.display(), "loaded stats snapshot");
                store.import(data);
            }
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "snapshot unreadable, starting empty"),
        }

        store.snapshot_path = Some(path);
        store
    }

    /// Write the current state to the snapshot file, if one is configured.
    fn write_snapshot_file(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        snapshot::write_snapshot(path, &self.export())
    }

    fn import(&mut self, data: SnapshotData) {
        *self.sessions.lock() = data.sessions;
        *self.page_sessions.lock() = data.page_sessions;
        *self.pages.lock() = data.pages;
        *self.components.lock() = data
            .components
            .into_iter()
            .map(|c| ((c.page_id.clone(), c.component_id.clone(), c.variant), c))
            .collect();
        *self.events.lock() = data.events;
    }

    fn export(&self) -> SnapshotData {
        SnapshotData {
            sessions: self.sessions.lock().clone(),
            page_sessions: self.page_sessions.lock().clone(),
            pages: self.pages.lock().clone(),
            components: self.components.lock().values().cloned().collect(),
            events: self.events.lock().clone(),
        }
    }

    /// Create a server-side session record from the first event sighting.
    /// Timestamps come from the event, not the ingestion clock, so late
    /// batches do not inflate activity windows.
    fn session_from_event(event: &TrackingEvent) -> Session {
        let user_agent = event.metadata_str(META_USER_AGENT).unwrap_or_default();
        let device = DeviceClass::from_user_agent(user_agent);

        let mut session = Session::new(&event.page_id, device, "unknown");
        session.id = event.session_id.clone();
        if let Some(at) = Utc.timestamp_millis_opt(event.timestamp).single() {
            session.created_at = at;
            session.last_activity_at = at;
        }
        session
    }

    fn touch_session_activity(session: &mut Session, timestamp_ms: i64) {
        if let Some(at) = Utc.timestamp_millis_opt(timestamp_ms).single() {
            if at > session.last_activity_at {
                session.last_activity_at = at;
            }
        }
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn apply_page_view(&self, event: &TrackingEvent) -> Result<()> {
        let new_visitor = {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .entry(event.session_id.clone())
                .or_insert_with(|| Self::session_from_event(event));

            let first_sight = session.page_views == 0;
            session.page_views += 1;
            Self::touch_session_activity(session, event.timestamp);
            first_sight
        };

        if new_visitor {
            self.page_sessions
                .lock()
                .entry(event.page_id.clone())
                .or_default()
                .insert(event.session_id.clone());
        }

        let mut pages = self.pages.lock();
        let page = pages
            .entry(event.page_id.clone())
            .or_insert_with(|| PageStats::new(&event.page_id));
        page.record_view(event.timestamp);
        if new_visitor {
            page.unique_visitors += 1;
        }

        Ok(())
    }

    async fn incr_component(
        &self,
        page_id: &str,
        component_id: &str,
        variant: Variant,
        counter: ComponentCounter,
        by: u64,
        _timestamp_ms: i64,
    ) -> Result<()> {
        let key = (page_id.to_string(), component_id.to_string(), variant);

        let mut components = self.components.lock();
        components
            .entry(key)
            .or_insert_with(|| ComponentStats::new(page_id, component_id, variant))
            .incr(counter, by);

        Ok(())
    }

    async fn apply_conversion(&self, event: &TrackingEvent) -> Result<()> {
        {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .entry(event.session_id.clone())
                .or_insert_with(|| Self::session_from_event(event));
            session.mark_converted(event.timestamp);
            Self::touch_session_activity(session, event.timestamp);
        }

        let mut pages = self.pages.lock();
        pages
            .entry(event.page_id.clone())
            .or_insert_with(|| PageStats::new(&event.page_id))
            .record_conversion(event.timestamp);

        Ok(())
    }

    async fn apply_exit(&self, event: &TrackingEvent) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| Self::session_from_event(event));

        Self::touch_session_activity(session, event.timestamp);

        if let Some(time_on_page) = event.metadata_i64(META_TIME_ON_PAGE) {
            session.time_on_page_ms = Some(time_on_page);
        }
        if let Some(depth) = event.metadata_f64(META_MAX_SCROLL_DEPTH) {
            let current = session.max_scroll_depth.unwrap_or(0.0);
            session.max_scroll_depth = Some(current.max(depth));
        }

        Ok(())
    }

    async fn append_event(&self, event: TrackingEvent) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }

    async fn page_stats(&self, page_id: &str) -> Result<Option<PageStats>> {
        Ok(self.pages.lock().get(page_id).cloned())
    }

    async fn component_stats(
        &self,
        page_id: &str,
        component_id: Option<&str>,
    ) -> Result<Vec<ComponentStats>> {
        let components = self.components.lock();
        let mut rows: Vec<ComponentStats> = components
            .values()
            .filter(|stats| stats.page_id == page_id)
            .filter(|stats| component_id.map_or(true, |id| stats.component_id == id))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            (a.component_id.as_str(), a.variant.as_str())
                .cmp(&(b.component_id.as_str(), b.variant.as_str()))
        });
        Ok(rows)
    }

    async fn session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().get(session_id).cloned())
    }

    async fn sessions_for_page(&self, page_id: &str) -> Result<Vec<Session>> {
        let ids = self
            .page_sessions
            .lock()
            .get(page_id)
            .cloned()
            .unwrap_or_default();

        let sessions = self.sessions.lock();
        Ok(ids
            .iter()
            .filter_map(|id| sessions.get(id).cloned())
            .collect())
    }

    async fn events_for_page(&self, page_id: &str, limit: usize) -> Result<Vec<TrackingEvent>> {
        let events = self.events.lock();
        Ok(events
            .iter()
            .filter(|e| e.page_id == page_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn expire_sessions(&self) -> Result<usize> {
        let expired: Vec<(String, String)> = {
            let sessions = self.sessions.lock();
            sessions
                .values()
                .filter(|s| s.is_expired())
                .map(|s| (s.id.clone(), s.page_id.clone()))
                .collect()
        };

        {
            let mut sessions = self.sessions.lock();
            for (id, _) in &expired {
                sessions.remove(id);
            }
        }

        let mut page_sessions = self.page_sessions.lock();
        for (id, page_id) in &expired {
            if let Some(ids) = page_sessions.get_mut(page_id) {
                ids.remove(id);
            }
        }

        Ok(expired.len())
    }

    async fn session_count(&self) -> Result<usize> {
        Ok(self.sessions.lock().len())
    }

    async fn persist(&self) -> Result<()> {
        self.write_snapshot_file()
    }
}
