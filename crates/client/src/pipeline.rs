//! Client event pipeline: buffering, flush triggers, and teardown delivery.
//!
//! A pipeline instance owns its queue, timer handle, and configuration, and
//! is injected into call sites; there is no module-level mutable state. All
//! queue mutation runs on the page's own execution context, so a forced
//! flush racing a periodic flush over an empty queue is a no-op, not an
//! error.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

use split_core::{EventKind, Result, Session, TrackingEvent, Variant};

use crate::config::PipelineConfig;
use crate::observer::{VisibilityObserver, VisibilityTransition};
use crate::queue::EventQueue;
use crate::scrub;
use crate::transport::{HttpTransport, Transport};

/// Metadata keys stamped onto synthesized exit events.
const META_TIME_ON_PAGE: &str = "timeOnPage";
const META_MAX_SCROLL_DEPTH: &str = "maxScrollDepth";
const META_SCROLL_DEPTH: &str = "scrollDepth";

/// Buffers interaction events and flushes them to the ingestion boundary.
pub struct Pipeline {
    config: PipelineConfig,
    queue: EventQueue,
    transport: Arc<dyn Transport>,
    observer: Mutex<VisibilityObserver>,
    /// Wakes the flush task for size-triggered and critical flushes.
    flush_signal: Notify,
    /// Serializes concurrent flushes; the loser sees an empty queue.
    flush_guard: tokio::sync::Mutex<()>,
    started_at: Instant,
    max_scroll_depth: Mutex<f64>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            queue: EventQueue::new(config.max_queue_size),
            observer: Mutex::new(VisibilityObserver::new(
                config.visibility_threshold,
                config.track_hides,
            )),
            config,
            transport,
            flush_signal: Notify::new(),
            flush_guard: tokio::sync::Mutex::new(()),
            started_at: Instant::now(),
            max_scroll_depth: Mutex::new(0.0),
        }
    }

    /// Pipeline wired to the HTTP transport at the configured endpoint.
    pub fn with_http_transport(config: PipelineConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(config.endpoint.clone()));
        Self::new(config, transport)
    }

    /// Enqueue an event. Sensitive payload fields are scrubbed before the
    /// event enters the buffer; conversion and form-submit events request an
    /// immediate flush.
    pub fn track(&self, mut event: TrackingEvent) {
        scrub::scrub_event(&mut event);

        if event.kind == EventKind::Scroll {
            if let Some(depth) = event.metadata_f64(META_SCROLL_DEPTH) {
                self.record_scroll_depth(depth);
            }
        }

        let critical = event.kind.is_critical();
        let dropped = self.queue.push(event);
        if dropped > 0 {
            debug!(dropped, "queue at capacity, dropped oldest events");
        }

        if critical || self.queue.len() >= self.config.batch_size {
            self.flush_signal.notify_one();
        }
    }

    /// Feed a component's visibility ratio; view/hide transitions become
    /// tracked events tagged with the session's variant context.
    pub fn observe_component(
        &self,
        session: &Session,
        component_id: &str,
        variant: Variant,
        visible_ratio: f64,
    ) {
        let transition = self.observer.lock().observe(component_id, visible_ratio);

        let kind = match transition {
            Some(VisibilityTransition::Shown) => EventKind::ComponentView,
            Some(VisibilityTransition::Hidden) => EventKind::ComponentHide,
            None => return,
        };

        let event = TrackingEvent::new(kind, &session.page_id, &session.id, now_ms())
            .with_component(component_id, variant);
        self.track(event);
    }

    /// Record an observed scroll depth percentage for the exit summary.
    pub fn record_scroll_depth(&self, depth_pct: f64) {
        let mut max = self.max_scroll_depth.lock();
        if depth_pct > *max {
            *max = depth_pct;
        }
    }

    /// Deliver everything currently queued.
    ///
    /// Without `force`, the flush is skipped while the queue is below the
    /// batch-size threshold (the periodic timer and critical events always
    /// force). On delivery failure the batch returns to the front of the
    /// queue, bounded by its capacity; there is no retry loop beyond the
    /// periodic cadence.
    pub async fn flush(&self, force: bool) -> Result<()> {
        let _guard = self.flush_guard.lock().await;

        if !force && self.queue.len() < self.config.batch_size {
            return Ok(());
        }

        let batch = self.queue.drain();
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        match self.transport.deliver(&batch).await {
            Ok(()) => {
                debug!(count, "flushed batch");
                Ok(())
            }
            Err(e) => {
                warn!(count, error = %e, "delivery failed, re-queueing batch");
                self.queue.requeue_front(batch);
                Err(e)
            }
        }
    }

    /// Starts the periodic flush task. The task also services forced-flush
    /// wakeups from critical events and size triggers.
    pub fn start_flush_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pipeline = self.clone();

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(pipeline.config.flush_interval_ms));
            // The first tick completes immediately; skip it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = pipeline.flush_signal.notified() => {}
                }

                // Errors were already re-queued; tracking never propagates
                // failures into the host page.
                let _ = pipeline.flush(true).await;
            }
        })
    }

    /// Page teardown: synthesize an `exit` event carrying time-on-page and
    /// max scroll depth, and hand the remaining buffer to the fire-and-forget
    /// transport. Falls back to a best-effort awaited send; that path may
    /// still fail silently, the one intentionally lossy edge of the
    /// pipeline.
    pub async fn page_teardown(&self, session: &Session) {
        let mut exit = TrackingEvent::new(EventKind::Exit, &session.page_id, &session.id, now_ms());
        exit.metadata.insert(
            META_TIME_ON_PAGE.into(),
            serde_json::json!(self.started_at.elapsed().as_millis() as i64),
        );
        exit.metadata.insert(
            META_MAX_SCROLL_DEPTH.into(),
            serde_json::json!(*self.max_scroll_depth.lock()),
        );

        let mut batch = self.queue.drain();
        batch.push(exit);

        if !self.transport.beacon(batch.clone()) {
            if let Err(e) = self.transport.deliver(&batch).await {
                debug!(error = %e, "teardown fallback delivery failed");
            }
        }
    }

    #[cfg(test)]
    fn queued(&self) -> usize {
        self.queue.len()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockTransport;
    use serde_json::json;
    use split_core::{DeviceClass, CONVERSION_TYPE_KEY};

    fn pipeline_with(config: PipelineConfig) -> (Arc<Pipeline>, MockTransport) {
        let transport = MockTransport::new();
        let pipeline = Arc::new(Pipeline::new(config, Arc::new(transport.clone())));
        (pipeline, transport)
    }

    fn click(n: usize) -> TrackingEvent {
        TrackingEvent::new(EventKind::Click, "page-1", format!("sess-{}", n), n as i64 + 1)
            .with_component("hero", Variant::A)
    }

    fn conversion() -> TrackingEvent {
        let mut event = TrackingEvent::new(EventKind::Conversion, "page-1", "sess-1", 1);
        event.payload.insert(CONVERSION_TYPE_KEY.into(), json!("signup"));
        event
    }

    #[tokio::test]
    async fn test_queue_is_bounded() {
        let (pipeline, _transport) = pipeline_with(PipelineConfig {
            max_queue_size: 10,
            batch_size: 1000,
            ..Default::default()
        });

        for i in 0..25 {
            pipeline.track(click(i));
        }

        assert_eq!(pipeline.queued(), 10);
    }

    #[tokio::test]
    async fn test_critical_event_forces_flush() {
        let (pipeline, transport) = pipeline_with(PipelineConfig {
            batch_size: 50,
            flush_interval_ms: 60_000,
            ..Default::default()
        });
        let _task = pipeline.start_flush_task();

        pipeline.track(click(0));
        pipeline.track(conversion());

        tokio::time::sleep(Duration::from_millis(50)).await;

        let delivered = transport.delivered();
        assert_eq!(delivered.len(), 1, "conversion should flush within a tick");
        assert_eq!(delivered[0].len(), 2);
    }

    #[tokio::test]
    async fn test_batch_size_triggers_flush() {
        let (pipeline, transport) = pipeline_with(PipelineConfig {
            batch_size: 3,
            flush_interval_ms: 60_000,
            ..Default::default()
        });
        let _task = pipeline.start_flush_task();

        for i in 0..3 {
            pipeline.track(click(i));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_returns_to_front() {
        let (pipeline, transport) = pipeline_with(PipelineConfig::default());
        transport.set_should_fail(true);

        pipeline.track(click(0));
        pipeline.track(click(1));
        assert!(pipeline.flush(true).await.is_err());
        assert_eq!(pipeline.queued(), 2, "failed batch re-queued");

        transport.set_should_fail(false);
        pipeline.track(click(2));
        pipeline.flush(true).await.unwrap();

        let delivered = transport.delivered();
        assert_eq!(delivered[0][0].session_id, "sess-0", "retried before newer events");
        assert_eq!(delivered[0].len(), 3);
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue_is_noop() {
        let (pipeline, transport) = pipeline_with(PipelineConfig::default());

        pipeline.flush(true).await.unwrap();
        pipeline.flush(false).await.unwrap();

        assert!(transport.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_unforced_flush_waits_for_batch_size() {
        let (pipeline, transport) = pipeline_with(PipelineConfig {
            batch_size: 5,
            ..Default::default()
        });

        pipeline.track(click(0));
        pipeline.flush(false).await.unwrap();
        assert!(transport.delivered().is_empty());

        pipeline.flush(true).await.unwrap();
        assert_eq!(transport.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_scrub_happens_before_enqueue() {
        let (pipeline, transport) = pipeline_with(PipelineConfig {
            batch_size: 50,
            ..Default::default()
        });

        let mut event = TrackingEvent::new(EventKind::FormSubmit, "page-1", "sess-1", 1);
        event.payload.insert("password".into(), json!("x"));
        event.payload.insert("email".into(), json!("a@b.com"));
        pipeline.track(event);

        pipeline.flush(true).await.unwrap();
        let delivered = transport.delivered();
        let serialized = serde_json::to_string(&delivered[0]).unwrap();
        assert!(!serialized.contains("\"x\""), "cleartext value must never be buffered");
        assert!(serialized.contains("a@b.com"));
    }

    #[tokio::test]
    async fn test_visibility_transitions_become_events() {
        let (pipeline, transport) = pipeline_with(PipelineConfig {
            batch_size: 50,
            track_hides: true,
            ..Default::default()
        });
        let session = Session::new("page-1", DeviceClass::Desktop, "Chrome");

        pipeline.observe_component(&session, "hero", Variant::B, 0.2);
        pipeline.observe_component(&session, "hero", Variant::B, 0.7);
        pipeline.observe_component(&session, "hero", Variant::B, 0.9);
        pipeline.observe_component(&session, "hero", Variant::B, 0.1);

        pipeline.flush(true).await.unwrap();
        let batch = &transport.delivered()[0];
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].kind, EventKind::ComponentView);
        assert_eq!(batch[0].variant, Some(Variant::B));
        assert_eq!(batch[1].kind, EventKind::ComponentHide);
    }

    #[tokio::test]
    async fn test_teardown_synthesizes_exit_via_beacon() {
        let (pipeline, transport) = pipeline_with(PipelineConfig::default());
        let session = Session::new("page-1", DeviceClass::Desktop, "Chrome");

        pipeline.record_scroll_depth(40.0);
        pipeline.record_scroll_depth(85.0);
        pipeline.record_scroll_depth(60.0);
        pipeline.track(click(0));
        pipeline.page_teardown(&session).await;

        let beacons = transport.beaconed();
        assert_eq!(beacons.len(), 1);
        let batch = &beacons[0];
        assert_eq!(batch.len(), 2);

        let exit = batch.last().unwrap();
        assert_eq!(exit.kind, EventKind::Exit);
        assert_eq!(exit.metadata_f64("maxScrollDepth"), Some(85.0));
        assert!(exit.metadata_i64("timeOnPage").is_some());
    }

    #[tokio::test]
    async fn test_teardown_falls_back_when_beacon_unavailable() {
        let (pipeline, transport) = pipeline_with(PipelineConfig::default());
        transport.set_beacon_available(false);
        let session = Session::new("page-1", DeviceClass::Desktop, "Chrome");

        pipeline.page_teardown(&session).await;

        assert!(transport.beaconed().is_empty());
        let delivered = transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].last().unwrap().kind, EventKind::Exit);
    }
}
