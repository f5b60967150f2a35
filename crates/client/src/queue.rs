//! Bounded event queue with ring-buffer semantics.

use parking_lot::Mutex;
use split_core::TrackingEvent;
use std::collections::VecDeque;

/// In-process bounded queue. When capacity is exceeded the oldest entries
/// are dropped first: recency is prioritized over completeness.
pub struct EventQueue {
    inner: Mutex<VecDeque<TrackingEvent>>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueue an event, dropping the oldest entries past capacity.
    /// Returns the number of events dropped.
    pub fn push(&self, event: TrackingEvent) -> usize {
        let mut queue = self.inner.lock();
        queue.push_back(event);

        let mut dropped = 0;
        while queue.len() > self.capacity {
            queue.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Push a failed batch back to the front, so it is retried before newer
    /// events. Still subject to the capacity cap: when the combined length
    /// exceeds it, the oldest (re-queued) entries are dropped first.
    pub fn requeue_front(&self, batch: Vec<TrackingEvent>) -> usize {
        let mut queue = self.inner.lock();
        for event in batch.into_iter().rev() {
            queue.push_front(event);
        }

        let mut dropped = 0;
        while queue.len() > self.capacity {
            queue.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Take all queued events.
    pub fn drain(&self) -> Vec<TrackingEvent> {
        let mut queue = self.inner.lock();
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
