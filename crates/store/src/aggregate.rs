//! Batch ingestion and aggregation.
//!
//! Each incoming batch is validated per event, partitioned by event kind,
//! and folded concurrently: partitions write disjoint aggregate families,
//! and shared counter keys are incremented under the store's per-key locks.
//!
//! At-least-once tolerance: counters are pure increments. A replayed batch
//! increases counts again; no dedup key is assumed, and callers are
//! responsible for not re-submitting the same batch twice.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use split_core::{decode_batch, Error, EventKind, Result, TrackingEvent, Variant};

use crate::stats::ComponentCounter;
use crate::store::StatsStore;

/// Outcome of ingesting one batch: how many events committed, and the
/// per-event validation errors for the rest.
#[derive(Debug)]
pub struct IngestReport {
    pub processed_count: usize,
    pub errors: Vec<String>,
}

/// Folds validated batches into the stats store.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn StatsStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn StatsStore> {
        &self.store
    }

    /// Ingest a batch of raw events.
    ///
    /// Validation failures skip the event and land in the report's errors;
    /// they never abort the batch. A store failure aborts with an
    /// aggregation error; partitions already committed stay committed,
    /// which is safe because every fold is a commutative increment.
    pub async fn ingest(&self, raw: Vec<Value>) -> Result<IngestReport> {
        let (events, validation_errors) = decode_batch(raw);
        let errors: Vec<String> = validation_errors.iter().map(|e| e.to_string()).collect();

        if !errors.is_empty() {
            warn!(rejected = errors.len(), "batch contained invalid events");
        }

        let mut partitions: HashMap<EventKind, Vec<TrackingEvent>> = HashMap::new();
        for event in events {
            partitions.entry(event.kind).or_default().push(event);
        }

        let mut tasks = Vec::with_capacity(partitions.len());
        for (kind, partition) in partitions {
            let store = self.store.clone();
            tasks.push(tokio::spawn(async move {
                fold_partition(store, kind, partition).await
            }));
        }

        let mut processed_count = 0;
        for task in tasks {
            let folded = task
                .await
                .map_err(|e| Error::aggregation(format!("partition task failed: {}", e)))??;
            processed_count += folded;
        }

        debug!(processed = processed_count, "batch aggregated");
        Ok(IngestReport {
            processed_count,
            errors,
        })
    }
}

/// Apply one kind's folding rule to its partition.
async fn fold_partition(
    store: Arc<dyn StatsStore>,
    kind: EventKind,
    events: Vec<TrackingEvent>,
) -> Result<usize> {
    let count = events.len();

    match kind {
        EventKind::PageView => {
            for event in &events {
                store
                    .apply_page_view(event)
                    .await
                    .map_err(to_aggregation_error)?;
            }
        }

        EventKind::ComponentView | EventKind::Click => {
            let counter = if kind == EventKind::Click {
                ComponentCounter::Clicks
            } else {
                ComponentCounter::Views
            };

            // One counter increment per distinct (componentId, variant),
            // by the count observed in this batch.
            let mut counts: HashMap<(String, String, Variant), (u64, i64)> = HashMap::new();
            for event in events {
                // Validation guarantees both fields for these kinds.
                let (Some(component_id), Some(variant)) =
                    (event.component_id.clone(), event.variant)
                else {
                    continue;
                };

                let entry = counts
                    .entry((event.page_id.clone(), component_id, variant))
                    .or_insert((0, event.timestamp));
                entry.0 += 1;
                entry.1 = entry.1.max(event.timestamp);

                store
                    .append_event(event)
                    .await
                    .map_err(to_aggregation_error)?;
            }

            for ((page_id, component_id, variant), (by, timestamp)) in counts {
                store
                    .incr_component(&page_id, &component_id, variant, counter, by, timestamp)
                    .await
                    .map_err(to_aggregation_error)?;
            }
        }

        EventKind::Conversion => {
            for event in events {
                store
                    .apply_conversion(&event)
                    .await
                    .map_err(to_aggregation_error)?;

                if let (Some(component_id), Some(variant)) = (&event.component_id, event.variant) {
                    store
                        .incr_component(
                            &event.page_id,
                            component_id,
                            variant,
                            ComponentCounter::Conversions,
                            1,
                            event.timestamp,
                        )
                        .await
                        .map_err(to_aggregation_error)?;
                }

                store
                    .append_event(event)
                    .await
                    .map_err(to_aggregation_error)?;
            }
        }

        EventKind::Exit => {
            for event in events {
                store.apply_exit(&event).await.map_err(to_aggregation_error)?;
                store
                    .append_event(event)
                    .await
                    .map_err(to_aggregation_error)?;
            }
        }

        // Everything else gets a generic event record only.
        EventKind::ComponentHide
        | EventKind::Scroll
        | EventKind::FormSubmit
        | EventKind::Custom => {
            for event in events {
                store
                    .append_event(event)
                    .await
                    .map_err(to_aggregation_error)?;
            }
        }
    }

    Ok(count)
}

fn to_aggregation_error(e: Error) -> Error {
    match e {
        Error::Aggregation(_) => e,
        other => Error::aggregation(other.to_string()),
    }
}
