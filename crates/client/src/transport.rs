//! Delivery transports for the client pipeline.

use async_trait::async_trait;
use serde::Serialize;
use split_core::{Error, Result, TrackingEvent};
use std::time::Duration;
use tracing::debug;

/// Seam between the pipeline and the ingestion boundary.
///
/// `deliver` is the normal awaited path. `beacon` is the teardown path: it
/// must dispatch without blocking and its outcome is never observed.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a batch to the ingestion endpoint.
    async fn deliver(&self, events: &[TrackingEvent]) -> Result<()>;

    /// Fire-and-forget delivery for page teardown. Returns false when the
    /// transport cannot dispatch without blocking, in which case the caller
    /// falls back to a best-effort awaited send.
    fn beacon(&self, events: Vec<TrackingEvent>) -> bool;
}

#[derive(Serialize)]
struct BatchBody<'a> {
    events: &'a [TrackingEvent],
}

#[derive(Serialize)]
struct OwnedBatchBody {
    events: Vec<TrackingEvent>,
}

/// HTTP transport posting batches to the ingestion service.
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport for the given ingestion base URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, events: &[TrackingEvent]) -> Result<()> {
        let url = format!("{}/track", self.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&BatchBody { events })
            .send()
            .await
            .map_err(|e| Error::delivery(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::delivery(format!(
                "ingestion endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    fn beacon(&self, events: Vec<TrackingEvent>) -> bool {
        // Dispatch on the current runtime and forget the handle; teardown
        // must not wait on the response.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };

        let url = format!("{}/track/beacon", self.endpoint);
        let client = self.client.clone();

        handle.spawn(async move {
            if let Err(e) = client.post(&url).json(&OwnedBatchBody { events }).send().await {
                debug!(error = %e, "beacon delivery failed");
            }
        });

        true
    }
}
