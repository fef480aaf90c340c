//! # Ingestion entry point
//! One path for both the queue consumer and the HTTP fallback:
//! decode → normalize → persist → broadcast. The broadcast step is
//! fire-and-forget; only decode, normalization, and persistence can fail an
//! ingestion.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::bus::ReadingBus;
use crate::error::{PipelineError, Result};
use crate::normalize::normalize_payload;
use crate::reading::StoredReading;
use crate::store::ReadingStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("weather_ingest_total", "Readings normalized and persisted.");
        describe_counter!(
            "weather_ingest_failures_total",
            "Ingestions rejected at decode/normalize/persist."
        );
        describe_counter!("weather_queue_ack_total", "Queue deliveries acknowledged.");
        describe_counter!(
            "weather_queue_nak_total",
            "Queue deliveries negatively acknowledged (requeued)."
        );
        describe_counter!("insight_requests_total", "Insight reports requested.");
        describe_counter!(
            "insight_fallback_total",
            "Insight requests served by the statistical engine."
        );
        describe_gauge!("realtime_subscribers", "Active realtime stream subscribers.");
    });
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ReadingStore>,
    bus: ReadingBus,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ReadingStore>, bus: ReadingBus) -> Self {
        ensure_metrics_described();
        Self { store, bus }
    }

    /// Queue path: the body arrives as raw bytes.
    pub async fn ingest_bytes(&self, body: &[u8]) -> Result<StoredReading> {
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| PipelineError::MalformedPayload(e.to_string()))?;
        self.ingest_value(&payload).await
    }

    /// HTTP path: the body was already decoded by the framework.
    pub async fn ingest_value(&self, payload: &serde_json::Value) -> Result<StoredReading> {
        let result = self.ingest_inner(payload).await;
        match &result {
            Ok(stored) => {
                counter!("weather_ingest_total").increment(1);
                debug!(
                    id = %stored.id,
                    city = %stored.reading.location.city,
                    temperature = stored.reading.data.temperature,
                    "reading persisted"
                );
            }
            Err(e) => {
                counter!("weather_ingest_failures_total").increment(1);
                warn!(error = %e, "ingestion failed");
            }
        }
        result
    }

    async fn ingest_inner(&self, payload: &serde_json::Value) -> Result<StoredReading> {
        let reading = normalize_payload(payload, &Utc::now().to_rfc3339())?;
        let stored = self.store.insert(reading).await?;
        // Fan-out never fails an ingestion; a zero-subscriber send is normal.
        self.bus.publish(stored.clone());
        Ok(stored)
    }
}
