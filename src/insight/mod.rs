//! # Insight Engine
//! On-demand analytical reports over recent readings. Two tiers: a
//! generative adapter (at most one external call per request) and the
//! deterministic statistical engine it falls back to. Reports are built
//! fresh on every request and never persisted.

pub mod ai_adapter;
pub mod statistical;

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::insight::ai_adapter::DynAiClient;
use crate::store::ReadingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    Trend,
    Warning,
    Alert,
    Recommendation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailCategory {
    Temperature,
    Humidity,
    Wind,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightDetail {
    #[serde(rename = "type")]
    pub kind: DetailKind,
    pub category: DetailCategory,
    pub message: String,
}

/// Provenance: which tier produced the report and over how many readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightContext {
    #[serde(rename = "dataPointsAnalyzed")]
    pub data_points_analyzed: usize,
    pub method: String,
    #[serde(rename = "aiProvider", skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightReport {
    pub summary: String,
    pub details: Vec<InsightDetail>,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<InsightContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InsightReport {
    /// Degraded response when the store itself is unavailable. The analytics
    /// surface answers with this instead of failing the request.
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            summary: "Não foi possível gerar insights no momento.".to_string(),
            details: Vec::new(),
            generated_at: Utc::now().to_rfc3339(),
            context: None,
            error: Some(error.into()),
        }
    }
}

pub struct InsightService {
    store: Arc<dyn ReadingStore>,
    ai: DynAiClient,
}

impl InsightService {
    pub fn new(store: Arc<dyn ReadingStore>, ai: DynAiClient) -> Self {
        Self { store, ai }
    }

    /// Request → trailing-24h read → generative attempt → statistical
    /// fallback. Never raises; every failure path degrades.
    pub async fn generate(&self) -> InsightReport {
        counter!("insight_requests_total").increment(1);

        let now = Utc::now();
        let day = Duration::hours(24);

        let current = match self.store.find_in_window(now - day, now).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "insight window read failed");
                return InsightReport::degraded(e.to_string());
            }
        };

        if let Some(report) = self.ai.generate(&current).await {
            info!(provider = self.ai.provider_name(), "insights generated");
            return report;
        }

        counter!("insight_fallback_total").increment(1);
        let previous = match self.store.find_in_window(now - day - day, now - day).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "insight comparison window read failed");
                return InsightReport::degraded(e.to_string());
            }
        };

        statistical::report(&current, &previous, now)
    }
}
