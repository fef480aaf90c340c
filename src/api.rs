use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::auth::DynStreamGuard;
use crate::bus::ReadingBus;
use crate::error::PipelineError;
use crate::ingest::Ingestor;
use crate::insight::InsightService;
use crate::reading::{ReadingEvent, StoredReading};
use crate::store::ReadingStore;

/// Fixed dashboard histogram buckets, `[min, max)`.
const TEMPERATURE_BUCKETS: [(f64, f64, &str); 6] = [
    (-50.0, -10.0, "-50°C a -10°C"),
    (-10.0, 0.0, "-10°C a 0°C"),
    (0.0, 10.0, "0°C a 10°C"),
    (10.0, 20.0, "10°C a 20°C"),
    (20.0, 30.0, "20°C a 30°C"),
    (30.0, 50.0, "30°C a 50°C"),
];

/// Replayed to each realtime subscriber on connect.
const REPLAY_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<dyn ReadingStore>,
    pub bus: ReadingBus,
    pub insights: Arc<InsightService>,
    pub guard: DynStreamGuard,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/weather/logs", post(save_log).get(list_logs))
        .route("/weather", get(dashboard_list))
        .route("/weather/recent", get(dashboard_list))
        .route("/weather/realtime", get(realtime))
        .route("/weather/insights", get(insights))
        .route("/weather/dashboard", get(dashboard_metrics))
        .route("/weather/analytics", get(analytics))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// HTTP ingestion fallback for collectors that cannot reach the broker.
async fn save_log(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    match state.ingestor.ingest_value(&payload).await {
        Ok(stored) => (
            StatusCode::OK,
            Json(json!({ "success": true, "id": stored.id })),
        ),
        Err(PipelineError::MalformedPayload(e)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e })),
        ),
        Err(e) => {
            warn!(error = %e, "ingestion via POST failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

#[derive(serde::Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    skip: usize,
}

fn default_limit() -> usize {
    100
}

async fn list_logs(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<StoredReading>>, StatusCode> {
    state
        .store
        .find_recent(q.limit, q.skip)
        .await
        .map(Json)
        .map_err(|e| {
            warn!(error = %e, "log listing failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// `GET /weather` and `GET /weather/recent`: the 20 most recent readings in
/// dashboard shape. Degrades to an empty list.
async fn dashboard_list(State(state): State<AppState>) -> Json<Vec<Value>> {
    let rows = state
        .store
        .find_recent(REPLAY_LIMIT, 0)
        .await
        .unwrap_or_default();
    Json(rows.iter().map(StoredReading::dashboard_row).collect())
}

async fn insights(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "data": state.insights.generate().await }))
}

async fn dashboard_metrics(State(state): State<AppState>) -> Json<Value> {
    let agg = state.store.aggregate_averages().await.unwrap_or_default();
    Json(json!({
        "data": {
            "avgTemperature": round1(agg.temperature),
            "avgHumidity": round1(agg.humidity),
            "avgWindSpeed": round1(agg.wind_speed),
            "totalRecords": agg.total_records,
        }
    }))
}

async fn analytics(State(state): State<AppState>) -> Json<Value> {
    let mut ranges = Vec::with_capacity(TEMPERATURE_BUCKETS.len());
    for (min, max, label) in TEMPERATURE_BUCKETS {
        match state.store.count_temperature_between(min, max).await {
            Ok(count) => ranges.push(json!({ "range": label, "count": count })),
            Err(e) => {
                warn!(error = %e, "analytics bucket count failed");
                return Json(json!({ "data": { "temperatureRanges": [] } }));
            }
        }
    }
    Json(json!({ "data": { "temperatureRanges": ranges } }))
}

/// SSE stream: replay of the most recent readings (newest first, as stored),
/// then live events in persist order. Requires a principal from the guard.
async fn realtime(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let token = params
        .get("token")
        .cloned()
        .or_else(|| bearer_token(&headers));
    let principal = state
        .guard
        .authorize(token.as_deref())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    info!(subject = %principal.subject, "realtime subscriber connected");

    // Subscribe before the replay read so nothing persisted in between the
    // two is missed; a reading racing the connect may appear twice, never
    // not at all.
    let rx = state.bus.subscribe();
    let replay = state
        .store
        .find_recent(REPLAY_LIMIT, 0)
        .await
        .unwrap_or_default();
    let replay_events: Vec<Event> = replay.iter().map(|row| to_event(&row.event())).collect();

    let live = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(row) => Some((to_event(&row.event()), rx)),
            // A subscriber that cannot keep up is dropped, not back-filled.
            Err(RecvError::Lagged(_)) | Err(RecvError::Closed) => None,
        }
    });

    let events = stream::iter(replay_events)
        .chain(live)
        .map(Ok::<_, Infallible>);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_event(ev: &ReadingEvent) -> Event {
    Event::default()
        .json_data(ev)
        .unwrap_or_else(|_| Event::default().data("{}"))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_matches_dashboard_contract() {
        assert_eq!(round1(21.04), 21.0);
        assert_eq!(round1(21.05), 21.1);
        assert_eq!(round1(-0.04), -0.0);
    }

    #[test]
    fn bearer_header_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc123".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));
        headers.insert(axum::http::header::AUTHORIZATION, "Basic xyz".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }
}
