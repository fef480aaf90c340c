// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET  /health
// - POST /weather/logs (success + malformed)
// - GET  /weather/dashboard (zero-value fallback + seeded averages)
// - GET  /weather/analytics (fixed buckets)
// - GET  /weather/insights (envelope + statistical provenance)
// - GET  /weather/realtime (guard: 401 without token, SSE with token)

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use weather_insight_pipeline::ai_adapter::DisabledClient;
use weather_insight_pipeline::auth::SharedTokenGuard;
use weather_insight_pipeline::{
    api, AppState, Ingestor, InsightService, MemoryStore, ReadingBus, ReadingStore,
};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const TOKEN: &str = "test-stream-token";

/// Build the same Router the binary uses, with a shared-token stream guard.
fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let bus = ReadingBus::new(16);
    let ingestor = Arc::new(Ingestor::new(store.clone(), bus.clone()));
    let insights = Arc::new(InsightService::new(store.clone(), Arc::new(DisabledClient)));
    let state = AppState {
        ingestor,
        store: store.clone(),
        bus,
        insights,
        guard: Arc::new(SharedTokenGuard::new(TOKEN)),
    };
    (api::create_router(state), store)
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let (app, _) = test_app();
    let resp = app.oneshot(get("/health")).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn api_ingestion_fallback_persists_and_returns_id() {
    let (app, store) = test_app();
    let payload = json!({ "data": { "temperature": 19.5 }, "location": { "city": "Belém" } });

    let resp = app
        .oneshot(post_json("/weather/logs", &payload))
        .await
        .expect("oneshot POST /weather/logs");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = json_body(resp).await;
    assert_eq!(v.get("success"), Some(&json!(true)));
    let id = v.get("id").and_then(Json::as_str).expect("id").to_string();

    let rows = store.find_recent(10, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);
}

#[tokio::test]
async fn api_ingestion_rejects_non_object_bodies() {
    let (app, store) = test_app();
    let resp = app
        .oneshot(post_json("/weather/logs", &json!([1, 2, 3])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = json_body(resp).await;
    assert_eq!(v.get("success"), Some(&json!(false)));
    assert!(store.find_recent(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn api_dashboard_zero_values_on_empty_store() {
    let (app, _) = test_app();
    let v = json_body(app.oneshot(get("/weather/dashboard")).await.unwrap()).await;
    assert_eq!(
        v,
        json!({ "data": {
            "avgTemperature": 0.0,
            "avgHumidity": 0.0,
            "avgWindSpeed": 0.0,
            "totalRecords": 0
        }})
    );
}

#[tokio::test]
async fn api_dashboard_averages_are_rounded() {
    let (app, store) = test_app();
    for temp in [10.0, 11.0, 12.1] {
        let reading = weather_insight_pipeline::normalize::normalize_payload(
            &json!({ "data": { "temperature": temp, "humidity": 50.0, "windSpeed": 4.0 } }),
            "2024-06-01T00:00:00Z",
        )
        .unwrap();
        store.insert(reading).await.unwrap();
    }
    let v = json_body(app.oneshot(get("/weather/dashboard")).await.unwrap()).await;
    let data = v.get("data").unwrap();
    assert_eq!(data.get("avgTemperature"), Some(&json!(11.0)));
    assert_eq!(data.get("totalRecords"), Some(&json!(3)));
}

#[tokio::test]
async fn api_analytics_counts_fixed_buckets() {
    let (app, store) = test_app();
    for temp in [-20.0, 5.0, 15.0, 25.0, 25.5, 40.0] {
        let reading = weather_insight_pipeline::normalize::normalize_payload(
            &json!({ "data": { "temperature": temp } }),
            "2024-06-01T00:00:00Z",
        )
        .unwrap();
        store.insert(reading).await.unwrap();
    }
    let v = json_body(app.oneshot(get("/weather/analytics")).await.unwrap()).await;
    let ranges = v["data"]["temperatureRanges"].as_array().expect("ranges");
    assert_eq!(ranges.len(), 6);
    assert_eq!(ranges[0], json!({ "range": "-50°C a -10°C", "count": 1 }));
    assert_eq!(ranges[4], json!({ "range": "20°C a 30°C", "count": 2 }));
    assert_eq!(ranges[5], json!({ "range": "30°C a 50°C", "count": 1 }));
}

#[tokio::test]
async fn api_insights_envelope_reports_statistical_method() {
    let (app, _) = test_app();
    let v = json_body(app.oneshot(get("/weather/insights")).await.unwrap()).await;
    let data = v.get("data").expect("data envelope");
    assert!(data.get("summary").is_some());
    assert_eq!(data["context"]["method"], json!("statistical"));
}

#[tokio::test]
async fn api_realtime_requires_token() {
    let (app, _) = test_app();
    let resp = app.oneshot(get("/weather/realtime")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn api_realtime_accepts_query_token_and_streams() {
    let (app, _) = test_app();
    let resp = app
        .oneshot(get(&format!("/weather/realtime?token={TOKEN}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn api_realtime_accepts_bearer_token() {
    let (app, _) = test_app();
    let req = Request::builder()
        .method("GET")
        .uri("/weather/realtime")
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_logs_listing_paginates() {
    let (app, store) = test_app();
    for i in 0..5 {
        let reading = weather_insight_pipeline::normalize::normalize_payload(
            &json!({ "data": { "temperature": i as f64 } }),
            "2024-06-01T00:00:00Z",
        )
        .unwrap();
        store.insert(reading).await.unwrap();
    }
    let v = json_body(
        app.oneshot(get("/weather/logs?limit=2&skip=1"))
            .await
            .unwrap(),
    )
    .await;
    let rows = v.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["data"]["temperature"], json!(3.0));
}
