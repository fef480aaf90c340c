// tests/normalize_shapes.rs
//
// Contract tests for the payload normalizer across every accepted producer
// shape: canonical nested, snake_case aliases, flat top-level fields, and
// partial payloads. Each measurement must resolve to the first non-absent
// value in the documented order, defaulting to 0.

use serde_json::json;
use weather_insight_pipeline::normalize::normalize_payload;
use weather_insight_pipeline::PipelineError;

const NOW: &str = "2024-06-01T12:00:00Z";

#[test]
fn resolution_order_per_measurement() {
    // (payload, expected temperature, humidity, wind)
    let cases = vec![
        (
            json!({ "data": { "temperature": 1.0, "temp": 9.0 }, "temperature": 9.0 }),
            1.0,
            0.0,
            0.0,
        ),
        (
            json!({ "data": { "temp": 2.0 }, "temperature": 9.0 }),
            2.0,
            0.0,
            0.0,
        ),
        (json!({ "temperature": 3.0 }), 3.0, 0.0, 0.0),
        (
            json!({ "data": { "hum": 55.0, "wind_speed": 4.0 } }),
            0.0,
            55.0,
            4.0,
        ),
        (json!({ "wind_speed": 6.0 }), 0.0, 0.0, 6.0),
        (json!({ "windSpeed": 7.0 }), 0.0, 0.0, 7.0),
        (
            json!({ "wind_speed": 6.0, "windSpeed": 7.0 }),
            0.0,
            0.0,
            6.0,
        ),
        (json!({}), 0.0, 0.0, 0.0),
    ];

    for (payload, temp, hum, wind) in cases {
        let r = normalize_payload(&payload, NOW).expect("structurally valid object");
        assert_eq!(r.data.temperature, temp, "temperature for {payload}");
        assert_eq!(r.data.humidity, hum, "humidity for {payload}");
        assert_eq!(r.data.wind_speed, wind, "wind for {payload}");
    }
}

#[test]
fn location_and_origin_fallbacks() {
    let r = normalize_payload(
        &json!({
            "city": "Recife",
            "latitude": -8.05,
            "longitude": -34.9,
            "source": "py-producer"
        }),
        NOW,
    )
    .unwrap();
    assert_eq!(r.location.city, "Recife");
    assert_eq!(r.location.latitude, Some(-8.05));
    assert_eq!(r.processed_by.as_deref(), Some("py-producer"));

    let r = normalize_payload(
        &json!({ "location": { "city": "Natal" }, "city": "Ignored", "processed_by": "go-worker", "source": "ignored" }),
        NOW,
    )
    .unwrap();
    assert_eq!(r.location.city, "Natal");
    assert_eq!(r.processed_by.as_deref(), Some("go-worker"));
}

#[test]
fn raw_payload_is_retained_verbatim() {
    let payload = json!({ "data": { "temperature": 12.0, "sensorId": "abc" }, "note": "check me" });
    let r = normalize_payload(&payload, NOW).unwrap();
    assert_eq!(r.raw, payload);
    assert_eq!(r.data.extra.get("sensorId"), Some(&json!("abc")));
}

#[test]
fn structurally_invalid_bodies_are_rejected() {
    for payload in [json!(["a"]), json!("weather"), json!(1.5), json!(null)] {
        assert!(matches!(
            normalize_payload(&payload, NOW),
            Err(PipelineError::MalformedPayload(_))
        ));
    }
}

#[test]
fn normalizer_is_idempotent_on_canonical_readings() {
    let payload = json!({
        "timestamp": "2024-06-01T08:00:00Z",
        "data": { "temperature": 21.5, "humidity": 60.0, "windSpeed": 12.0, "uvIndex": 3 },
        "location": { "city": "Curitiba", "country": "BR", "latitude": -25.4 },
        "processed_by": "collector-1"
    });
    let once = normalize_payload(&payload, NOW).unwrap();
    let twice = normalize_payload(&serde_json::to_value(&once).unwrap(), NOW).unwrap();
    assert_eq!(once.data, twice.data);
    assert_eq!(once.location, twice.location);
    assert_eq!(once.timestamp, twice.timestamp);
    assert_eq!(once.processed_by, twice.processed_by);
}
