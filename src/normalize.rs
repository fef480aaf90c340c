//! # Payload Normalizer
//! Maps heterogeneous producer payloads into one canonical `WeatherReading`.
//!
//! Producers drift: some nest measurements under `data`, some use snake_case
//! aliases, some put fields at the top level. Resolution order per field is
//! nested canonical → nested alias → top-level alias → default zero. The
//! contract is "never reject a structurally valid object" — only a body that
//! is not a JSON object fails.

use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::reading::{Location, Measurements, WeatherReading};

/// Keys owned by the typed `Measurements` struct. Everything else found under
/// `data` is preserved verbatim; canonical values computed here win over the
/// raw merge.
const CANONICAL_KEYS: [&str; 7] = [
    "temperature",
    "humidity",
    "windSpeed",
    "description",
    "pressure",
    "visibility",
    "weatherCode",
];

/// Produce exactly one reading from an arbitrary structured payload.
/// `fallback_timestamp` is the ingestion time, used when the producer sent
/// no observation time.
pub fn normalize_payload(payload: &Value, fallback_timestamp: &str) -> Result<WeatherReading> {
    let obj = payload
        .as_object()
        .ok_or_else(|| PipelineError::MalformedPayload("payload is not a JSON object".into()))?;

    let data = obj.get("data").and_then(Value::as_object);

    let temperature = nested_num(data, "temperature")
        .or_else(|| nested_num(data, "temp"))
        .or_else(|| top_num(obj, "temperature"))
        .unwrap_or(0.0);
    let humidity = nested_num(data, "humidity")
        .or_else(|| nested_num(data, "hum"))
        .or_else(|| top_num(obj, "humidity"))
        .unwrap_or(0.0);
    let wind_speed = nested_num(data, "windSpeed")
        .or_else(|| nested_num(data, "wind_speed"))
        .or_else(|| top_num(obj, "wind_speed"))
        .or_else(|| top_num(obj, "windSpeed"))
        .unwrap_or(0.0);

    let timestamp = top_str(obj, "timestamp")
        .or_else(|| top_str(obj, "processed_at"))
        .unwrap_or_else(|| fallback_timestamp.to_string());

    let location = obj.get("location").and_then(Value::as_object);
    let city = nested_str(location, "city")
        .or_else(|| top_str(obj, "city"))
        .unwrap_or_else(|| "Unknown".to_string());

    // Shallow merge: keep every unknown key under `data` as-is.
    let mut extra = data.cloned().unwrap_or_default();
    for key in CANONICAL_KEYS {
        extra.remove(key);
    }

    Ok(WeatherReading {
        timestamp,
        data: Measurements {
            temperature,
            humidity,
            wind_speed,
            description: nested_str(data, "description"),
            pressure: nested_num(data, "pressure"),
            visibility: nested_num(data, "visibility"),
            weather_code: data
                .and_then(|d| d.get("weatherCode"))
                .and_then(Value::as_i64),
            extra,
        },
        location: Location {
            city,
            state: nested_str(location, "state"),
            country: nested_str(location, "country"),
            latitude: nested_num(location, "latitude").or_else(|| top_num(obj, "latitude")),
            longitude: nested_num(location, "longitude").or_else(|| top_num(obj, "longitude")),
        },
        processed_by: top_str(obj, "processed_by").or_else(|| top_str(obj, "source")),
        raw: payload.clone(),
    })
}

fn nested_num(container: Option<&Map<String, Value>>, key: &str) -> Option<f64> {
    container.and_then(|m| m.get(key)).and_then(Value::as_f64)
}

fn nested_str(container: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    container
        .and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn top_num(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn top_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}
