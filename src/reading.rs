//! Canonical reading types.
//!
//! `WeatherReading` is the persisted unit; field names on the wire match the
//! producers' contract (`data`, `location`, `processed_by`, `raw`). Readings
//! are immutable once stored — the store hands back a `StoredReading` with an
//! assigned id and never mutates in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Measurement block. Canonical numeric fields default to 0 when absent
/// upstream; unknown producer keys are preserved verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub temperature: f64,
    pub humidity: f64,
    #[serde(rename = "windSpeed")]
    pub wind_speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(rename = "weatherCode", skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// One normalized weather observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// ISO-8601 observation time (ingestion time when the producer sent none).
    pub timestamp: String,
    pub data: Measurements,
    pub location: Location,
    /// Identifier of the producing source/processor, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<String>,
    /// Original untransformed payload, retained for audit/debugging.
    pub raw: Value,
}

/// A reading after persistence: store-assigned id plus insertion sequence
/// (the sequence stands in for the store's creation-order index).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: String,
    #[serde(skip)]
    pub seq: u64,
    #[serde(flatten)]
    pub reading: WeatherReading,
}

/// Compact projection sent to streaming clients and dashboard lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingEvent {
    pub id: String,
    pub timestamp: String,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(rename = "windSpeed")]
    pub wind_speed: f64,
    pub city: String,
}

impl StoredReading {
    pub fn event(&self) -> ReadingEvent {
        ReadingEvent {
            id: self.id.clone(),
            timestamp: self.reading.timestamp.clone(),
            temperature: self.reading.data.temperature,
            humidity: self.reading.data.humidity,
            wind_speed: self.reading.data.wind_speed,
            city: self.reading.location.city.clone(),
        }
    }

    /// Dashboard row: the event projection plus a human description. Falls
    /// back to the producer's `weatherCondition` key before giving up.
    pub fn dashboard_row(&self) -> Value {
        let d = &self.reading.data;
        let description = d
            .description
            .clone()
            .or_else(|| {
                d.extra
                    .get("weatherCondition")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "No description".to_string());
        serde_json::json!({
            "id": self.id,
            "city": self.reading.location.city,
            "temperature": d.temperature,
            "humidity": d.humidity,
            "windSpeed": d.wind_speed,
            "description": description,
            "timestamp": self.reading.timestamp,
        })
    }
}
