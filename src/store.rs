//! # Document Store Adapter
//! Narrow seam over the reading store. The pipeline only ever inserts and
//! runs a handful of read shapes, so the trait stays small; a real document
//! store lives behind the same five methods. `MemoryStore` is the in-process
//! implementation used by the binary and the tests.
//!
//! All reads return newest-first.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{PipelineError, Result};
use crate::reading::{StoredReading, WeatherReading};

/// Store-wide measurement averages plus the record count they cover.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AverageAggregates {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub total_records: u64,
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist one reading and return it with its assigned id. Readings are
    /// immutable: there is no update path.
    async fn insert(&self, reading: WeatherReading) -> Result<StoredReading>;

    /// Most recently inserted readings, newest first.
    async fn find_recent(&self, limit: usize, offset: usize) -> Result<Vec<StoredReading>>;

    /// Readings whose observation time falls in `[start, end)`, newest first.
    /// Readings with an unparseable timestamp never match a window.
    async fn find_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredReading>>;

    /// Count of readings with temperature in `[min, max)`.
    async fn count_temperature_between(&self, min: f64, max: f64) -> Result<u64>;

    async fn aggregate_averages(&self) -> Result<AverageAggregates>;
}

/// In-memory implementation: a guarded append-only vector, insertion order
/// standing in for the store's creation index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<StoredReading>,
    seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn lock_err<T>(_: T) -> PipelineError {
    PipelineError::StoreUnavailable("store lock poisoned".into())
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: WeatherReading) -> Result<StoredReading> {
        let mut inner = self.inner.lock().map_err(lock_err)?;
        inner.seq += 1;
        let stored = StoredReading {
            id: format!("{:024x}", inner.seq),
            seq: inner.seq,
            reading,
        };
        inner.rows.push(stored.clone());
        Ok(stored)
    }

    async fn find_recent(&self, limit: usize, offset: usize) -> Result<Vec<StoredReading>> {
        let inner = self.inner.lock().map_err(lock_err)?;
        Ok(inner
            .rows
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StoredReading>> {
        let inner = self.inner.lock().map_err(lock_err)?;
        let mut hits: Vec<(DateTime<Utc>, StoredReading)> = inner
            .rows
            .iter()
            .filter_map(|row| {
                let ts = parse_ts(&row.reading.timestamp)?;
                (ts >= start && ts < end).then(|| (ts, row.clone()))
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(hits.into_iter().map(|(_, row)| row).collect())
    }

    async fn count_temperature_between(&self, min: f64, max: f64) -> Result<u64> {
        let inner = self.inner.lock().map_err(lock_err)?;
        Ok(inner
            .rows
            .iter()
            .filter(|row| {
                let t = row.reading.data.temperature;
                t >= min && t < max
            })
            .count() as u64)
    }

    async fn aggregate_averages(&self) -> Result<AverageAggregates> {
        let inner = self.inner.lock().map_err(lock_err)?;
        let n = inner.rows.len();
        if n == 0 {
            return Ok(AverageAggregates::default());
        }
        let mut acc = AverageAggregates {
            total_records: n as u64,
            ..Default::default()
        };
        for row in &inner.rows {
            acc.temperature += row.reading.data.temperature;
            acc.humidity += row.reading.data.humidity;
            acc.wind_speed += row.reading.data.wind_speed;
        }
        acc.temperature /= n as f64;
        acc.humidity /= n as f64;
        acc.wind_speed /= n as f64;
        Ok(acc)
    }
}
