// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod auth;
pub mod bus;
pub mod config;
pub mod error;
pub mod ingest;
pub mod insight;
pub mod normalize;
pub mod queue;
pub mod reading;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::bus::ReadingBus;
pub use crate::error::PipelineError;
pub use crate::ingest::Ingestor;
pub use crate::insight::ai_adapter;
pub use crate::insight::{InsightReport, InsightService};
pub use crate::reading::{ReadingEvent, StoredReading, WeatherReading};
pub use crate::store::{MemoryStore, ReadingStore};
