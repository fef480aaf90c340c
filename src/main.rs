//! Weather Insight Pipeline — Binary Entrypoint
//! Boots the queue consumer and the Axum HTTP server, wiring the store, the
//! fan-out bus, and the insight engines.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use weather_insight_pipeline::api::{self, AppState};
use weather_insight_pipeline::auth;
use weather_insight_pipeline::bus::ReadingBus;
use weather_insight_pipeline::config::AppConfig;
use weather_insight_pipeline::ingest::Ingestor;
use weather_insight_pipeline::insight::{ai_adapter, InsightService};
use weather_insight_pipeline::queue::QueueConsumer;
use weather_insight_pipeline::store::{MemoryStore, ReadingStore};
use weather_insight_pipeline::telemetry::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let prometheus = Metrics::init();

    let store: Arc<dyn ReadingStore> = Arc::new(MemoryStore::new());
    let bus = ReadingBus::new(cfg.bus_capacity);
    let ingestor = Arc::new(Ingestor::new(store.clone(), bus.clone()));
    let ai = ai_adapter::build_client_from_env();
    let insights = Arc::new(InsightService::new(store.clone(), ai));
    let guard = auth::build_guard_from_env();

    // Broker consumer runs for the life of the process, reconnecting forever.
    let shutdown = CancellationToken::new();
    let consumer = QueueConsumer::new(cfg.queue.clone(), ingestor.clone());
    let mut consumer_state = consumer.state();
    tokio::spawn(consumer.run(shutdown.clone()));
    tokio::spawn(async move {
        while consumer_state.changed().await.is_ok() {
            let state = *consumer_state.borrow();
            info!(?state, "queue consumer state");
        }
    });

    let state = AppState {
        ingestor,
        store,
        bus,
        insights,
        guard,
    };
    let router = api::create_router(state).merge(prometheus.router());

    let listener = tokio::net::TcpListener::bind(&cfg.http_addr).await?;
    info!(addr = %cfg.http_addr, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
