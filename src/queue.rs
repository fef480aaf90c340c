//! # Queue Consumer
//! Durable broker consumer for collector telemetry. Connection lifecycle is
//! an explicit state machine (`Disconnected → Connecting → Ready →
//! Consuming`) published on a watch channel; anything that needs the broker
//! blocks on the `Ready` gate instead of ad hoc promise plumbing. There is no
//! terminal failure state — the consumer retries the broker indefinitely.
//!
//! Topology is declared idempotently on every (re)connect: stream `weather`
//! carrying subject `weather.data`, durable pull consumer `weather-data`
//! with explicit acks. Delivery is at-least-once; duplicates are accepted as
//! separate records.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{self, consumer::PullConsumer, AckKind};
use futures::StreamExt;
use metrics::counter;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::ingest::Ingestor;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub url: String,
    pub stream: String,
    pub subject: String,
    /// Durable consumer name (broker consumer names cannot contain `.`).
    pub durable_name: String,
    /// Upper bound on concurrently in-flight deliveries per fetch.
    pub batch_size: usize,
    pub max_wait: Duration,
    pub reconnect_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            stream: "weather".to_string(),
            subject: "weather.data".to_string(),
            durable_name: "weather-data".to_string(),
            batch_size: 16,
            max_wait: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Ready,
    Consuming,
}

/// Per-message acknowledgement decision. Ack completes the delivery; nak
/// requeues it for broker redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Ack,
    NakRequeue,
}

/// Decode/normalize/persist one delivery and decide its acknowledgement.
/// Broadcast-subscriber behavior never naks: once the reading is persisted
/// the delivery is complete as far as the broker is concerned.
pub async fn process_delivery(ingestor: &Ingestor, payload: &[u8]) -> Delivery {
    match ingestor.ingest_bytes(payload).await {
        Ok(_) => Delivery::Ack,
        Err(PipelineError::MalformedPayload(e)) => {
            // Preserved behavior: malformed payloads requeue indefinitely
            // (see DESIGN.md on the poison-message question).
            warn!(error = %e, "malformed delivery, requeueing");
            Delivery::NakRequeue
        }
        Err(e) => {
            warn!(error = %e, "delivery failed, requeueing");
            Delivery::NakRequeue
        }
    }
}

pub struct QueueConsumer {
    config: QueueConfig,
    ingestor: Arc<Ingestor>,
    state_tx: watch::Sender<ConsumerState>,
}

impl QueueConsumer {
    pub fn new(config: QueueConfig, ingestor: Arc<Ingestor>) -> Self {
        let (state_tx, _) = watch::channel(ConsumerState::Disconnected);
        Self {
            config,
            ingestor,
            state_tx,
        }
    }

    /// Observe the consumer lifecycle. `wait_ready` is the blocking gate.
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state_tx.subscribe()
    }

    /// Consume until cancelled, reconnecting forever on connection loss.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            if let Err(e) = self.connect_and_consume(&shutdown).await {
                self.state_tx.send_replace(ConsumerState::Disconnected);
                error!(error = %e, "broker connection lost, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                }
            } else {
                // Clean exit only happens on shutdown.
                break;
            }
        }
        self.state_tx.send_replace(ConsumerState::Disconnected);
        info!("queue consumer stopped");
    }

    async fn connect_and_consume(&self, shutdown: &CancellationToken) -> anyhow::Result<()> {
        self.state_tx.send_replace(ConsumerState::Connecting);
        info!(url = %self.config.url, "connecting to broker");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(Duration::from_secs(10))
            .connect(&self.config.url)
            .await?;
        let jetstream = jetstream::new(client);

        self.state_tx.send_replace(ConsumerState::Ready);
        let consumer = self.ensure_topology(&jetstream).await?;

        self.state_tx.send_replace(ConsumerState::Consuming);
        info!(
            stream = %self.config.stream,
            subject = %self.config.subject,
            "consuming"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                result = self.fetch_and_process(&consumer) => result?,
            }
        }
    }

    /// Declare stream and durable consumer. Safe to repeat on reconnect.
    async fn ensure_topology(&self, jetstream: &jetstream::Context) -> anyhow::Result<PullConsumer> {
        if jetstream.get_stream(&self.config.stream).await.is_err() {
            jetstream
                .create_stream(jetstream::stream::Config {
                    name: self.config.stream.clone(),
                    subjects: vec![self.config.subject.clone()],
                    ..Default::default()
                })
                .await?;
            info!(stream = %self.config.stream, "stream created");
        }

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(self.config.durable_name.clone()),
                    durable_name: Some(self.config.durable_name.clone()),
                    filter_subject: self.config.subject.clone(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                self.config.stream.as_str(),
            )
            .await?;
        Ok(consumer)
    }

    async fn fetch_and_process(&self, consumer: &PullConsumer) -> anyhow::Result<()> {
        let mut messages = consumer
            .fetch()
            .max_messages(self.config.batch_size)
            .expires(self.config.max_wait)
            .messages()
            .await?;

        while let Some(result) = messages.next().await {
            let msg = match result {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "error receiving delivery");
                    continue;
                }
            };

            match process_delivery(&self.ingestor, &msg.payload).await {
                Delivery::Ack => {
                    counter!("weather_queue_ack_total").increment(1);
                    if let Err(e) = msg.ack().await {
                        error!(error = %e, "failed to ack delivery");
                    }
                }
                Delivery::NakRequeue => {
                    counter!("weather_queue_nak_total").increment(1);
                    debug!(subject = %msg.subject, "nak with requeue");
                    if let Err(e) = msg.ack_with(AckKind::Nak(None)).await {
                        error!(error = %e, "failed to nak delivery");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Block until the consumer has declared topology and can hand out work.
pub async fn wait_ready(rx: &mut watch::Receiver<ConsumerState>) {
    let _ = rx
        .wait_for(|s| matches!(s, ConsumerState::Ready | ConsumerState::Consuming))
        .await;
}
