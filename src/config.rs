//! Environment-driven configuration. `.env` is loaded by the binary before
//! this runs; every knob has a sensible local-development default.

use std::time::Duration;

use crate::bus::DEFAULT_BUS_CAPACITY;
use crate::queue::QueueConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub bus_capacity: usize,
    pub queue: QueueConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut queue = QueueConfig::default();
        if let Ok(url) = std::env::var("NATS_URL") {
            if !url.is_empty() {
                queue.url = url;
            }
        }
        if let Some(n) = env_parse::<usize>("QUEUE_BATCH_SIZE") {
            queue.batch_size = n.max(1);
        }
        if let Some(secs) = env_parse::<u64>("QUEUE_RECONNECT_SECS") {
            queue.reconnect_delay = Duration::from_secs(secs.max(1));
        }

        Self {
            http_addr: std::env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            bus_capacity: env_parse::<usize>("BUS_CAPACITY")
                .unwrap_or(DEFAULT_BUS_CAPACITY)
                .max(1),
            queue,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
