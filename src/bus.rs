//! # Realtime Fan-out Bus
//! Process-wide broadcast channel from the persistence path to streaming
//! clients. Publish is fire-and-forget: a subscriber that stops draining its
//! receiver lags out on its own side and never slows ingestion. Subscribers
//! observe readings in publish order.

use metrics::gauge;
use tokio::sync::broadcast;

use crate::reading::StoredReading;

/// Default channel depth before a slow subscriber starts lagging.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ReadingBus {
    tx: broadcast::Sender<StoredReading>,
}

/// An active subscriber's delivery channel. Dropping it unsubscribes.
pub type BusSubscription = broadcast::Receiver<StoredReading>;

impl ReadingBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast a persisted reading to every live subscriber. Returns the
    /// number of subscribers that were reachable; zero subscribers is not an
    /// error.
    pub fn publish(&self, reading: StoredReading) -> usize {
        match self.tx.send(reading) {
            Ok(n) => n,
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> BusSubscription {
        let rx = self.tx.subscribe();
        gauge!("realtime_subscribers").set(self.tx.receiver_count() as f64);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ReadingBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
