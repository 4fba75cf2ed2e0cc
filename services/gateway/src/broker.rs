//! In-process topic broker
//!
//! One `tokio::sync::broadcast` channel per destination, created on first
//! use and dropped once its last receiver is gone. Publishing never waits: a
//! subscriber that falls behind loses the oldest messages and sees
//! `RecvError::Lagged`.

use dashmap::DashMap;
use tokio::sync::broadcast;
use types::ids::Symbol;

use crate::error::TransientBroadcastError;

pub const QUOTES_PREFIX: &str = "topic/quotes/";
pub const BARS_PREFIX: &str = "topic/bars/";

pub fn quotes_topic(symbol: &Symbol) -> String {
    format!("{}{}", QUOTES_PREFIX, symbol)
}

pub fn bars_topic(symbol: &Symbol) -> String {
    format!("{}{}", BARS_PREFIX, symbol)
}

/// Symbol named by a per-symbol market-data destination, if it is one.
pub fn market_data_symbol(destination: &str) -> Option<Symbol> {
    destination
        .strip_prefix(QUOTES_PREFIX)
        .or_else(|| destination.strip_prefix(BARS_PREFIX))
        .and_then(Symbol::try_new)
}

/// Publish/subscribe transport behind the gateway.
pub trait Transport: Send + Sync {
    /// Publish `payload`; returns how many subscribers received it.
    fn publish(&self, destination: &str, payload: String) -> Result<usize, TransientBroadcastError>;

    fn subscribe(&self, destination: &str) -> broadcast::Receiver<String>;

    /// Drop destinations nobody listens to; returns how many were dropped.
    fn release_idle(&self) -> usize;
}

pub struct TopicBroker {
    capacity: usize,
    topics: DashMap<String, broadcast::Sender<String>>,
}

impl TopicBroker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: DashMap::new(),
        }
    }

    pub fn subscriber_count(&self, destination: &str) -> usize {
        self.topics
            .get(destination)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Transport for TopicBroker {
    fn publish(&self, destination: &str, payload: String) -> Result<usize, TransientBroadcastError> {
        let delivered = match self.topics.get(destination) {
            Some(tx) if tx.receiver_count() > 0 => tx.send(payload).unwrap_or(0),
            Some(_) => 0,
            None => return Ok(0),
        };
        if delivered == 0 {
            self.topics
                .remove_if(destination, |_, tx| tx.receiver_count() == 0);
        }
        Ok(delivered)
    }

    fn subscribe(&self, destination: &str) -> broadcast::Receiver<String> {
        if let Some(tx) = self.topics.get(destination) {
            return tx.subscribe();
        }
        // Reclaim abandoned destinations before adding a new one.
        self.release_idle();
        self.topics
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    fn release_idle(&self) -> usize {
        let before = self.topics.len();
        self.topics.retain(|_, tx| tx.receiver_count() > 0);
        before.saturating_sub(self.topics.len())
    }
}
