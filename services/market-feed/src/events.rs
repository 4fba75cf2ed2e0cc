//! Feed lifecycle and guard events
//!
//! Every event carries a UUID v7 id (time-sortable) and the clock time at
//! which it was raised. Listeners are invoked synchronously, in registration
//! order, on the thread that raised the event.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use types::ids::{ExchangeCode, Symbol};
use uuid::Uuid;

use crate::volatility_guard::{Direction, GuardState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: FeedEventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all_fields = "camelCase")]
pub enum FeedEventPayload {
    FeedStarted {
        exchange_codes: Vec<ExchangeCode>,
        triggered_by: String,
    },
    FeedStopped {
        exchange_codes: Vec<ExchangeCode>,
        triggered_by: String,
        reason: String,
    },
    GuardTriggered {
        symbol: Symbol,
        exchange: ExchangeCode,
        state: GuardState,
        direction: Direction,
    },
    GuardReleased {
        symbol: Symbol,
        exchange: ExchangeCode,
        released_at: DateTime<Utc>,
    },
}

impl FeedEvent {
    pub fn new(timestamp: DateTime<Utc>, payload: FeedEventPayload) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            timestamp,
            payload,
        }
    }

    pub fn event_type_label(&self) -> &'static str {
        match &self.payload {
            FeedEventPayload::FeedStarted { .. } => "FeedStarted",
            FeedEventPayload::FeedStopped { .. } => "FeedStopped",
            FeedEventPayload::GuardTriggered { .. } => "GuardTriggered",
            FeedEventPayload::GuardReleased { .. } => "GuardReleased",
        }
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        match &self.payload {
            FeedEventPayload::GuardTriggered { symbol, .. }
            | FeedEventPayload::GuardReleased { symbol, .. } => Some(symbol),
            FeedEventPayload::FeedStarted { .. } | FeedEventPayload::FeedStopped { .. } => None,
        }
    }
}

/// Receives feed events.
pub trait FeedEventListener: Send + Sync {
    fn on_event(&self, event: &FeedEvent);
}

/// Fan-out to registered listeners.
#[derive(Clone, Default)]
pub struct EventPublisher {
    listeners: Vec<Arc<dyn FeedEventListener>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn FeedEventListener>) {
        self.listeners.push(listener);
    }

    pub fn publish(&self, event: FeedEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Writes each event to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLogListener;

impl FeedEventListener for AuditLogListener {
    fn on_event(&self, event: &FeedEvent) {
        match &event.payload {
            FeedEventPayload::FeedStarted {
                exchange_codes,
                triggered_by,
            } => info!(
                event_id = %event.event_id,
                exchanges = ?exchange_codes,
                triggered_by = %triggered_by,
                timestamp = %event.timestamp,
                "Feed started"
            ),
            FeedEventPayload::FeedStopped {
                exchange_codes,
                triggered_by,
                reason,
            } => info!(
                event_id = %event.event_id,
                exchanges = ?exchange_codes,
                triggered_by = %triggered_by,
                reason = %reason,
                timestamp = %event.timestamp,
                "Feed stopped"
            ),
            FeedEventPayload::GuardTriggered {
                symbol,
                exchange,
                state,
                direction,
            } => warn!(
                event_id = %event.event_id,
                symbol = %symbol,
                exchange = %exchange,
                direction = ?direction,
                anchor = %state.anchor_price,
                window_start = %state.window_start,
                "Volatility guard triggered"
            ),
            FeedEventPayload::GuardReleased {
                symbol,
                exchange,
                released_at,
            } => info!(
                event_id = %event.event_id,
                symbol = %symbol,
                exchange = %exchange,
                released_at = %released_at,
                "Volatility guard released"
            ),
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<FeedEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FeedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events with the given label.
    pub fn count(&self, label: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type_label() == label)
            .count()
    }
}

impl FeedEventListener for RecordingListener {
    fn on_event(&self, event: &FeedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
