//! OHLCV bar snapshots
//!
//! A bar is a view of the session so far: open is the session open, high and
//! low are the session extremes, close is the last price and volume is the
//! cumulative session volume. Timestamps are floored to the minute.
//!
//! [`BarSchedule`] tracks when each symbol last emitted a bar so the
//! scheduler can emit at most one per `bar_interval`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::clock::floor_to_minute;
use types::ids::Symbol;

use crate::instrument_state::InstrumentState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    pub symbol: Symbol,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
}

impl Bar {
    /// Validate OHLC ordering.
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.high >= self.low
    }
}

/// Derives bars from instrument state.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarAggregator;

impl BarAggregator {
    pub fn create_bar(state: &InstrumentState) -> Bar {
        Bar {
            symbol: state.symbol().clone(),
            open: state.session_open(),
            high: state.session_high(),
            low: state.session_low(),
            close: state.last_price(),
            volume: state.cumulative_volume(),
            timestamp: floor_to_minute(state.last_updated()),
        }
    }
}

/// Per-symbol bar cadence.
#[derive(Debug, Clone)]
pub struct BarSchedule {
    interval: Duration,
    last_emitted: HashMap<Symbol, DateTime<Utc>>,
}

impl BarSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: HashMap::new(),
        }
    }

    /// Start the cadence for `symbol` at `now` if it is not tracked yet.
    pub fn track(&mut self, symbol: &Symbol, now: DateTime<Utc>) {
        self.last_emitted.entry(symbol.clone()).or_insert(now);
    }

    /// True when at least one interval has passed since the last bar.
    pub fn is_due(&self, symbol: &Symbol, now: DateTime<Utc>) -> bool {
        match self.last_emitted.get(symbol) {
            Some(last) => now - *last >= self.interval,
            None => false,
        }
    }

    pub fn mark_emitted(&mut self, symbol: &Symbol, now: DateTime<Utc>) {
        self.last_emitted.insert(symbol.clone(), now);
    }
}
