//! Outbound market-data sink
//!
//! The scheduler hands every quote and bar to a sink. Sinks never fail the
//! caller: delivery problems are handled and logged on the sink side.

use std::sync::Mutex;

use crate::bars::Bar;
use crate::quotes::Quote;

pub trait MarketDataSink: Send + Sync {
    fn broadcast_quote(&self, quote: &Quote);
    fn broadcast_bar(&self, bar: &Bar);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MarketDataSink for NullSink {
    fn broadcast_quote(&self, _quote: &Quote) {}
    fn broadcast_bar(&self, _bar: &Bar) {}
}

/// Keeps every quote and bar in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    quotes: Mutex<Vec<Quote>>,
    bars: Mutex<Vec<Bar>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quotes(&self) -> Vec<Quote> {
        self.quotes.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn bars(&self) -> Vec<Bar> {
        self.bars.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl MarketDataSink for RecordingSink {
    fn broadcast_quote(&self, quote: &Quote) {
        if let Ok(mut quotes) = self.quotes.lock() {
            quotes.push(quote.clone());
        }
    }

    fn broadcast_bar(&self, bar: &Bar) {
        if let Ok(mut bars) = self.bars.lock() {
            bars.push(bar.clone());
        }
    }
}
