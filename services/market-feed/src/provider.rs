//! Instrument snapshot provider
//!
//! The feed reads instruments once per `start`. Persistence lives elsewhere;
//! [`StaticInstrumentProvider`] serves a fixed list, optionally loaded from
//! a JSON file.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{AssetClass, ExchangeCode, Symbol};

use crate::error::FeedError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub exchange: ExchangeCode,
    #[serde(default)]
    pub asset_class: AssetClass,
    /// Session open; the feed's default price is used when absent.
    #[serde(default)]
    pub open_price: Option<Decimal>,
}

impl Instrument {
    pub fn new(symbol: &str, exchange: &str, asset_class: AssetClass) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            exchange: ExchangeCode::new(exchange),
            asset_class,
            open_price: None,
        }
    }

    pub fn with_open_price(mut self, price: Decimal) -> Self {
        self.open_price = Some(price);
        self
    }
}

/// Instruments grouped by exchange, exchanges in sorted order.
pub type InstrumentSnapshot = BTreeMap<ExchangeCode, Vec<Instrument>>;

/// Read-only source of the instrument universe.
pub trait InstrumentProvider: Send + Sync {
    fn load_by_exchange(&self) -> Result<InstrumentSnapshot, FeedError>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticInstrumentProvider {
    instruments: Vec<Instrument>,
}

impl StaticInstrumentProvider {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    /// Load a JSON array of instruments.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FeedError::Provider(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, FeedError> {
        let instruments: Vec<Instrument> =
            serde_json::from_str(raw).map_err(|e| FeedError::Provider(e.to_string()))?;
        Ok(Self::new(instruments))
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

impl InstrumentProvider for StaticInstrumentProvider {
    fn load_by_exchange(&self) -> Result<InstrumentSnapshot, FeedError> {
        let mut grouped = InstrumentSnapshot::new();
        for instrument in &self.instruments {
            let bucket = grouped.entry(instrument.exchange.clone()).or_default();
            // First listing of a symbol wins.
            if !bucket.iter().any(|i| i.symbol == instrument.symbol) {
                bucket.push(instrument.clone());
            }
        }
        Ok(grouped)
    }
}
