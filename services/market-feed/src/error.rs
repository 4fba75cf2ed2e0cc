//! Error taxonomy for the feed engine
//!
//! - `ConfigError` is fatal and only raised at startup.
//! - `FeedError::InvalidPrice` / `InvalidQuantity` reject a single tick.
//! - `TickError` wraps any per-instrument failure inside a scheduler cycle;
//!   it is logged and the instrument is retried on the next cycle.

use rust_decimal::Decimal;
use thiserror::Error;
use types::ids::Symbol;

/// Out-of-range or inconsistent configuration knobs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("interval_ms must be within 100..=1000, got {0}")]
    Interval(u64),

    #[error("batch_size must be within 1..=10, got {0}")]
    BatchSize(usize),

    #[error("bar_interval_seconds must be within 1..=600, got {0}")]
    BarInterval(u64),

    #[error("{name} must be at least {min}, got {value}")]
    BelowMinimum {
        name: &'static str,
        min: Decimal,
        value: Decimal,
    },

    #[error("volatility override {key} must be at least {min}, got {value}")]
    OverrideBelowMinimum {
        key: String,
        min: Decimal,
        value: Decimal,
    },

    #[error("min_price {min} exceeds max_price {max}")]
    InvertedPriceRange { min: Decimal, max: Decimal },

    #[error("steps_per_tick must be within 1..=50, got {0}")]
    StepsPerTick(u32),

    #[error("guard_window_seconds must be within 1..=3600, got {0}")]
    GuardWindow(u64),

    #[error("min_tick_volume {min} exceeds max_tick_volume {max}")]
    InvertedVolumeRange { min: u64, max: u64 },

    #[error("invalid value for {key}: {value}")]
    Unparseable { key: String, value: String },

    #[error("failed to read configuration: {0}")]
    Io(String),
}

/// Errors raised by the feed engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("invalid price for {symbol}: {price}")]
    InvalidPrice { symbol: Symbol, price: Decimal },

    #[error("invalid traded quantity for {symbol}: {quantity}")]
    InvalidQuantity { symbol: Symbol, quantity: i64 },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("instrument provider failed: {0}")]
    Provider(String),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(Symbol),

    #[error("feed scheduler requires a running tokio runtime")]
    NoRuntime,
}

/// A failure while processing one instrument inside a scheduler cycle.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("tick for {symbol} skipped: {source}")]
pub struct TickError {
    pub symbol: Symbol,
    #[source]
    pub source: FeedError,
}

impl TickError {
    pub fn new(symbol: Symbol, source: FeedError) -> Self {
        Self { symbol, source }
    }
}
