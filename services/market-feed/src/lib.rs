//! Synthetic Market Feed
//!
//! Fabricates per-instrument price and volume ticks, gates them through a
//! per-symbol volatility guard, keeps session statistics and emits quote and
//! bar snapshots to a sink.
//!
//! # Architecture
//!
//! ```text
//!   InstrumentProvider ──► FeedOrchestrator ◄── TradingCalendar
//!                               │  (scheduler, every interval_ms)
//!                               ▼
//!                        ┌─────────────┐
//!                        │PriceGenerator│  ← NormalSource
//!                        └──────┬──────┘
//!                               ▼
//!                     ┌──────────────────┐
//!                     │ VolatilityGuard  │ ──► FeedEventListener
//!                     └────────┬─────────┘
//!                              ▼
//!                      InstrumentState
//!                        │         │
//!                    ┌───▼──┐   ┌──▼──┐
//!                    │Quote │   │ Bar │
//!                    └───┬──┘   └──┬──┘
//!                        └────┬────┘
//!                             ▼
//!                      MarketDataSink
//! ```

pub mod bars;
pub mod calendar;
pub mod config;
pub mod error;
pub mod events;
pub mod instrument_state;
pub mod metrics;
pub mod orchestrator;
pub mod price_generator;
pub mod provider;
pub mod quotes;
pub mod sampling;
pub mod sink;
pub mod status;
pub mod volatility_guard;

pub use config::FeedConfig;
pub use error::{ConfigError, FeedError, TickError};
pub use orchestrator::{CycleReport, FeedOrchestrator, FeedOrchestratorBuilder, StartOutcome, StopOutcome};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
