//! Types library for the synthetic market-data feed
//!
//! Shared definitions used by the feed engine and the distribution gateway,
//! keeping identifiers, decimal rounding and time handling consistent across
//! services.
//!
//! # Modules
//! - `ids`: Instrument identifiers (Symbol, ExchangeCode, AssetClass)
//! - `numeric`: Decimal price helpers (2 dp, HALF_UP rounding)
//! - `clock`: Injectable time source (system and manual clocks)
//! - `errors`: Error taxonomy for shared types

pub mod clock;
pub mod errors;
pub mod ids;
pub mod numeric;
