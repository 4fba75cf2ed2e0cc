//! Per-symbol session state
//!
//! Holds the running session snapshot for one instrument: open, last, high,
//! low, cumulative volume and the derived change figures. The scheduler is
//! the only writer; readers receive clones.
//!
//! Invariants after every successful update:
//! - `session_low <= last_price <= session_high`
//! - `session_open` never changes
//! - `cumulative_volume` never decreases
//! - `last_updated` never moves backwards

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::clock::Clock;
use types::ids::{ExchangeCode, Symbol};
use types::numeric::{percent_change, round_price};

use crate::error::FeedError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentState {
    symbol: Symbol,
    exchange_code: ExchangeCode,
    session_open: Decimal,
    last_price: Decimal,
    session_high: Decimal,
    session_low: Decimal,
    cumulative_volume: u64,
    last_updated: DateTime<Utc>,
    change: Decimal,
    change_percent: Decimal,
}

impl InstrumentState {
    /// Open a session for `symbol` at `open_price`.
    pub fn create(
        symbol: Symbol,
        exchange_code: ExchangeCode,
        open_price: Decimal,
        clock: &dyn Clock,
    ) -> Result<Self, FeedError> {
        if open_price <= Decimal::ZERO {
            return Err(FeedError::InvalidPrice {
                symbol,
                price: open_price,
            });
        }

        Ok(Self {
            symbol,
            exchange_code,
            session_open: open_price,
            last_price: open_price,
            session_high: open_price,
            session_low: open_price,
            cumulative_volume: 0,
            last_updated: clock.now(),
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
        })
    }

    /// Apply one tick.
    ///
    /// On error the state is left untouched.
    pub fn update_with_tick(
        &mut self,
        new_price: Decimal,
        traded_quantity: i64,
        clock: &dyn Clock,
    ) -> Result<(), FeedError> {
        if new_price <= Decimal::ZERO {
            return Err(FeedError::InvalidPrice {
                symbol: self.symbol.clone(),
                price: new_price,
            });
        }
        if traded_quantity < 0 {
            return Err(FeedError::InvalidQuantity {
                symbol: self.symbol.clone(),
                quantity: traded_quantity,
            });
        }

        self.last_price = new_price;
        if new_price > self.session_high {
            self.session_high = new_price;
        }
        if new_price < self.session_low {
            self.session_low = new_price;
        }
        self.cumulative_volume = self
            .cumulative_volume
            .saturating_add(traded_quantity as u64);

        let now = clock.now();
        if now > self.last_updated {
            self.last_updated = now;
        }

        self.change = round_price(self.last_price - self.session_open);
        self.change_percent = percent_change(self.session_open, self.last_price);
        Ok(())
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn exchange_code(&self) -> &ExchangeCode {
        &self.exchange_code
    }

    pub fn session_open(&self) -> Decimal {
        self.session_open
    }

    pub fn last_price(&self) -> Decimal {
        self.last_price
    }

    pub fn session_high(&self) -> Decimal {
        self.session_high
    }

    pub fn session_low(&self) -> Decimal {
        self.session_low
    }

    pub fn cumulative_volume(&self) -> u64 {
        self.cumulative_volume
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// `last_price - session_open`, 2 dp.
    pub fn change(&self) -> Decimal {
        self.change
    }

    /// `change / session_open * 100`, 2 dp.
    pub fn change_percent(&self) -> Decimal {
        self.change_percent
    }

    /// Validate the OHLC ordering invariant.
    pub fn is_consistent(&self) -> bool {
        self.session_low <= self.last_price
            && self.last_price <= self.session_high
            && self.session_low <= self.session_open
            && self.session_open <= self.session_high
    }
}
