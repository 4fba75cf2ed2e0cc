//! Fixed-point decimal helpers for prices
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! All published prices carry 2 decimal places with HALF_UP rounding
//! (ties away from zero).

use std::fmt;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::PriceError;

/// Decimal places used for every published price.
pub const PRICE_SCALE: u32 = 2;

/// Round a decimal to `dp` places, ties away from zero.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a price to exactly [`PRICE_SCALE`] places, ties away from zero.
pub fn round_price(value: Decimal) -> Decimal {
    let mut rounded = round_half_up(value, PRICE_SCALE);
    rounded.rescale(PRICE_SCALE);
    rounded
}

/// Percentage move from `base` to `value`, rounded to 2 dp.
///
/// Returns zero when `base` is zero.
pub fn percent_change(base: Decimal, value: Decimal) -> Decimal {
    if base.is_zero() {
        return Decimal::ZERO;
    }
    round_price((value - base) * Decimal::ONE_HUNDRED / base)
}

/// Fractional move from `anchor` to `candidate` (0.05 == +5%).
///
/// Returns None when the anchor is zero.
pub fn fractional_move(anchor: Decimal, candidate: Decimal) -> Option<Decimal> {
    (candidate - anchor).checked_div(anchor)
}

/// A strictly positive price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting zero and negative values.
    pub fn try_new(value: Decimal) -> Result<Self, PriceError> {
        if value <= Decimal::ZERO {
            return Err(PriceError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// Parse a price from a decimal string.
    pub fn parse(value: &str) -> Result<Self, PriceError> {
        let d = Decimal::from_str_exact(value)
            .map_err(|_| PriceError::Unparseable(value.to_string()))?;
        Self::try_new(d)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Price rounded to [`PRICE_SCALE`] places.
    pub fn rounded(&self) -> Decimal {
        round_price(self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
