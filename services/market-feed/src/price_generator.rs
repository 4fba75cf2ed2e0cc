//! Bounded multiplicative random walk
//!
//! Each call walks `steps_per_tick` sub-steps from the current price,
//! multiplying by `exp(volatility * g)` for a standard-normal draw `g`, then
//! clamps into `[min_price, max_price]` and rounds half-up to the configured
//! scale. Bounds finer than the scale are pulled inward onto the price grid
//! at construction so a rounded price never leaves the range. Non-finite intermediate results saturate to the bound on the side
//! they overflowed.

use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use types::numeric::{round_half_up, Price, PRICE_SCALE};

use crate::error::ConfigError;
use crate::sampling::NormalSource;

pub struct PriceGenerator {
    source: Box<dyn NormalSource>,
    min_price: Decimal,
    max_price: Decimal,
    steps_per_tick: u32,
    scale: u32,
}

impl PriceGenerator {
    /// Build a generator; rejects `min_price > max_price` and zero steps.
    pub fn new(
        source: Box<dyn NormalSource>,
        min_price: Price,
        max_price: Price,
        steps_per_tick: u32,
    ) -> Result<Self, ConfigError> {
        Self::with_scale(source, min_price, max_price, steps_per_tick, PRICE_SCALE)
    }

    /// Same as [`PriceGenerator::new`] with an explicit rounding scale.
    pub fn with_scale(
        source: Box<dyn NormalSource>,
        min_price: Price,
        max_price: Price,
        steps_per_tick: u32,
        scale: u32,
    ) -> Result<Self, ConfigError> {
        if min_price > max_price {
            return Err(ConfigError::InvertedPriceRange {
                min: min_price.as_decimal(),
                max: max_price.as_decimal(),
            });
        }
        if steps_per_tick == 0 {
            return Err(ConfigError::StepsPerTick(steps_per_tick));
        }

        let floor = min_price
            .as_decimal()
            .round_dp_with_strategy(scale, RoundingStrategy::ToPositiveInfinity);
        let ceiling = max_price
            .as_decimal()
            .round_dp_with_strategy(scale, RoundingStrategy::ToNegativeInfinity);
        if floor > ceiling {
            return Err(ConfigError::InvertedPriceRange {
                min: min_price.as_decimal(),
                max: max_price.as_decimal(),
            });
        }

        Ok(Self {
            source,
            min_price: floor,
            max_price: ceiling,
            steps_per_tick,
            scale,
        })
    }

    /// Propose the next price.
    ///
    /// `_open_price` is accepted for callers that anchor drift to the session
    /// open; the multiplicative step itself starts from `current_price`.
    pub fn next_price(
        &mut self,
        _open_price: Decimal,
        current_price: Decimal,
        volatility: Decimal,
    ) -> Decimal {
        let sigma = volatility.to_f64().unwrap_or(0.0);
        let mut price = current_price.to_f64().unwrap_or(0.0);

        for _ in 0..self.steps_per_tick {
            let g = self.source.next_gaussian();
            price *= (sigma * g).exp();
        }

        let mut next = round_half_up(self.clamp(price), self.scale);
        next.rescale(self.scale);
        next
    }

    fn clamp(&self, raw: f64) -> Decimal {
        if raw.is_nan() {
            return self.min_price;
        }
        if raw == f64::INFINITY {
            return self.max_price;
        }
        match Decimal::from_f64(raw) {
            Some(value) => value.clamp(self.min_price, self.max_price),
            // Finite but outside Decimal's range: only reachable on overflow.
            None if raw > 0.0 => self.max_price,
            None => self.min_price,
        }
    }
}

impl std::fmt::Debug for PriceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceGenerator")
            .field("min_price", &self.min_price)
            .field("max_price", &self.max_price)
            .field("steps_per_tick", &self.steps_per_tick)
            .field("scale", &self.scale)
            .finish()
    }
}
