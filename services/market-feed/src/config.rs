//! Feed configuration
//!
//! Loaded from `FEED_*` environment variables or a JSON file, then validated
//! once at startup. Out-of-range knobs are fatal.
//!
//! Volatility overrides are keyed by `"EXCHANGE:ASSET_CLASS"`, `"ASSET_CLASS"`
//! or `"EXCHANGE"`; resolution order is documented on
//! [`FeedConfig::volatility_for`].

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{AssetClass, ExchangeCode};
use types::numeric::Price;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Scheduler period in milliseconds (100..=1000).
    pub interval_ms: u64,
    /// Instruments sampled per cycle (1..=10).
    pub batch_size: usize,
    /// Seconds between bars per instrument (1..=600).
    pub bar_interval_seconds: u64,
    pub min_price: Decimal,
    pub max_price: Decimal,
    /// Open price for instruments without one.
    pub default_price: Decimal,
    /// Fractional move that trips the guard.
    pub volatility_band: Decimal,
    pub volatility_overrides: HashMap<String, Decimal>,
    /// Random-walk sub-steps per tick (1..=50).
    pub steps_per_tick: u32,
    /// Per-step volatility used when no override matches.
    pub default_volatility: Option<Decimal>,
    /// Guard window length in seconds (1..=3600).
    pub guard_window_seconds: u64,
    pub min_tick_volume: u64,
    pub max_tick_volume: u64,
    /// Fixed seed for the default sampler.
    pub seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval_ms: 750,
            batch_size: 4,
            bar_interval_seconds: 60,
            min_price: Decimal::new(100, 2),
            max_price: Decimal::new(1_000_000, 2),
            default_price: Decimal::new(10_000, 2),
            volatility_band: Decimal::new(5, 2),
            volatility_overrides: HashMap::new(),
            steps_per_tick: 4,
            default_volatility: None,
            guard_window_seconds: 60,
            min_tick_volume: 1,
            max_tick_volume: 500,
            seed: None,
        }
    }
}

const MIN_PRICE_FLOOR: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
const MIN_BAND: Decimal = Decimal::from_parts(1, 0, 0, false, 3);
const MIN_VOLATILITY: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

impl FeedConfig {
    /// Check every knob against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=1000).contains(&self.interval_ms) {
            return Err(ConfigError::Interval(self.interval_ms));
        }
        if !(1..=10).contains(&self.batch_size) {
            return Err(ConfigError::BatchSize(self.batch_size));
        }
        if !(1..=600).contains(&self.bar_interval_seconds) {
            return Err(ConfigError::BarInterval(self.bar_interval_seconds));
        }

        at_least("min_price", self.min_price, MIN_PRICE_FLOOR)?;
        at_least("max_price", self.max_price, MIN_PRICE_FLOOR)?;
        at_least("default_price", self.default_price, MIN_PRICE_FLOOR)?;
        if self.min_price > self.max_price {
            return Err(ConfigError::InvertedPriceRange {
                min: self.min_price,
                max: self.max_price,
            });
        }

        at_least("volatility_band", self.volatility_band, MIN_BAND)?;
        for (key, value) in &self.volatility_overrides {
            if *value < MIN_VOLATILITY {
                return Err(ConfigError::OverrideBelowMinimum {
                    key: key.clone(),
                    min: MIN_VOLATILITY,
                    value: *value,
                });
            }
        }
        if let Some(vol) = self.default_volatility {
            at_least("default_volatility", vol, MIN_VOLATILITY)?;
        }

        if !(1..=50).contains(&self.steps_per_tick) {
            return Err(ConfigError::StepsPerTick(self.steps_per_tick));
        }
        if !(1..=3600).contains(&self.guard_window_seconds) {
            return Err(ConfigError::GuardWindow(self.guard_window_seconds));
        }
        if self.min_tick_volume > self.max_tick_volume {
            return Err(ConfigError::InvertedVolumeRange {
                min: self.min_tick_volume,
                max: self.max_tick_volume,
            });
        }
        Ok(())
    }

    /// Load from `FEED_*` environment variables over defaults, then validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (environment-shaped keys).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("FEED_INTERVAL_MS") {
            config.interval_ms = parse("FEED_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("FEED_BATCH_SIZE") {
            config.batch_size = parse("FEED_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("FEED_BAR_INTERVAL_SECONDS") {
            config.bar_interval_seconds = parse("FEED_BAR_INTERVAL_SECONDS", &v)?;
        }
        if let Some(v) = lookup("FEED_MIN_PRICE") {
            config.min_price = parse("FEED_MIN_PRICE", &v)?;
        }
        if let Some(v) = lookup("FEED_MAX_PRICE") {
            config.max_price = parse("FEED_MAX_PRICE", &v)?;
        }
        if let Some(v) = lookup("FEED_DEFAULT_PRICE") {
            config.default_price = parse("FEED_DEFAULT_PRICE", &v)?;
        }
        if let Some(v) = lookup("FEED_VOLATILITY_BAND") {
            config.volatility_band = parse("FEED_VOLATILITY_BAND", &v)?;
        }
        if let Some(v) = lookup("FEED_VOLATILITY_OVERRIDES") {
            config.volatility_overrides = parse_overrides(&v)?;
        }
        if let Some(v) = lookup("FEED_STEPS_PER_TICK") {
            config.steps_per_tick = parse("FEED_STEPS_PER_TICK", &v)?;
        }
        if let Some(v) = lookup("FEED_DEFAULT_VOLATILITY") {
            config.default_volatility = Some(parse("FEED_DEFAULT_VOLATILITY", &v)?);
        }
        if let Some(v) = lookup("FEED_GUARD_WINDOW_SECONDS") {
            config.guard_window_seconds = parse("FEED_GUARD_WINDOW_SECONDS", &v)?;
        }
        if let Some(v) = lookup("FEED_MIN_TICK_VOLUME") {
            config.min_tick_volume = parse("FEED_MIN_TICK_VOLUME", &v)?;
        }
        if let Some(v) = lookup("FEED_MAX_TICK_VOLUME") {
            config.max_tick_volume = parse("FEED_MAX_TICK_VOLUME", &v)?;
        }
        if let Some(v) = lookup("FEED_SEED") {
            config.seed = Some(parse("FEED_SEED", &v)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| ConfigError::Unparseable {
            key: "json".to_string(),
            value: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Per-step volatility for an instrument.
    ///
    /// Lookup order: `"EXCHANGE:CLASS"` override, asset-class override,
    /// exchange override, `default_volatility`, then the guard band.
    pub fn volatility_for(&self, exchange: &ExchangeCode, asset_class: AssetClass) -> Decimal {
        let combined = format!("{}:{}", exchange.as_str(), asset_class.as_str());
        self.lookup_override(&combined)
            .or_else(|| self.lookup_override(asset_class.as_str()))
            .or_else(|| self.lookup_override(exchange.as_str()))
            .or(self.default_volatility)
            .unwrap_or(self.volatility_band)
    }

    fn lookup_override(&self, key: &str) -> Option<Decimal> {
        self.volatility_overrides.get(key).copied().or_else(|| {
            self.volatility_overrides
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| *v)
        })
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }

    pub fn bar_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.bar_interval_seconds as i64)
    }

    pub fn guard_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.guard_window_seconds as i64)
    }

    /// Price bounds as validated `Price` values.
    pub fn price_bounds(&self) -> Result<(Price, Price), ConfigError> {
        let min = Price::try_new(self.min_price).map_err(|_| ConfigError::BelowMinimum {
            name: "min_price",
            min: MIN_PRICE_FLOOR,
            value: self.min_price,
        })?;
        let max = Price::try_new(self.max_price).map_err(|_| ConfigError::BelowMinimum {
            name: "max_price",
            min: MIN_PRICE_FLOOR,
            value: self.max_price,
        })?;
        Ok((min, max))
    }
}

fn at_least(name: &'static str, value: Decimal, min: Decimal) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::BelowMinimum { name, min, value });
    }
    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Unparseable {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parse `"NSE:EQUITY=0.02,CRYPTO=0.08"`.
fn parse_overrides(raw: &str) -> Result<HashMap<String, Decimal>, ConfigError> {
    let mut out = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| ConfigError::Unparseable {
            key: "FEED_VOLATILITY_OVERRIDES".to_string(),
            value: pair.to_string(),
        })?;
        let value: Decimal = parse("FEED_VOLATILITY_OVERRIDES", value)?;
        out.insert(key.trim().to_ascii_uppercase(), value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = FeedConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval_ms, 750);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.bar_interval_seconds, 60);
        assert_eq!(config.min_price, d("1.00"));
        assert_eq!(config.max_price, d("10000.00"));
        assert_eq!(config.default_price, d("100.00"));
        assert_eq!(config.volatility_band, d("0.05"));
    }

    #[test]
    fn test_range_violations() {
        let mut config = FeedConfig::default();
        config.interval_ms = 99;
        assert_eq!(config.validate(), Err(ConfigError::Interval(99)));

        let mut config = FeedConfig::default();
        config.batch_size = 11;
        assert_eq!(config.validate(), Err(ConfigError::BatchSize(11)));

        let mut config = FeedConfig::default();
        config.bar_interval_seconds = 601;
        assert_eq!(config.validate(), Err(ConfigError::BarInterval(601)));

        let mut config = FeedConfig::default();
        config.volatility_band = d("0.0009");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BelowMinimum { name: "volatility_band", .. })
        ));

        let mut config = FeedConfig::default();
        config.default_price = d("0.001");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BelowMinimum { name: "default_price", .. })
        ));

        let mut config = FeedConfig::default();
        config.volatility_overrides.insert("CRYPTO".into(), d("0.00005"));
        assert_eq!(
            config.validate(),
            Err(ConfigError::OverrideBelowMinimum {
                key: "CRYPTO".into(),
                min: d("0.0001"),
                value: d("0.00005"),
            })
        );
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let mut config = FeedConfig::default();
        config.min_price = d("500");
        config.max_price = d("100");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedPriceRange { .. })
        ));

        let mut config = FeedConfig::default();
        config.min_tick_volume = 10;
        config.max_tick_volume = 5;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedVolumeRange { min: 10, max: 5 })
        );
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = FeedConfig::from_lookup(lookup(&[
            ("FEED_INTERVAL_MS", "250"),
            ("FEED_BATCH_SIZE", "2"),
            ("FEED_VOLATILITY_BAND", "0.03"),
            ("FEED_VOLATILITY_OVERRIDES", "nse:equity=0.02, CRYPTO=0.08"),
            ("FEED_SEED", "42"),
        ]))
        .unwrap();

        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.volatility_band, d("0.03"));
        assert_eq!(config.volatility_overrides["NSE:EQUITY"], d("0.02"));
        assert_eq!(config.volatility_overrides["CRYPTO"], d("0.08"));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.bar_interval_seconds, 60);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = FeedConfig::from_lookup(lookup(&[("FEED_BATCH_SIZE", "four")])).unwrap_err();
        assert!(matches!(err, ConfigError::Unparseable { .. }));

        let err = FeedConfig::from_lookup(lookup(&[("FEED_BATCH_SIZE", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::BatchSize(0));
    }

    #[test]
    fn test_from_json_partial() {
        let config = FeedConfig::from_json_str(
            r#"{"interval_ms": 500, "volatility_overrides": {"NYSE": "0.01"}}"#,
        )
        .unwrap();
        assert_eq!(config.interval_ms, 500);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.volatility_overrides["NYSE"], d("0.01"));

        assert!(FeedConfig::from_json_str(r#"{"interval_ms": 5000}"#).is_err());
        assert!(FeedConfig::from_json_file("/nonexistent/feed.json").is_err());
    }

    #[test]
    fn test_volatility_resolution_order() {
        let mut config = FeedConfig::default();
        let nse = ExchangeCode::new("NSE");
        let nyse = ExchangeCode::new("NYSE");

        assert_eq!(config.volatility_for(&nse, AssetClass::Equity), d("0.05"));

        config.default_volatility = Some(d("0.002"));
        assert_eq!(config.volatility_for(&nse, AssetClass::Equity), d("0.002"));

        config.volatility_overrides.insert("NSE".into(), d("0.004"));
        assert_eq!(config.volatility_for(&nse, AssetClass::Equity), d("0.004"));

        config.volatility_overrides.insert("EQUITY".into(), d("0.003"));
        assert_eq!(config.volatility_for(&nse, AssetClass::Equity), d("0.003"));
        assert_eq!(config.volatility_for(&nyse, AssetClass::Equity), d("0.003"));

        config.volatility_overrides.insert("NSE:EQUITY".into(), d("0.001"));
        assert_eq!(config.volatility_for(&nse, AssetClass::Equity), d("0.001"));
        assert_eq!(config.volatility_for(&nse, AssetClass::Crypto), d("0.004"));
    }
}
