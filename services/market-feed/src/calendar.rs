//! Trading calendar
//!
//! Decides per exchange and date whether the exchange is closed. The feed
//! checks the calendar on `start` and on every cycle.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use types::ids::ExchangeCode;

use crate::error::ConfigError;

pub trait TradingCalendar: Send + Sync {
    fn is_holiday(&self, exchange: &ExchangeCode, date: NaiveDate) -> bool;
}

/// Explicit holiday dates per exchange, optionally closing on weekends.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    weekends_closed: bool,
    holidays: HashMap<ExchangeCode, HashSet<NaiveDate>>,
}

impl HolidayCalendar {
    /// Calendar with no closures.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weekends_closed(mut self) -> Self {
        self.weekends_closed = true;
        self
    }

    pub fn with_holiday(mut self, exchange: ExchangeCode, date: NaiveDate) -> Self {
        self.add_holiday(exchange, date);
        self
    }

    pub fn add_holiday(&mut self, exchange: ExchangeCode, date: NaiveDate) {
        self.holidays.entry(exchange).or_default().insert(date);
    }

    /// Parse `"NSE:2026-01-26,NYSE:2026-07-03"`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut calendar = Self::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let unparseable = || ConfigError::Unparseable {
                key: "holidays".to_string(),
                value: entry.to_string(),
            };
            let (exchange, date) = entry.split_once(':').ok_or_else(unparseable)?;
            let exchange = ExchangeCode::try_new(exchange).ok_or_else(unparseable)?;
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| unparseable())?;
            calendar.add_holiday(exchange, date);
        }
        Ok(calendar)
    }
}

impl TradingCalendar for HolidayCalendar {
    fn is_holiday(&self, exchange: &ExchangeCode, date: NaiveDate) -> bool {
        if self.weekends_closed && matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return true;
        }
        self.holidays
            .get(exchange)
            .map(|dates| dates.contains(&date))
            .unwrap_or(false)
    }
}
