//! Feed counters and per-exchange tick rates
//!
//! Counters are relaxed atomics bumped by the scheduler and read by status
//! callers. Tick rate is the number of applied ticks inside a trailing
//! one-second window, tracked per exchange.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use types::ids::ExchangeCode;

/// Monotonic feed counters.
#[derive(Debug, Default)]
pub struct FeedCounters {
    pub ticks_applied: AtomicU64,
    pub ticks_clamped: AtomicU64,
    pub ticks_failed: AtomicU64,
    pub quotes_emitted: AtomicU64,
    pub bars_emitted: AtomicU64,
}

impl FeedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&self) {
        self.ticks_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// A tick held at the last price because its direction was suppressed.
    pub fn record_clamped(&self) {
        self.ticks_clamped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.ticks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quote(&self) {
        self.quotes_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bar(&self) {
        self.bars_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            ticks_applied: self.ticks_applied.load(Ordering::Relaxed),
            ticks_clamped: self.ticks_clamped.load(Ordering::Relaxed),
            ticks_failed: self.ticks_failed.load(Ordering::Relaxed),
            quotes_emitted: self.quotes_emitted.load(Ordering::Relaxed),
            bars_emitted: self.bars_emitted.load(Ordering::Relaxed),
        }
    }

    /// Export as a name -> value map for scraping.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let snap = self.snapshot();
        let mut m = BTreeMap::new();
        m.insert("ticks_applied".to_string(), snap.ticks_applied);
        m.insert("ticks_clamped".to_string(), snap.ticks_clamped);
        m.insert("ticks_failed".to_string(), snap.ticks_failed);
        m.insert("quotes_emitted".to_string(), snap.quotes_emitted);
        m.insert("bars_emitted".to_string(), snap.bars_emitted);
        m
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub ticks_applied: u64,
    pub ticks_clamped: u64,
    pub ticks_failed: u64,
    pub quotes_emitted: u64,
    pub bars_emitted: u64,
}

#[derive(Debug, Default)]
struct ExchangeTicks {
    recent: VecDeque<DateTime<Utc>>,
    last_tick: Option<DateTime<Utc>>,
}

impl ExchangeTicks {
    fn evict(&mut self, now: DateTime<Utc>, window: Duration) {
        while let Some(front) = self.recent.front() {
            if now - *front >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Trailing-window tick counter keyed by exchange.
#[derive(Debug)]
pub struct TickRateCounter {
    window: Duration,
    exchanges: DashMap<ExchangeCode, ExchangeTicks>,
}

impl Default for TickRateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TickRateCounter {
    /// Counter over a one-second trailing window.
    pub fn new() -> Self {
        Self::with_window(Duration::seconds(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            exchanges: DashMap::new(),
        }
    }

    pub fn record(&self, exchange: &ExchangeCode, now: DateTime<Utc>) {
        let mut entry = self.exchanges.entry(exchange.clone()).or_default();
        entry.evict(now, self.window);
        entry.recent.push_back(now);
        entry.last_tick = Some(match entry.last_tick {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }

    /// Ticks per second over the trailing window ending at `now`.
    pub fn rate(&self, exchange: &ExchangeCode, now: DateTime<Utc>) -> f64 {
        let Some(entry) = self.exchanges.get(exchange) else {
            return 0.0;
        };
        let in_window = entry
            .recent
            .iter()
            .filter(|t| now - **t < self.window && **t <= now)
            .count();
        let secs = self.window.num_milliseconds() as f64 / 1_000.0;
        if secs <= 0.0 {
            return 0.0;
        }
        in_window as f64 / secs
    }

    pub fn last_tick(&self, exchange: &ExchangeCode) -> Option<DateTime<Utc>> {
        self.exchanges.get(exchange).and_then(|e| e.last_tick)
    }

    pub fn reset(&self) {
        for mut entry in self.exchanges.iter_mut() {
            entry.recent.clear();
        }
    }
}
