//! Rolling-window volatility guard (per-symbol circuit breaker)
//!
//! Each symbol carries an anchor price, the start of its current window and
//! two independent suppression bits. A candidate move beyond `+band` from the
//! anchor suppresses further up-moves, beyond `-band` suppresses down-moves.
//! Bits only go false -> true inside a window; both clear together once the
//! window has elapsed.
//!
//! Records are replaced whole in a concurrent map, so `snapshot` readers on
//! other threads never observe a half-updated record.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::clock::Clock;
use types::ids::Symbol;
use types::numeric::fractional_move;

/// Direction of a price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

/// Guard record for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardState {
    pub anchor_price: Decimal,
    pub window_start: DateTime<Utc>,
    pub up_suppressed: bool,
    pub down_suppressed: bool,
}

impl GuardState {
    fn open(anchor: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            anchor_price: anchor,
            window_start: now,
            up_suppressed: false,
            down_suppressed: false,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.up_suppressed || self.down_suppressed
    }
}

/// What a `register` call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    /// The window decayed while at least one direction was suppressed.
    pub released: bool,
    /// Direction newly suppressed by this call.
    pub triggered: Option<Direction>,
    /// Record after the call.
    pub state: GuardState,
}

pub struct RollingMinuteVolatilityGuard {
    band: Decimal,
    window: Duration,
    clock: Arc<dyn Clock>,
    states: DashMap<Symbol, GuardState>,
}

impl RollingMinuteVolatilityGuard {
    pub fn new(band: Decimal, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            band,
            window,
            clock,
            states: DashMap::new(),
        }
    }

    /// Record a candidate move for `symbol` measured against `anchor`.
    ///
    /// `anchor` is stored only when a window opens; later calls in the same
    /// window keep the window's anchor.
    pub fn register(&self, symbol: &Symbol, anchor: Decimal, candidate: Decimal) -> GuardOutcome {
        let now = self.clock.now();
        let (mut next, released) = match self.states.get(symbol).map(|r| r.value().clone()) {
            None => (GuardState::open(anchor, now), false),
            Some(current) if self.window_elapsed(&current, now) => {
                (GuardState::open(anchor, now), current.is_suppressed())
            }
            Some(current) => (current, false),
        };

        let mut triggered = None;
        if let Some(movement) = fractional_move(anchor, candidate) {
            if movement > self.band && !next.up_suppressed {
                next.up_suppressed = true;
                triggered = Some(Direction::Up);
            } else if movement < -self.band && !next.down_suppressed {
                next.down_suppressed = true;
                triggered = Some(Direction::Down);
            }
        }

        debug!(
            symbol = %symbol,
            anchor = %anchor,
            candidate = %candidate,
            up_suppressed = next.up_suppressed,
            down_suppressed = next.down_suppressed,
            "Guard registered move"
        );

        self.states.insert(symbol.clone(), next.clone());
        GuardOutcome {
            released,
            triggered,
            state: next,
        }
    }

    /// Decay the window for `symbol` if it has elapsed, re-anchoring the new
    /// window at `anchor`.
    ///
    /// Returns true when suppression bits were cleared by the decay.
    pub fn expire_window(&self, symbol: &Symbol, anchor: Decimal) -> bool {
        let now = self.clock.now();
        let current = match self.states.get(symbol).map(|r| r.value().clone()) {
            Some(current) => current,
            None => return false,
        };
        if !self.window_elapsed(&current, now) {
            return false;
        }

        let released = current.is_suppressed();
        self.states.insert(symbol.clone(), GuardState::open(anchor, now));
        released
    }

    /// Anchor of the active window, or `fallback` if the symbol is unseen or
    /// its window has elapsed.
    pub fn anchor_for(&self, symbol: &Symbol, fallback: Decimal) -> Decimal {
        let now = self.clock.now();
        match self.states.get(symbol) {
            Some(state) if !self.window_elapsed(state.value(), now) => state.anchor_price,
            _ => fallback,
        }
    }

    pub fn can_move_up(&self, symbol: &Symbol) -> bool {
        self.states
            .get(symbol)
            .map(|s| !s.up_suppressed)
            .unwrap_or(true)
    }

    pub fn can_move_down(&self, symbol: &Symbol) -> bool {
        self.states
            .get(symbol)
            .map(|s| !s.down_suppressed)
            .unwrap_or(true)
    }

    /// Whether a move in `direction` is currently permitted.
    pub fn can_move(&self, symbol: &Symbol, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.can_move_up(symbol),
            Direction::Down => self.can_move_down(symbol),
        }
    }

    pub fn snapshot(&self, symbol: &Symbol) -> Option<GuardState> {
        self.states.get(symbol).map(|r| r.value().clone())
    }

    fn window_elapsed(&self, state: &GuardState, now: DateTime<Utc>) -> bool {
        now - state.window_start >= self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::clock::ManualClock;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn guard() -> (RollingMinuteVolatilityGuard, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let guard = RollingMinuteVolatilityGuard::new(d("0.05"), Duration::seconds(60), clock.clone());
        (guard, clock)
    }

    #[test]
    fn test_unseen_symbol_is_unrestricted() {
        let (guard, _) = guard();
        let sym = Symbol::new("AAPL");
        assert!(guard.can_move_up(&sym));
        assert!(guard.can_move_down(&sym));
        assert!(guard.snapshot(&sym).is_none());
    }

    #[test]
    fn test_up_band_breach_then_decay() {
        let (guard, clock) = guard();
        let sym = Symbol::new("AAPL");

        // +4.9%: within band
        let outcome = guard.register(&sym, d("100.00"), d("104.90"));
        assert_eq!(outcome.triggered, None);
        assert!(guard.can_move_up(&sym));
        assert!(guard.can_move_down(&sym));

        // +5.6% in the same window
        clock.advance(Duration::seconds(10));
        let outcome = guard.register(&sym, d("100.00"), d("105.60"));
        assert_eq!(outcome.triggered, Some(Direction::Up));
        let snap = guard.snapshot(&sym).unwrap();
        assert!(snap.up_suppressed);
        assert!(!snap.down_suppressed);
        assert!(!guard.can_move_up(&sym));
        assert!(guard.can_move_down(&sym));

        // Window elapses
        clock.advance(Duration::seconds(61));
        let outcome = guard.register(&sym, d("100.00"), d("104.20"));
        assert!(outcome.released);
        assert_eq!(outcome.triggered, None);
        let snap = guard.snapshot(&sym).unwrap();
        assert!(!snap.up_suppressed);
        assert!(!snap.down_suppressed);
        assert_eq!(snap.window_start, clock.now());
    }

    #[test]
    fn test_down_band_breach_is_symmetric() {
        let (guard, _) = guard();
        let sym = Symbol::new("TSLA");

        let outcome = guard.register(&sym, d("100.00"), d("94.50"));
        assert_eq!(outcome.triggered, Some(Direction::Down));
        let snap = guard.snapshot(&sym).unwrap();
        assert!(snap.down_suppressed);
        assert!(!snap.up_suppressed);
    }

    #[test]
    fn test_bits_do_not_reset_mid_window() {
        let (guard, clock) = guard();
        let sym = Symbol::new("MSFT");

        guard.register(&sym, d("100"), d("106"));
        clock.advance(Duration::seconds(30));
        // Back within band: up stays suppressed
        let outcome = guard.register(&sym, d("100"), d("100.50"));
        assert!(!outcome.released);
        assert!(!guard.can_move_up(&sym));

        // Opposite breach sets the other bit without touching the first
        guard.register(&sym, d("100"), d("90"));
        let snap = guard.snapshot(&sym).unwrap();
        assert!(snap.up_suppressed);
        assert!(snap.down_suppressed);
    }

    #[test]
    fn test_exact_band_is_not_a_breach() {
        let (guard, _) = guard();
        let sym = Symbol::new("IBM");
        let outcome = guard.register(&sym, d("100"), d("105"));
        assert_eq!(outcome.triggered, None);
        assert!(guard.can_move_up(&sym));
    }

    #[test]
    fn test_repeat_breach_does_not_retrigger() {
        let (guard, _) = guard();
        let sym = Symbol::new("IBM");
        assert_eq!(guard.register(&sym, d("100"), d("107")).triggered, Some(Direction::Up));
        assert_eq!(guard.register(&sym, d("100"), d("108")).triggered, None);
    }

    #[test]
    fn test_expire_window_releases() {
        let (guard, clock) = guard();
        let sym = Symbol::new("NFLX");

        guard.register(&sym, d("100"), d("110"));
        assert!(!guard.expire_window(&sym, d("110")));

        clock.advance(Duration::seconds(60));
        assert!(guard.expire_window(&sym, d("110")));
        assert!(guard.can_move_up(&sym));
        assert_eq!(guard.anchor_for(&sym, d("1")), d("110"));
        assert_eq!(guard.snapshot(&sym).unwrap().window_start, clock.now());

        // Nothing left to release
        clock.advance(Duration::seconds(60));
        assert!(!guard.expire_window(&sym, d("110")));
        assert!(!guard.expire_window(&Symbol::new("UNSEEN"), d("1")));
    }

    #[test]
    fn test_anchor_for_follows_window() {
        let (guard, clock) = guard();
        let sym = Symbol::new("AMZN");

        assert_eq!(guard.anchor_for(&sym, d("50")), d("50"));
        guard.register(&sym, d("50"), d("51"));
        assert_eq!(guard.anchor_for(&sym, d("51")), d("50"));

        clock.advance(Duration::seconds(61));
        assert_eq!(guard.anchor_for(&sym, d("51")), d("51"));
    }

    #[test]
    fn test_window_keeps_opening_anchor() {
        let (guard, clock) = guard();
        let sym = Symbol::new("ORCL");

        guard.register(&sym, d("100"), d("101"));
        clock.advance(Duration::seconds(5));

        // +1.8% against this call's anchor; the window still reports 100
        let outcome = guard.register(&sym, d("110"), d("112"));
        assert_eq!(outcome.triggered, None);
        assert_eq!(outcome.state.anchor_price, d("100"));
        assert_eq!(guard.snapshot(&sym).unwrap().anchor_price, d("100"));
        assert_eq!(guard.anchor_for(&sym, d("112")), d("100"));

        // A fresh window takes the new anchor
        clock.advance(Duration::seconds(60));
        guard.register(&sym, d("112"), d("113"));
        assert_eq!(guard.snapshot(&sym).unwrap().anchor_price, d("112"));
    }

    #[test]
    fn test_concurrent_snapshot_reads() {
        let (guard, _) = guard();
        let guard = Arc::new(guard);
        let sym = Symbol::new("AAPL");
        guard.register(&sym, d("100"), d("101"));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let sym = sym.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let snap = guard.snapshot(&sym).unwrap();
                        assert_eq!(snap.anchor_price, d("100"));
                    }
                })
            })
            .collect();

        for i in 0..1_000 {
            let candidate = if i % 2 == 0 { d("110") } else { d("90") };
            guard.register(&sym, d("100"), candidate);
        }

        for handle in readers {
            handle.join().unwrap();
        }
    }
}
