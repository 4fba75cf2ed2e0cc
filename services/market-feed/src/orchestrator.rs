//! Feed orchestrator
//!
//! Owns the feed lifecycle (`STOPPED` <-> `RUNNING`), the periodic scheduler
//! and the per-symbol session state. One scheduler task is the only writer
//! of instrument and guard state; status and control calls read published
//! snapshots.
//!
//! `start` and `stop` serialize on one lifecycle lock, so a racing pair
//! resolves to a single winner and exactly one event per real transition.
//! Listeners run while that lock is held and must not call back into
//! `start`/`stop`.
//!
//! Cancelling the scheduler never interrupts a cycle: the cycle body is
//! synchronous and shutdown is observed between ticks.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use types::clock::{Clock, SystemClock};
use types::ids::{ExchangeCode, Symbol};

use crate::bars::{BarAggregator, BarSchedule};
use crate::calendar::{HolidayCalendar, TradingCalendar};
use crate::config::FeedConfig;
use crate::error::{FeedError, TickError};
use crate::events::{EventPublisher, FeedEvent, FeedEventListener, FeedEventPayload};
use crate::instrument_state::InstrumentState;
use crate::metrics::{FeedCounters, TickRateCounter};
use crate::price_generator::PriceGenerator;
use crate::provider::{Instrument, InstrumentProvider, InstrumentSnapshot, StaticInstrumentProvider};
use crate::quotes::Quote;
use crate::sampling::{NormalSource, SeededSampler, VolumeSource};
use crate::sink::{MarketDataSink, NullSink};
use crate::status::{ExchangeState, ExchangeStatus, FeedState, FeedStatus};
use crate::volatility_guard::{Direction, RollingMinuteVolatilityGuard};

/// Result of a `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// Every loaded exchange is on holiday; the feed stays stopped.
    AllExchangesClosed,
}

/// Result of a `stop` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

/// What one scheduler cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub selected: Vec<Symbol>,
    pub applied: usize,
    pub clamped: usize,
    pub failed: usize,
    pub bars: usize,
}

enum TickOutcome {
    Applied,
    Clamped,
}

struct Lifecycle {
    state: FeedState,
    started_at: Option<DateTime<Utc>>,
    universe: Arc<InstrumentSnapshot>,
    running_exchanges: Vec<ExchangeCode>,
    shutdown: Option<watch::Sender<bool>>,
}

/// Scheduler-owned mutable state.
struct TickEngine {
    generator: PriceGenerator,
    volumes: Box<dyn VolumeSource>,
    bars: BarSchedule,
    cursor: usize,
}

struct Inner {
    config: FeedConfig,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn InstrumentProvider>,
    calendar: Arc<dyn TradingCalendar>,
    sink: Arc<dyn MarketDataSink>,
    events: EventPublisher,
    guard: RollingMinuteVolatilityGuard,
    counters: FeedCounters,
    tick_rates: TickRateCounter,
    states: DashMap<Symbol, InstrumentState>,
    lifecycle: Mutex<Lifecycle>,
    engine: Mutex<TickEngine>,
}

pub struct FeedOrchestratorBuilder {
    config: FeedConfig,
    clock: Option<Arc<dyn Clock>>,
    provider: Option<Arc<dyn InstrumentProvider>>,
    calendar: Option<Arc<dyn TradingCalendar>>,
    sink: Option<Arc<dyn MarketDataSink>>,
    normal: Option<Box<dyn NormalSource>>,
    volumes: Option<Box<dyn VolumeSource>>,
    events: EventPublisher,
}

impl FeedOrchestratorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn InstrumentProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn calendar(mut self, calendar: Arc<dyn TradingCalendar>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn MarketDataSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn FeedEventListener>) -> Self {
        self.events.subscribe(listener);
        self
    }

    pub fn normal_source(mut self, source: Box<dyn NormalSource>) -> Self {
        self.normal = Some(source);
        self
    }

    pub fn volume_source(mut self, source: Box<dyn VolumeSource>) -> Self {
        self.volumes = Some(source);
        self
    }

    /// Validate the configuration and assemble the orchestrator.
    pub fn build(self) -> Result<FeedOrchestrator, FeedError> {
        let config = self.config;
        config.validate()?;
        let (min_price, max_price) = config.price_bounds()?;

        let normal: Box<dyn NormalSource> = match self.normal {
            Some(source) => source,
            None => Box::new(default_sampler(&config, 0)),
        };
        let volumes: Box<dyn VolumeSource> = match self.volumes {
            Some(source) => source,
            None => Box::new(default_sampler(&config, 1)),
        };
        let generator = PriceGenerator::new(normal, min_price, max_price, config.steps_per_tick)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let guard = RollingMinuteVolatilityGuard::new(
            config.volatility_band,
            config.guard_window(),
            Arc::clone(&clock),
        );
        let bars = BarSchedule::new(config.bar_interval());

        Ok(FeedOrchestrator {
            inner: Arc::new(Inner {
                clock,
                provider: self
                    .provider
                    .unwrap_or_else(|| Arc::new(StaticInstrumentProvider::default())),
                calendar: self.calendar.unwrap_or_else(|| Arc::new(HolidayCalendar::new())),
                sink: self.sink.unwrap_or_else(|| Arc::new(NullSink)),
                events: self.events,
                guard,
                counters: FeedCounters::new(),
                tick_rates: TickRateCounter::new(),
                states: DashMap::new(),
                lifecycle: Mutex::new(Lifecycle {
                    state: FeedState::Stopped,
                    started_at: None,
                    universe: Arc::new(InstrumentSnapshot::new()),
                    running_exchanges: Vec::new(),
                    shutdown: None,
                }),
                engine: Mutex::new(TickEngine {
                    generator,
                    volumes,
                    bars,
                    cursor: 0,
                }),
                config,
            }),
        })
    }
}

fn default_sampler(config: &FeedConfig, stream: u64) -> SeededSampler {
    match config.seed {
        Some(seed) => SeededSampler::new(
            seed.wrapping_add(stream),
            config.min_tick_volume,
            config.max_tick_volume,
        ),
        None => SeededSampler::from_entropy(config.min_tick_volume, config.max_tick_volume),
    }
}

/// Handle to the feed. Cloning shares the same feed.
#[derive(Clone)]
pub struct FeedOrchestrator {
    inner: Arc<Inner>,
}

impl FeedOrchestrator {
    pub fn builder(config: FeedConfig) -> FeedOrchestratorBuilder {
        FeedOrchestratorBuilder {
            config,
            clock: None,
            provider: None,
            calendar: None,
            sink: None,
            normal: None,
            volumes: None,
            events: EventPublisher::new(),
        }
    }

    /// Start the feed.
    ///
    /// Requires a tokio runtime on the calling thread to host the scheduler.
    pub fn start(&self, triggered_by: &str) -> Result<StartOutcome, FeedError> {
        let inner = &self.inner;
        let mut lifecycle = inner.lock_lifecycle();
        if lifecycle.state == FeedState::Running {
            debug!(triggered_by = %triggered_by, "Feed already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let snapshot = inner.provider.load_by_exchange()?;
        let now = inner.clock.now();
        let today = now.date_naive();
        let open: Vec<ExchangeCode> = snapshot
            .keys()
            .filter(|exchange| !inner.calendar.is_holiday(exchange, today))
            .cloned()
            .collect();

        if open.is_empty() {
            info!(
                triggered_by = %triggered_by,
                exchanges = snapshot.len(),
                "All exchanges closed, feed not started"
            );
            lifecycle.universe = Arc::new(snapshot);
            return Ok(StartOutcome::AllExchangesClosed);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;

        inner.seed_sessions(&snapshot, now);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        runtime.spawn(run_scheduler(
            Arc::downgrade(&self.inner),
            inner.config.interval(),
            shutdown_rx,
        ));

        lifecycle.state = FeedState::Running;
        lifecycle.started_at = Some(now);
        lifecycle.universe = Arc::new(snapshot);
        lifecycle.running_exchanges = open.clone();
        lifecycle.shutdown = Some(shutdown_tx);

        info!(
            triggered_by = %triggered_by,
            exchanges = ?open,
            interval_ms = inner.config.interval_ms,
            "Feed started"
        );
        inner.events.publish(FeedEvent::new(
            now,
            FeedEventPayload::FeedStarted {
                exchange_codes: open,
                triggered_by: triggered_by.to_string(),
            },
        ));
        Ok(StartOutcome::Started)
    }

    /// Stop the feed. A cycle already in progress runs to completion.
    pub fn stop(&self, triggered_by: &str, reason: &str) -> StopOutcome {
        let inner = &self.inner;
        let mut lifecycle = inner.lock_lifecycle();
        if lifecycle.state == FeedState::Stopped {
            debug!(triggered_by = %triggered_by, "Feed already stopped");
            return StopOutcome::AlreadyStopped;
        }

        if let Some(shutdown) = lifecycle.shutdown.take() {
            let _ = shutdown.send(true);
        }
        lifecycle.state = FeedState::Stopped;
        let exchanges = std::mem::take(&mut lifecycle.running_exchanges);
        inner.tick_rates.reset();

        info!(
            triggered_by = %triggered_by,
            reason = %reason,
            exchanges = ?exchanges,
            "Feed stopped"
        );
        inner.events.publish(FeedEvent::new(
            inner.clock.now(),
            FeedEventPayload::FeedStopped {
                exchange_codes: exchanges,
                triggered_by: triggered_by.to_string(),
                reason: reason.to_string(),
            },
        ));
        StopOutcome::Stopped
    }

    /// Run one scheduler cycle now. No-op while stopped.
    pub fn run_cycle(&self) -> CycleReport {
        self.inner.run_cycle()
    }

    pub fn get_status(&self) -> FeedStatus {
        let inner = &self.inner;
        let (state, started_at, universe) = {
            let lifecycle = inner.lock_lifecycle();
            (
                lifecycle.state,
                lifecycle.started_at,
                Arc::clone(&lifecycle.universe),
            )
        };

        let now = inner.clock.now();
        let today = now.date_naive();
        let exchanges = universe
            .iter()
            .map(|(code, instruments)| {
                let exchange_state = match state {
                    FeedState::Stopped => ExchangeState::Stopped,
                    FeedState::Running if inner.calendar.is_holiday(code, today) => {
                        ExchangeState::Holiday
                    }
                    FeedState::Running => ExchangeState::Running,
                };
                ExchangeStatus {
                    exchange_code: code.clone(),
                    state: exchange_state,
                    last_tick_time: inner.tick_rates.last_tick(code),
                    ticks_per_second: inner.tick_rates.rate(code, now),
                    active_instruments: match exchange_state {
                        ExchangeState::Running => instruments.len(),
                        _ => 0,
                    },
                }
            })
            .collect();

        FeedStatus {
            global_state: state,
            started_at,
            exchanges,
            counters: inner.counters.snapshot(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_lifecycle().state == FeedState::Running
    }

    /// Copy of the session state for `symbol`.
    pub fn instrument_state(&self, symbol: &Symbol) -> Option<InstrumentState> {
        self.inner.states.get(symbol).map(|s| s.value().clone())
    }

    pub fn guard(&self) -> &RollingMinuteVolatilityGuard {
        &self.inner.guard
    }

    pub fn config(&self) -> &FeedConfig {
        &self.inner.config
    }
}

impl Inner {
    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_engine(&self) -> MutexGuard<'_, TickEngine> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open sessions for instruments seen for the first time.
    fn seed_sessions(&self, snapshot: &InstrumentSnapshot, now: DateTime<Utc>) {
        let mut engine = self.lock_engine();
        for instrument in snapshot.values().flatten() {
            engine.bars.track(&instrument.symbol, now);
            if self.states.contains_key(&instrument.symbol) {
                continue;
            }
            if let Err(e) = self.open_session(instrument) {
                warn!(symbol = %instrument.symbol, error = %e, "Failed to open session");
            }
        }
    }

    fn open_session(&self, instrument: &Instrument) -> Result<InstrumentState, FeedError> {
        let open = instrument.open_price.unwrap_or(self.config.default_price);
        let state = InstrumentState::create(
            instrument.symbol.clone(),
            instrument.exchange.clone(),
            open,
            self.clock.as_ref(),
        )?;
        self.states.insert(instrument.symbol.clone(), state.clone());
        Ok(state)
    }

    fn run_cycle(&self) -> CycleReport {
        let universe = {
            let lifecycle = self.lock_lifecycle();
            if lifecycle.state != FeedState::Running {
                return CycleReport::default();
            }
            Arc::clone(&lifecycle.universe)
        };

        let now = self.clock.now();
        let today = now.date_naive();
        let eligible: Vec<&Instrument> = universe
            .iter()
            .filter(|(exchange, _)| !self.calendar.is_holiday(exchange, today))
            .flat_map(|(_, instruments)| instruments.iter())
            .collect();

        let mut report = CycleReport::default();
        if eligible.is_empty() {
            return report;
        }

        let mut engine = self.lock_engine();
        let batch = self.config.batch_size.min(eligible.len());
        for offset in 0..batch {
            let instrument = eligible[(engine.cursor + offset) % eligible.len()];
            report.selected.push(instrument.symbol.clone());

            match self.tick_instrument(&mut engine, instrument, now) {
                Ok(TickOutcome::Applied) => {
                    self.counters.record_applied();
                    report.applied += 1;
                }
                Ok(TickOutcome::Clamped) => {
                    self.counters.record_clamped();
                    report.clamped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Tick failed");
                    self.counters.record_failed();
                    report.failed += 1;
                }
            }
        }
        engine.cursor = (engine.cursor + batch) % eligible.len();

        for instrument in &eligible {
            if !engine.bars.is_due(&instrument.symbol, now) {
                continue;
            }
            if let Some(state) = self.states.get(&instrument.symbol) {
                let bar = BarAggregator::create_bar(state.value());
                drop(state);
                self.sink.broadcast_bar(&bar);
                self.counters.record_bar();
                engine.bars.mark_emitted(&instrument.symbol, now);
                report.bars += 1;
            }
        }

        debug!(
            applied = report.applied,
            clamped = report.clamped,
            failed = report.failed,
            bars = report.bars,
            "Cycle complete"
        );
        report
    }

    fn tick_instrument(
        &self,
        engine: &mut TickEngine,
        instrument: &Instrument,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, TickError> {
        let symbol = &instrument.symbol;
        let existing = self.states.get(symbol).map(|s| s.value().clone());
        let current = match existing {
            Some(state) => state,
            None => self
                .open_session(instrument)
                .map_err(|e| TickError::new(symbol.clone(), e))?,
        };

        let last = current.last_price();
        if self.guard.expire_window(symbol, last) {
            self.publish_release(instrument, now);
        }

        let volatility = self
            .config
            .volatility_for(&instrument.exchange, instrument.asset_class);
        let candidate = engine
            .generator
            .next_price(current.session_open(), last, volatility);
        let quantity = i64::try_from(engine.volumes.next_quantity()).unwrap_or(i64::MAX);

        let direction = if candidate > last {
            Some(Direction::Up)
        } else if candidate < last {
            Some(Direction::Down)
        } else {
            None
        };

        let (price, outcome) = match direction {
            Some(d) if !self.guard.can_move(symbol, d) => (last, TickOutcome::Clamped),
            _ => {
                let anchor = self.guard.anchor_for(symbol, last);
                let registered = self.guard.register(symbol, anchor, candidate);
                if registered.released {
                    self.publish_release(instrument, now);
                }
                if let Some(direction) = registered.triggered {
                    warn!(
                        symbol = %symbol,
                        direction = ?direction,
                        anchor = %anchor,
                        candidate = %candidate,
                        "Volatility band breached"
                    );
                    self.events.publish(FeedEvent::new(
                        now,
                        FeedEventPayload::GuardTriggered {
                            symbol: symbol.clone(),
                            exchange: instrument.exchange.clone(),
                            state: registered.state,
                            direction,
                        },
                    ));
                }
                (candidate, TickOutcome::Applied)
            }
        };

        let mut next = current;
        next.update_with_tick(price, quantity, self.clock.as_ref())
            .map_err(|e| TickError::new(symbol.clone(), e))?;
        self.states.insert(symbol.clone(), next.clone());
        self.tick_rates.record(&instrument.exchange, now);

        debug!(
            symbol = %symbol,
            price = %price,
            quantity = quantity,
            clamped = matches!(outcome, TickOutcome::Clamped),
            "Tick applied"
        );

        self.sink.broadcast_quote(&Quote::from_state(&next));
        self.counters.record_quote();
        Ok(outcome)
    }

    fn publish_release(&self, instrument: &Instrument, now: DateTime<Utc>) {
        info!(symbol = %instrument.symbol, "Volatility guard window released");
        self.events.publish(FeedEvent::new(
            now,
            FeedEventPayload::GuardReleased {
                symbol: instrument.symbol.clone(),
                exchange: instrument.exchange.clone(),
                released_at: now,
            },
        ));
    }
}

async fn run_scheduler(
    inner: Weak<Inner>,
    period: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.run_cycle();
            }
        }
    }
    debug!("Scheduler exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingListener;
    use crate::sink::RecordingSink;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use types::clock::ManualClock;
    use types::ids::AssetClass;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    struct Harness {
        feed: FeedOrchestrator,
        clock: Arc<ManualClock>,
        sink: Arc<RecordingSink>,
        listener: Arc<RecordingListener>,
    }

    fn instruments() -> Vec<Instrument> {
        vec![
            Instrument::new("AAPL", "NASDAQ", AssetClass::Equity).with_open_price(d("100.00")),
            Instrument::new("MSFT", "NASDAQ", AssetClass::Equity).with_open_price(d("100.00")),
            Instrument::new("TCS", "NSE", AssetClass::Equity).with_open_price(d("100.00")),
        ]
    }

    fn harness_with(
        config: FeedConfig,
        instruments: Vec<Instrument>,
        calendar: HolidayCalendar,
        sample: f64,
    ) -> Harness {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let sink = Arc::new(RecordingSink::new());
        let listener = Arc::new(RecordingListener::new());
        let feed = FeedOrchestrator::builder(config)
            .clock(clock.clone())
            .provider(Arc::new(StaticInstrumentProvider::new(instruments)))
            .calendar(Arc::new(calendar))
            .sink(sink.clone())
            .listener(listener.clone())
            .normal_source(Box::new(move || sample))
            .volume_source(Box::new(|| 10_u64))
            .build()
            .unwrap();
        Harness {
            feed,
            clock,
            sink,
            listener,
        }
    }

    fn harness(sample: f64) -> Harness {
        harness_with(
            FeedConfig::default(),
            instruments(),
            HolidayCalendar::new(),
            sample,
        )
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let h = harness(0.0);

        assert_eq!(h.feed.start("ops").unwrap(), StartOutcome::Started);
        let started_at = h.feed.get_status().started_at;
        assert!(started_at.is_some());

        h.clock.advance(Duration::seconds(5));
        assert_eq!(h.feed.start("ops").unwrap(), StartOutcome::AlreadyRunning);
        assert_eq!(h.feed.get_status().started_at, started_at);
        assert_eq!(h.listener.count("FeedStarted"), 1);

        match &h.listener.events()[0].payload {
            FeedEventPayload::FeedStarted {
                exchange_codes,
                triggered_by,
            } => {
                assert_eq!(exchange_codes.len(), 2);
                assert_eq!(triggered_by, "ops");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_exchanges_on_holiday() {
        let today = ManualClock::at_unix(1_700_000_000).now().date_naive();
        let calendar = HolidayCalendar::new()
            .with_holiday(ExchangeCode::new("NASDAQ"), today)
            .with_holiday(ExchangeCode::new("NSE"), today);
        let h = harness_with(FeedConfig::default(), instruments(), calendar, 0.0);

        assert_eq!(h.feed.start("ops").unwrap(), StartOutcome::AllExchangesClosed);
        assert!(!h.feed.is_running());
        assert!(h.listener.events().is_empty());
        assert_eq!(h.feed.get_status().global_state, FeedState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let h = harness(0.0);
        assert_eq!(h.feed.stop("ops", "idle"), StopOutcome::AlreadyStopped);
        assert!(h.listener.events().is_empty());

        h.feed.start("ops").unwrap();
        assert_eq!(h.feed.stop("ops", "maintenance"), StopOutcome::Stopped);
        assert_eq!(h.feed.stop("ops", "maintenance"), StopOutcome::AlreadyStopped);

        let events = h.listener.events();
        assert_eq!(events.len(), 2);
        match &events[1].payload {
            FeedEventPayload::FeedStopped { reason, .. } => assert_eq!(reason, "maintenance"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let h = harness(0.0);
        assert!(matches!(h.feed.start("ops"), Err(FeedError::NoRuntime)));
        assert!(!h.feed.is_running());
        assert!(h.listener.events().is_empty());
    }

    #[test]
    fn test_cycle_is_noop_when_stopped() {
        let h = harness(0.0);
        assert_eq!(h.feed.run_cycle(), CycleReport::default());
        assert!(h.sink.quotes().is_empty());
    }

    #[tokio::test]
    async fn test_cycle_round_robin_batches() {
        let mut config = FeedConfig::default();
        config.batch_size = 2;
        let h = harness_with(config, instruments(), HolidayCalendar::new(), 0.0);
        h.feed.start("ops").unwrap();

        let first = h.feed.run_cycle();
        let second = h.feed.run_cycle();
        let names = |r: &CycleReport| r.selected.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(names(&first), vec!["AAPL", "MSFT"]);
        assert_eq!(names(&second), vec!["TCS", "AAPL"]);

        assert_eq!(h.sink.quotes().len(), 4);
        let aapl = h.feed.instrument_state(&Symbol::new("AAPL")).unwrap();
        assert_eq!(aapl.cumulative_volume(), 20);
        assert_eq!(aapl.last_price(), d("100.00"));
    }

    #[tokio::test]
    async fn test_holiday_exchange_is_skipped() {
        let today = ManualClock::at_unix(1_700_000_000).now().date_naive();
        let calendar = HolidayCalendar::new().with_holiday(ExchangeCode::new("NSE"), today);
        let h = harness_with(FeedConfig::default(), instruments(), calendar, 0.0);
        h.feed.start("ops").unwrap();

        let report = h.feed.run_cycle();
        assert!(!report.selected.contains(&Symbol::new("TCS")));

        let status = h.feed.get_status();
        let nse = status.exchange(&ExchangeCode::new("NSE")).unwrap();
        assert_eq!(nse.state, ExchangeState::Holiday);
        assert_eq!(nse.active_instruments, 0);
        let nasdaq = status.exchange(&ExchangeCode::new("NASDAQ")).unwrap();
        assert_eq!(nasdaq.state, ExchangeState::Running);
        assert_eq!(nasdaq.active_instruments, 2);
        assert!(nasdaq.ticks_per_second > 0.0);
    }

    #[tokio::test]
    async fn test_guard_clamps_and_releases() {
        // exp(0.05 * 1.0)^4 per tick: 100.00 -> 122.14 -> (clamped)
        let instruments = vec![
            Instrument::new("AAPL", "NASDAQ", AssetClass::Equity).with_open_price(d("100.00")),
        ];
        let h = harness_with(FeedConfig::default(), instruments, HolidayCalendar::new(), 1.0);
        let aapl = Symbol::new("AAPL");
        h.feed.start("ops").unwrap();

        let report = h.feed.run_cycle();
        assert_eq!(report.applied, 1);
        assert_eq!(h.feed.instrument_state(&aapl).unwrap().last_price(), d("122.14"));
        assert_eq!(h.listener.count("GuardTriggered"), 1);
        assert!(!h.feed.guard().can_move_up(&aapl));

        let report = h.feed.run_cycle();
        assert_eq!(report.clamped, 1);
        let state = h.feed.instrument_state(&aapl).unwrap();
        assert_eq!(state.last_price(), d("122.14"));
        assert_eq!(state.cumulative_volume(), 20);
        assert_eq!(h.sink.quotes().len(), 2);
        assert_eq!(h.listener.count("GuardTriggered"), 1);

        h.clock.advance(Duration::seconds(61));
        let report = h.feed.run_cycle();
        assert_eq!(report.applied, 1);
        assert_eq!(h.listener.count("GuardReleased"), 1);
        // New window anchored at 122.14, and the next move breaches again
        assert_eq!(h.listener.count("GuardTriggered"), 2);
        assert_eq!(h.feed.get_status().counters.ticks_clamped, 1);
    }

    #[tokio::test]
    async fn test_bars_follow_interval() {
        let mut config = FeedConfig::default();
        config.bar_interval_seconds = 5;
        let h = harness_with(config, instruments(), HolidayCalendar::new(), 0.0);
        h.feed.start("ops").unwrap();

        h.feed.run_cycle();
        assert!(h.sink.bars().is_empty());

        h.clock.advance(Duration::seconds(5));
        let report = h.feed.run_cycle();
        assert_eq!(report.bars, 3);
        let bars = h.sink.bars();
        assert!(bars.iter().all(|b| b.is_valid()));

        h.clock.advance(Duration::seconds(1));
        assert_eq!(h.feed.run_cycle().bars, 0);
    }

    #[tokio::test]
    async fn test_failing_instrument_is_isolated() {
        let instruments = vec![
            Instrument::new("BAD", "NASDAQ", AssetClass::Equity).with_open_price(d("-5")),
            Instrument::new("GOOD", "NASDAQ", AssetClass::Equity),
        ];
        let h = harness_with(FeedConfig::default(), instruments, HolidayCalendar::new(), 0.0);
        h.feed.start("ops").unwrap();

        let report = h.feed.run_cycle();
        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 1);
        assert!(h.feed.instrument_state(&Symbol::new("BAD")).is_none());

        let good = h.feed.instrument_state(&Symbol::new("GOOD")).unwrap();
        assert_eq!(good.session_open(), d("100.00"));
        assert_eq!(h.feed.get_status().counters.ticks_failed, 1);

        // Retried on the next cycle, still isolated
        let report = h.feed.run_cycle();
        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 1);
    }

    #[tokio::test]
    async fn test_status_after_stop() {
        let h = harness(0.0);
        h.feed.start("ops").unwrap();
        h.feed.run_cycle();
        h.feed.stop("ops", "done");

        let status = h.feed.get_status();
        assert_eq!(status.global_state, FeedState::Stopped);
        assert!(status
            .exchanges
            .iter()
            .all(|e| e.state == ExchangeState::Stopped && e.active_instruments == 0));
        assert!(status.exchanges.iter().all(|e| e.ticks_per_second == 0.0));
    }

    #[tokio::test]
    async fn test_sessions_survive_restart() {
        let h = harness(0.0);
        h.feed.start("ops").unwrap();
        h.feed.run_cycle();
        h.feed.stop("ops", "pause");
        h.feed.start("ops").unwrap();

        let aapl = h.feed.instrument_state(&Symbol::new("AAPL")).unwrap();
        assert_eq!(aapl.cumulative_volume(), 10);
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let mut config = FeedConfig::default();
        config.interval_ms = 50;
        let result = FeedOrchestrator::builder(config).build();
        assert!(matches!(result, Err(FeedError::Configuration(_))));
    }
}
