//! Read-only feed status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::ids::ExchangeCode;

use crate::metrics::CounterSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExchangeState {
    Stopped,
    Running,
    Holiday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStatus {
    pub exchange_code: ExchangeCode,
    pub state: ExchangeState,
    pub last_tick_time: Option<DateTime<Utc>>,
    pub ticks_per_second: f64,
    pub active_instruments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub global_state: FeedState,
    pub started_at: Option<DateTime<Utc>>,
    pub exchanges: Vec<ExchangeStatus>,
    pub counters: CounterSnapshot,
}

impl FeedStatus {
    pub fn is_running(&self) -> bool {
        self.global_state == FeedState::Running
    }

    pub fn exchange(&self, code: &ExchangeCode) -> Option<&ExchangeStatus> {
        self.exchanges.iter().find(|e| &e.exchange_code == code)
    }
}
