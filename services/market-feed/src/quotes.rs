//! Quote snapshots pushed on every applied tick.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::Symbol;

use crate::instrument_state::InstrumentState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: Symbol,
    pub last_price: Decimal,
    pub open: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn from_state(state: &InstrumentState) -> Self {
        Self {
            symbol: state.symbol().clone(),
            last_price: state.last_price(),
            open: state.session_open(),
            change: state.change(),
            change_percent: state.change_percent(),
            volume: state.cumulative_volume(),
            timestamp: state.last_updated(),
        }
    }
}
