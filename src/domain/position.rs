//! Position record: one open-or-closed trade.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::signal::{Side, SignalType};

/// The mutable record of one trade. Exclusively owned by the position
/// manager while live; sealed and appended to per-code history on close.
///
/// `max_profit_rate`/`max_loss_rate` are best-effort running bounds
/// sampled at tick cadence, not exact peak tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub code: String,
    pub signal: SignalType,
    pub side: Side,
    pub open_price: f64,
    pub amount: f64,
    /// Capital allocated at entry; profit amounts are realized against it.
    pub capital: f64,
    pub stop_loss: Option<f64>,
    pub open_datetime: NaiveDateTime,
    pub close_datetime: Option<NaiveDateTime>,
    pub close_price: Option<f64>,
    /// Percentage. Mark-to-market while live (fee-free); realized net of
    /// round-trip fees once closed.
    pub profit_rate: f64,
    pub max_profit_rate: f64,
    pub max_loss_rate: f64,
    pub open_msg: String,
    pub close_msg: String,
    pub info: BTreeMap<String, String>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    pub fn is_closed(&self) -> bool {
        self.close_datetime.is_some()
    }

    /// Side-adjusted price return against entry, in percent, before fees.
    pub fn price_profit_rate(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.open_price) / self.open_price * 100.0,
            Side::Short => (self.open_price - price) / self.open_price * 100.0,
        }
    }
}
