//! Price bar representation.

use chrono::NaiveDateTime;

/// One time-stamped price sample. Immutable once emitted by a data provider.
///
/// `index` is the bar's position in the full replayed series for its
/// (code, frequency) pair and stays stable across ticks; the pattern
/// heuristics rely on it for staleness windows.
#[derive(Debug, Clone)]
pub struct Bar {
    pub code: String,
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub index: usize,
}

impl Bar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.open > self.close
    }
}

/// Summary of the last bar at the finest configured frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct BarInfo {
    pub datetime: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub index: usize,
}

impl From<&Bar> for BarInfo {
    fn from(bar: &Bar) -> Self {
        BarInfo {
            datetime: bar.datetime,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            index: bar.index,
        }
    }
}
