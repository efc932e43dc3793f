//! Market data access port trait.

use std::rc::Rc;

use chrono::NaiveDateTime;

use crate::domain::bar::{Bar, BarInfo};
use crate::domain::error::SwingtraderError;
use crate::domain::pattern::PatternData;

/// Replayable market data with derived pattern structures.
///
/// Implementations cache pattern structures per (code, frequency) within a
/// tick and must invalidate that cache exactly once per [`advance`]; a
/// strategy must never observe the previous tick's pattern data. Results
/// are shared via `Rc`: the replay is single-threaded by design.
///
/// [`advance`]: MarketDataProvider::advance
pub trait MarketDataProvider {
    /// Prepare the replay clock: `base_code` supplies the timeline at the
    /// chosen cadence. Must be called once before the first `advance`.
    fn init(&mut self, base_code: &str, frequency: &str) -> Result<(), SwingtraderError>;

    /// Move the replay clock one step. Returns `false` on exhaustion.
    fn advance(&mut self) -> Result<bool, SwingtraderError>;

    /// The current replay timestamp; `None` before the first `advance`.
    fn current_datetime(&self) -> Option<NaiveDateTime>;

    /// Ordered bars for (code, frequency), truncated to the replay clock.
    fn bars(&mut self, code: &str, frequency: &str) -> Result<Rc<Vec<Bar>>, SwingtraderError>;

    /// Summary of the latest bar at the finest configured frequency.
    fn latest_bar_info(&mut self, code: &str) -> Result<BarInfo, SwingtraderError>;

    /// Pattern structure for (code, frequency) at the replay clock.
    fn pattern_data(
        &mut self,
        code: &str,
        frequency: &str,
    ) -> Result<Rc<PatternData>, SwingtraderError>;

    /// Configured frequencies, coarse to fine.
    fn frequencys(&self) -> &[String];
}
