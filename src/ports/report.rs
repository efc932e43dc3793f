//! Report generation port trait.

use std::path::Path;

use crate::domain::analyzer::{BacktestSummary, SignalRow};
use crate::domain::error::SwingtraderError;
use crate::domain::position::Position;

/// Port for writing backtest reports. Consumes read-only views of the run
/// outcome; implementations decide the artifact format.
pub trait ReportPort {
    fn write(
        &self,
        summary: &BacktestSummary,
        table: &[SignalRow],
        positions: &[&Position],
        output: &Path,
    ) -> Result<(), SwingtraderError>;
}
