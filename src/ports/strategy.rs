//! Strategy engine port trait.

use crate::domain::error::SwingtraderError;
use crate::domain::operation::Operation;
use crate::domain::position::Position;
use crate::domain::signal::SignalType;
use crate::ports::market_data::MarketDataProvider;

/// A pluggable trading strategy driven by the backtest runner.
///
/// `open` is asked once per code per tick and may emit any number of
/// instructions; `live` lists the signal types already held on the code so
/// a well-behaved strategy does not re-open them. `close` is asked once
/// per live position per tick, before `open`, and may mutate the position
/// (ratcheting its stop) even when it returns no instruction.
pub trait Strategy {
    fn name(&self) -> &str;

    fn open(
        &mut self,
        code: &str,
        live: &[SignalType],
        datas: &mut dyn MarketDataProvider,
    ) -> Result<Vec<Operation>, SwingtraderError>;

    fn close(
        &mut self,
        code: &str,
        pos: &mut Position,
        datas: &mut dyn MarketDataProvider,
    ) -> Result<Option<Operation>, SwingtraderError>;
}
