//! Live/historical position ownership and the trade lifecycle.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::SwingtraderError;
use super::operation::Operation;
use super::position::Position;
use super::signal::{Side, SignalType};

pub const FORCED_CLOSE_MSG: &str = "forced liquidation at end of run";

/// Replay accounting mode. `Trade` compounds the running balance through
/// opens and closes; `Signal` stakes a fixed `init_balance / max_pos` per
/// position and only accumulates realized profit, so signal quality can
/// be read without compounding effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Signal,
    Trade,
}

impl Mode {
    pub fn from_label(label: &str) -> Option<Mode> {
        match label {
            "signal" => Some(Mode::Signal),
            "trade" => Some(Mode::Trade),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Signal => "signal",
            Mode::Trade => "trade",
        }
    }
}

/// Per-signal-type win/loss aggregates, updated as positions close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub win_num: u32,
    pub loss_num: u32,
    pub win_balance: f64,
    pub loss_balance: f64,
}

/// Outcome of an open attempt that is not a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenResult {
    Opened,
    NoCapacity,
    ShortsDisabled,
}

/// Outcome of a close attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseResult {
    Closed,
    /// Stock T+1 rule: strategy closes on the open date are held over.
    SameDayHold,
}

/// Serializable manager state for snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderState {
    pub balance: f64,
    pub fee_total: f64,
    pub balance_history: BTreeMap<NaiveDateTime, f64>,
    pub live: Vec<Position>,
    pub history: BTreeMap<String, Vec<Position>>,
    pub results: BTreeMap<SignalType, SignalStats>,
}

/// Owns every live and historical position; applies strategy instructions
/// and marks open positions each tick.
#[derive(Debug, Clone)]
pub struct PositionManager {
    pub mode: Mode,
    pub init_balance: f64,
    pub balance: f64,
    pub fee_rate: f64,
    pub fee_total: f64,
    pub max_pos: usize,
    pub is_stock: bool,
    pub is_futures: bool,
    live: BTreeMap<(String, SignalType), Position>,
    history: BTreeMap<String, Vec<Position>>,
    pub balance_history: BTreeMap<NaiveDateTime, f64>,
    pub results: BTreeMap<SignalType, SignalStats>,
}

impl PositionManager {
    pub fn new(
        mode: Mode,
        init_balance: f64,
        fee_rate: f64,
        max_pos: usize,
        is_stock: bool,
        is_futures: bool,
    ) -> Self {
        PositionManager {
            mode,
            init_balance,
            balance: init_balance,
            fee_rate,
            fee_total: 0.0,
            max_pos,
            is_stock,
            is_futures,
            live: BTreeMap::new(),
            history: BTreeMap::new(),
            balance_history: BTreeMap::new(),
            results: BTreeMap::new(),
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn get_live(&self, code: &str, signal: SignalType) -> Option<&Position> {
        self.live.get(&(code.to_string(), signal))
    }

    pub fn get_live_mut(&mut self, code: &str, signal: SignalType) -> Option<&mut Position> {
        self.live.get_mut(&(code.to_string(), signal))
    }

    pub fn live_signals(&self, code: &str) -> Vec<SignalType> {
        self.live
            .keys()
            .filter(|(c, _)| c == code)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Codes with at least one live position, in key order.
    pub fn live_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.live.keys().map(|(c, _)| c.clone()).collect();
        codes.dedup();
        codes
    }

    pub fn live_positions(&self) -> impl Iterator<Item = &Position> {
        self.live.values()
    }

    pub fn history(&self) -> &BTreeMap<String, Vec<Position>> {
        &self.history
    }

    /// Open a position from a strategy instruction.
    ///
    /// A live position for the same (code, signal) is a strategy contract
    /// violation and errors; capacity and futures-gating outcomes are
    /// normal results.
    pub fn open(
        &mut self,
        code: &str,
        op: &Operation,
        price: f64,
        datetime: NaiveDateTime,
    ) -> Result<OpenResult, SwingtraderError> {
        let key = (code.to_string(), op.signal);
        if self.live.contains_key(&key) {
            return Err(SwingtraderError::PositionConflict {
                code: code.to_string(),
                signal: op.signal,
                reason: "open requested while a position is live".into(),
            });
        }
        if op.signal.side() == Side::Short && !self.is_futures {
            return Ok(OpenResult::ShortsDisabled);
        }
        let free_slots = self.max_pos.saturating_sub(self.live.len());
        if free_slots == 0 {
            return Ok(OpenResult::NoCapacity);
        }
        let stake = match self.mode {
            Mode::Trade => self.balance / free_slots as f64,
            Mode::Signal => self.init_balance / self.max_pos as f64,
        };
        if stake <= 0.0 || price <= 0.0 {
            return Ok(OpenResult::NoCapacity);
        }

        let amount = stake * (1.0 - self.fee_rate) / price;
        self.fee_total += amount * price * self.fee_rate;
        if self.mode == Mode::Trade {
            self.balance -= stake;
        }

        let position = Position {
            code: code.to_string(),
            signal: op.signal,
            side: op.signal.side(),
            open_price: price,
            amount,
            capital: stake,
            stop_loss: op.stop_loss,
            open_datetime: datetime,
            close_datetime: None,
            close_price: None,
            profit_rate: 0.0,
            max_profit_rate: 0.0,
            max_loss_rate: 0.0,
            open_msg: op.msg.clone(),
            close_msg: String::new(),
            info: op.info.clone(),
        };
        self.live.insert(key, position);
        Ok(OpenResult::Opened)
    }

    /// Recompute profit rate and running excursion bounds for every live
    /// position on `code`. Sampled at tick cadence; the bounds are
    /// best-effort, not exact peaks.
    pub fn mark_to_market(&mut self, code: &str, price: f64) {
        for ((c, _), pos) in self.live.iter_mut() {
            if c != code {
                continue;
            }
            let rate = pos.price_profit_rate(price);
            pos.profit_rate = rate;
            pos.max_profit_rate = pos.max_profit_rate.max(rate);
            pos.max_loss_rate = pos.max_loss_rate.min(rate);
        }
    }

    /// Record the tick's equity into the balance history.
    pub fn record_balance(&mut self, datetime: NaiveDateTime) {
        let open_value: f64 = self
            .live
            .values()
            .map(|pos| match self.mode {
                Mode::Trade => pos.capital * (1.0 + pos.profit_rate / 100.0),
                Mode::Signal => pos.capital * pos.profit_rate / 100.0,
            })
            .sum();
        self.balance_history
            .insert(datetime, self.balance + open_value);
    }

    /// Seal a live position: realize the fee-adjusted profit rate, move it
    /// to history and update the per-signal aggregates.
    pub fn close(
        &mut self,
        code: &str,
        signal: SignalType,
        msg: &str,
        price: f64,
        datetime: NaiveDateTime,
        forced: bool,
    ) -> Result<CloseResult, SwingtraderError> {
        let key = (code.to_string(), signal);
        let Some(mut pos) = self.live.remove(&key) else {
            return Err(SwingtraderError::PositionConflict {
                code: code.to_string(),
                signal,
                reason: "close requested without a live position".into(),
            });
        };
        if self.is_stock && !forced && pos.open_datetime.date() == datetime.date() {
            self.live.insert(key, pos);
            return Ok(CloseResult::SameDayHold);
        }

        let profit_rate = pos.price_profit_rate(price) - 2.0 * self.fee_rate * 100.0;
        self.fee_total += pos.amount * price * self.fee_rate;

        pos.profit_rate = profit_rate;
        pos.close_price = Some(price);
        pos.close_datetime = Some(datetime);
        pos.close_msg = msg.to_string();

        let net_profit = pos.capital * profit_rate / 100.0;
        match self.mode {
            Mode::Trade => self.balance += pos.capital + net_profit,
            Mode::Signal => self.balance += net_profit,
        }

        let stats = self.results.entry(signal).or_default();
        if profit_rate > 0.0 {
            stats.win_num += 1;
            stats.win_balance += net_profit;
        } else {
            stats.loss_num += 1;
            stats.loss_balance += net_profit.abs();
        }

        self.history.entry(code.to_string()).or_default().push(pos);
        Ok(CloseResult::Closed)
    }

    /// Close every remaining live position at the last observed price.
    /// Positions whose code is missing from `prices` fall back to their
    /// entry price.
    pub fn force_close_all(&mut self, prices: &HashMap<String, f64>, datetime: NaiveDateTime) {
        let keys: Vec<(String, SignalType)> = self.live.keys().cloned().collect();
        for (code, signal) in keys {
            let price = prices
                .get(&code)
                .copied()
                .unwrap_or_else(|| self.live[&(code.clone(), signal)].open_price);
            // forced closes bypass the T+1 hold and cannot conflict
            let _ = self.close(&code, signal, FORCED_CLOSE_MSG, price, datetime, true);
        }
    }

    pub fn state(&self) -> TraderState {
        TraderState {
            balance: self.balance,
            fee_total: self.fee_total,
            balance_history: self.balance_history.clone(),
            live: self.live.values().cloned().collect(),
            history: self.history.clone(),
            results: self.results.clone(),
        }
    }

    pub fn restore(&mut self, state: TraderState) {
        self.balance = state.balance;
        self.fee_total = state.fee_total;
        self.balance_history = state.balance_history;
        self.live = state
            .live
            .into_iter()
            .map(|pos| ((pos.code.clone(), pos.signal), pos))
            .collect();
        self.history = state.history;
        self.results = state.results;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(day: u32, hour: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn make_manager(mode: Mode) -> PositionManager {
        PositionManager::new(mode, 100_000.0, 0.001, 2, false, true)
    }

    fn open_op(signal: SignalType, stop: Option<f64>) -> Operation {
        Operation::open(signal, stop, "entry")
    }

    #[test]
    fn open_allocates_capital_per_free_slot() {
        let mut manager = make_manager(Mode::Trade);
        let result = manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, Some(95.0)), 100.0, dt(1, 10))
            .unwrap();
        assert_eq!(result, OpenResult::Opened);

        let pos = manager.get_live("SHFE.RB", SignalType::FirstBuy).unwrap();
        assert!((pos.capital - 50_000.0).abs() < 1e-9);
        assert!((pos.amount - 50_000.0 * 0.999 / 100.0).abs() < 1e-9);
        assert_eq!(pos.stop_loss, Some(95.0));
        assert!((manager.balance - 50_000.0).abs() < 1e-9);
        assert!(manager.fee_total > 0.0);
    }

    #[test]
    fn open_while_live_is_a_contract_violation() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();
        let err = manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 101.0, dt(1, 11))
            .unwrap_err();
        assert!(matches!(err, SwingtraderError::PositionConflict { .. }));
    }

    #[test]
    fn same_signal_on_other_code_is_fine() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();
        let result = manager
            .open("SHFE.HC", &open_op(SignalType::FirstBuy, None), 50.0, dt(1, 10))
            .unwrap();
        assert_eq!(result, OpenResult::Opened);
        assert_eq!(manager.live_count(), 2);
    }

    #[test]
    fn capacity_limit_enforced() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();
        manager
            .open("SHFE.RB", &open_op(SignalType::SecondBuy, None), 100.0, dt(1, 10))
            .unwrap();
        let result = manager
            .open("SHFE.RB", &open_op(SignalType::ThirdBuy, None), 100.0, dt(1, 10))
            .unwrap();
        assert_eq!(result, OpenResult::NoCapacity);
        assert_eq!(manager.live_count(), 2);
    }

    #[test]
    fn shorts_gated_by_futures_flag() {
        let mut manager = PositionManager::new(Mode::Trade, 100_000.0, 0.001, 2, false, false);
        let result = manager
            .open("SH.600519", &open_op(SignalType::FirstSell, None), 100.0, dt(1, 10))
            .unwrap();
        assert_eq!(result, OpenResult::ShortsDisabled);
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn mark_to_market_tracks_excursions() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();

        manager.mark_to_market("SHFE.RB", 110.0);
        manager.mark_to_market("SHFE.RB", 95.0);

        let pos = manager.get_live("SHFE.RB", SignalType::FirstBuy).unwrap();
        assert!((pos.profit_rate - (-5.0)).abs() < 1e-9);
        assert!((pos.max_profit_rate - 10.0).abs() < 1e-9);
        assert!((pos.max_loss_rate - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn close_realizes_fee_adjusted_profit() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();

        let result = manager
            .close("SHFE.RB", SignalType::FirstBuy, "take", 110.0, dt(2, 10), false)
            .unwrap();
        assert_eq!(result, CloseResult::Closed);
        assert_eq!(manager.live_count(), 0);

        let pos = &manager.history()["SHFE.RB"][0];
        // 10% raw minus 2 * 0.1% fee
        assert!((pos.profit_rate - 9.8).abs() < 1e-9);
        assert_eq!(pos.close_price, Some(110.0));
        assert!(pos.close_datetime.unwrap() > pos.open_datetime);
        // stake returned plus net profit
        assert!((manager.balance - (50_000.0 + 50_000.0 * 1.098)).abs() < 1e-6);

        let stats = manager.results[&SignalType::FirstBuy];
        assert_eq!(stats.win_num, 1);
        assert_eq!(stats.loss_num, 0);
        assert!((stats.win_balance - 50_000.0 * 0.098).abs() < 1e-6);
    }

    #[test]
    fn close_without_live_position_errors() {
        let mut manager = make_manager(Mode::Trade);
        let err = manager
            .close("SHFE.RB", SignalType::FirstBuy, "x", 100.0, dt(1, 10), false)
            .unwrap_err();
        assert!(matches!(err, SwingtraderError::PositionConflict { .. }));
    }

    #[test]
    fn losses_accumulate_as_positive_amounts() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstSell, None), 100.0, dt(1, 10))
            .unwrap();
        manager
            .close("SHFE.RB", SignalType::FirstSell, "stop", 105.0, dt(2, 10), false)
            .unwrap();

        let stats = manager.results[&SignalType::FirstSell];
        assert_eq!(stats.loss_num, 1);
        assert!(stats.loss_balance > 0.0);
    }

    #[test]
    fn stock_t_plus_one_holds_same_day_close() {
        let mut manager = PositionManager::new(Mode::Trade, 100_000.0, 0.001, 2, true, false);
        manager
            .open("SH.600519", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();

        let result = manager
            .close("SH.600519", SignalType::FirstBuy, "x", 101.0, dt(1, 14), false)
            .unwrap();
        assert_eq!(result, CloseResult::SameDayHold);
        assert_eq!(manager.live_count(), 1);

        let result = manager
            .close("SH.600519", SignalType::FirstBuy, "x", 101.0, dt(2, 10), false)
            .unwrap();
        assert_eq!(result, CloseResult::Closed);
    }

    #[test]
    fn force_close_all_clears_live_and_fills_history() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();
        manager
            .open("SHFE.HC", &open_op(SignalType::FirstSell, None), 50.0, dt(1, 10))
            .unwrap();

        let prices = HashMap::from([("SHFE.RB".to_string(), 102.0), ("SHFE.HC".to_string(), 49.0)]);
        manager.force_close_all(&prices, dt(5, 15));

        assert_eq!(manager.live_count(), 0);
        let total_closed: usize = manager.history().values().map(Vec::len).sum();
        assert_eq!(total_closed, 2);
        for positions in manager.history().values() {
            assert_eq!(positions[0].close_msg, FORCED_CLOSE_MSG);
        }
    }

    #[test]
    fn force_close_bypasses_t_plus_one() {
        let mut manager = PositionManager::new(Mode::Trade, 100_000.0, 0.001, 2, true, false);
        manager
            .open("SH.600519", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();
        let prices = HashMap::from([("SH.600519".to_string(), 101.0)]);
        manager.force_close_all(&prices, dt(1, 15));
        assert_eq!(manager.live_count(), 0);
    }

    #[test]
    fn signal_mode_stake_is_fixed_and_balance_keeps_net_only() {
        let mut manager = make_manager(Mode::Signal);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();
        // no stake deduction in signal mode
        assert!((manager.balance - 100_000.0).abs() < 1e-9);
        let pos = manager.get_live("SHFE.RB", SignalType::FirstBuy).unwrap();
        assert!((pos.capital - 50_000.0).abs() < 1e-9);

        manager
            .close("SHFE.RB", SignalType::FirstBuy, "take", 110.0, dt(2, 10), false)
            .unwrap();
        assert!((manager.balance - (100_000.0 + 50_000.0 * 0.098)).abs() < 1e-6);
    }

    #[test]
    fn record_balance_includes_open_positions() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, None), 100.0, dt(1, 10))
            .unwrap();
        manager.mark_to_market("SHFE.RB", 110.0);
        manager.record_balance(dt(1, 10));

        let equity = manager.balance_history[&dt(1, 10)];
        assert!((equity - (50_000.0 + 50_000.0 * 1.10)).abs() < 1e-6);
    }

    #[test]
    fn state_round_trip_restores_everything() {
        let mut manager = make_manager(Mode::Trade);
        manager
            .open("SHFE.RB", &open_op(SignalType::FirstBuy, Some(95.0)), 100.0, dt(1, 10))
            .unwrap();
        manager.mark_to_market("SHFE.RB", 104.0);
        manager.record_balance(dt(1, 10));
        manager
            .open("SHFE.HC", &open_op(SignalType::ThirdBuy, None), 50.0, dt(1, 11))
            .unwrap();
        manager
            .close("SHFE.HC", SignalType::ThirdBuy, "take", 55.0, dt(2, 10), false)
            .unwrap();

        let state = manager.state();
        let mut fresh = make_manager(Mode::Trade);
        fresh.restore(state);

        assert_eq!(fresh.live_count(), 1);
        assert!(fresh.get_live("SHFE.RB", SignalType::FirstBuy).is_some());
        assert_eq!(fresh.history()["SHFE.HC"].len(), 1);
        assert!((fresh.balance - manager.balance).abs() < 1e-9);
        assert_eq!(fresh.balance_history, manager.balance_history);
        assert_eq!(fresh.results, manager.results);
    }
}
