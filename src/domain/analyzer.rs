//! Performance statistics over balance history and closed positions.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};

use super::position::Position;
use super::position_manager::SignalStats;
use super::signal::SignalType;

/// Aggregate run statistics computed from day-level balances.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BacktestSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_days: usize,
    pub end_balance: f64,
    /// Percentages throughout.
    pub total_return: f64,
    pub annual_return: f64,
    pub daily_return: f64,
    pub return_std: f64,
    pub max_drawdown: f64,
    pub max_ddpercent: f64,
    /// Peak-to-trough span of the deepest drawdown, calendar days.
    pub max_drawdown_duration: i64,
    pub sharpe_ratio: f64,
    pub return_drawdown_ratio: f64,
    pub fee_total: f64,
}

/// One row of the per-signal win/loss table.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub signal: SignalType,
    pub win_num: u32,
    pub loss_num: u32,
    pub win_rate: f64,
    pub win_balance: f64,
    pub loss_balance: f64,
    pub net_balance: f64,
    pub back_rate: f64,
    pub win_mean: f64,
    pub loss_mean: f64,
    pub profit_loss_ratio: f64,
}

/// Compute run statistics from the tick-level balance history.
///
/// Balances are first aggregated to one value per calendar day (the last
/// tick of the day wins). Non-positive balance ratios contribute a zero
/// log return rather than propagating NaN.
pub fn compute_summary(
    balance_history: &BTreeMap<NaiveDateTime, f64>,
    init_balance: f64,
    fee_total: f64,
    annual_days: f64,
    risk_free_rate: f64,
) -> BacktestSummary {
    let mut day_balances: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (datetime, balance) in balance_history {
        day_balances.insert(datetime.date(), *balance);
    }
    if day_balances.is_empty() {
        return BacktestSummary {
            fee_total,
            ..BacktestSummary::default()
        };
    }

    let days: Vec<NaiveDate> = day_balances.keys().copied().collect();
    let balances: Vec<f64> = day_balances.values().copied().collect();
    let total_days = balances.len();
    let end_balance = *balances.last().unwrap();

    let mut returns = Vec::with_capacity(total_days);
    let mut prev = init_balance;
    for &balance in &balances {
        let ret = if prev > 0.0 && balance / prev > 0.0 {
            (balance / prev).ln()
        } else {
            0.0
        };
        returns.push(ret);
        prev = balance;
    }

    let mut high = f64::MIN;
    let mut max_drawdown = 0.0_f64;
    let mut max_ddpercent = 0.0_f64;
    let mut dd_end_idx = 0usize;
    for (i, &balance) in balances.iter().enumerate() {
        high = high.max(balance);
        let drawdown = balance - high;
        let ddpercent = if high > 0.0 {
            drawdown / high * 100.0
        } else {
            0.0
        };
        if drawdown < max_drawdown {
            max_drawdown = drawdown;
            dd_end_idx = i;
        }
        max_ddpercent = max_ddpercent.min(ddpercent);
    }
    let dd_start_idx = balances[..=dd_end_idx]
        .iter()
        .enumerate()
        .fold((0usize, f64::MIN), |(best_i, best), (i, &b)| {
            if b > best { (i, b) } else { (best_i, best) }
        })
        .0;
    let max_drawdown_duration = (days[dd_end_idx] - days[dd_start_idx]).num_days();

    let total_return = if init_balance > 0.0 {
        (end_balance / init_balance - 1.0) * 100.0
    } else {
        0.0
    };
    let annual_return = total_return / total_days as f64 * annual_days;

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let return_std = if returns.len() > 1 {
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt() * 100.0
    } else {
        0.0
    };
    let daily_return = mean * 100.0;

    let sharpe_ratio = if return_std > 0.0 {
        let daily_risk_free = risk_free_rate / annual_days.sqrt();
        (daily_return - daily_risk_free) / return_std * annual_days.sqrt()
    } else {
        0.0
    };

    let return_drawdown_ratio = if max_ddpercent < 0.0 {
        -total_return / max_ddpercent
    } else {
        0.0
    };

    BacktestSummary {
        start_date: days.first().copied(),
        end_date: days.last().copied(),
        total_days,
        end_balance,
        total_return,
        annual_return,
        daily_return,
        return_std,
        max_drawdown,
        max_ddpercent,
        max_drawdown_duration,
        sharpe_ratio,
        return_drawdown_ratio,
        fee_total,
    }
}

/// Per-signal win/loss table in [`SignalType::ALL`] order. Every ratio
/// guards a zero denominator with 0.
pub fn signal_table(results: &BTreeMap<SignalType, SignalStats>) -> Vec<SignalRow> {
    SignalType::ALL
        .iter()
        .filter_map(|signal| results.get(signal).map(|stats| (*signal, *stats)))
        .map(|(signal, stats)| {
            let total = stats.win_num + stats.loss_num;
            let win_rate = if total == 0 {
                0.0
            } else {
                stats.win_num as f64 / total as f64 * 100.0
            };
            let back_rate = if stats.win_balance == 0.0 {
                0.0
            } else {
                stats.loss_balance / stats.win_balance * 100.0
            };
            let win_mean = if stats.win_num == 0 {
                0.0
            } else {
                stats.win_balance / stats.win_num as f64
            };
            let loss_mean = if stats.loss_num == 0 {
                0.0
            } else {
                stats.loss_balance / stats.loss_num as f64
            };
            let profit_loss_ratio = if win_mean == 0.0 || loss_mean == 0.0 {
                0.0
            } else {
                win_mean / loss_mean
            };
            SignalRow {
                signal,
                win_num: stats.win_num,
                loss_num: stats.loss_num,
                win_rate,
                win_balance: stats.win_balance,
                loss_balance: stats.loss_balance,
                net_balance: stats.win_balance - stats.loss_balance,
                back_rate,
                win_mean,
                loss_mean,
                profit_loss_ratio,
            }
        })
        .collect()
}

/// Closed positions across all codes, ordered by close time.
pub fn sorted_closed_positions(history: &BTreeMap<String, Vec<Position>>) -> Vec<&Position> {
    let mut positions: Vec<&Position> = history.values().flatten().collect();
    positions.sort_by_key(|p| p.close_datetime);
    positions
}
