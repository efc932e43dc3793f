//! Backtest runner: the sequential tick loop.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::config::BacktestConfig;
use super::error::SwingtraderError;
use super::operation::OpAction;
use super::position_manager::{PositionManager, TraderState};
use crate::ports::market_data::MarketDataProvider;
use crate::ports::strategy::Strategy;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Versioned, serializable runner state. Covers the full configuration
/// and trader state; the market data provider is excluded and rebuilt
/// from the configuration on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSnapshot {
    pub schema_version: u32,
    pub config: BacktestConfig,
    pub next_frequency: Option<String>,
    pub trader: TraderState,
}

/// Replays the configured time range once, driving the position manager
/// and the strategy, isolating per-code failures, and force-closing
/// everything at stream exhaustion.
pub struct BacktestRunner {
    pub config: BacktestConfig,
    pub manager: PositionManager,
    strategy: Box<dyn Strategy>,
    datas: Box<dyn MarketDataProvider>,
    /// Replay cadence of the last `run`, kept for snapshots.
    pub next_frequency: Option<String>,
    span: tracing::Span,
}

impl BacktestRunner {
    pub fn new(
        config: BacktestConfig,
        strategy: Box<dyn Strategy>,
        datas: Box<dyn MarketDataProvider>,
    ) -> Self {
        let manager = PositionManager::new(
            config.mode,
            config.init_balance,
            config.fee_rate,
            config.max_pos,
            config.is_stock,
            config.is_futures,
        );
        let span = tracing::info_span!(
            "backtest",
            market = %config.market,
            strategy = strategy.name(),
        );
        BacktestRunner {
            config,
            manager,
            strategy,
            datas,
            next_frequency: None,
            span,
        }
    }

    /// Rebuild a runner from a snapshot, a strategy and a fresh provider.
    /// Unknown schema versions are rejected.
    pub fn from_snapshot(
        snapshot: RunnerSnapshot,
        strategy: Box<dyn Strategy>,
        datas: Box<dyn MarketDataProvider>,
    ) -> Result<Self, SwingtraderError> {
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SwingtraderError::SnapshotVersion {
                found: snapshot.schema_version,
                supported: SNAPSHOT_SCHEMA_VERSION,
            });
        }
        let mut runner = BacktestRunner::new(snapshot.config, strategy, datas);
        runner.manager.restore(snapshot.trader);
        runner.next_frequency = snapshot.next_frequency;
        Ok(runner)
    }

    pub fn snapshot(&self) -> RunnerSnapshot {
        RunnerSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            config: self.config.clone(),
            next_frequency: self.next_frequency.clone(),
            trader: self.manager.state(),
        }
    }

    /// Replay the full configured range once. `target_frequency` selects
    /// the replay cadence, defaulting to the finest configured frequency.
    ///
    /// Each tick marks every open position before any strategy runs; a
    /// per-code strategy failure is logged and skips only that code for
    /// the tick. After exhaustion every remaining position is closed at
    /// its last known price.
    pub fn run(&mut self, target_frequency: Option<&str>) -> Result<(), SwingtraderError> {
        let span = self.span.clone();
        let _guard = span.enter();

        let frequency = target_frequency
            .map(str::to_string)
            .unwrap_or_else(|| self.config.finest_frequency().to_string());
        self.next_frequency = Some(frequency.clone());

        let base_code = self.config.base_code.clone();
        self.datas.init(&base_code, &frequency)?;
        tracing::info!(
            codes = self.config.codes.len(),
            %frequency,
            start = %self.config.start_datetime,
            end = %self.config.end_datetime,
            "replay starting",
        );

        let mut last_datetime: Option<NaiveDateTime> = None;
        loop {
            if !self.datas.advance()? {
                break;
            }
            let datetime = self
                .datas
                .current_datetime()
                .ok_or_else(|| SwingtraderError::Data {
                    reason: "provider advanced without a current datetime".into(),
                })?;
            last_datetime = Some(datetime);

            for code in self.manager.live_codes() {
                match self.datas.latest_bar_info(&code) {
                    Ok(info) => self.manager.mark_to_market(&code, info.close),
                    Err(error) => {
                        tracing::warn!(code = %code, %error, "mark-to-market skipped for this tick")
                    }
                }
            }
            self.manager.record_balance(datetime);

            let codes = self.config.codes.clone();
            for code in &codes {
                if let Err(error) = self.run_code(code, datetime) {
                    tracing::error!(code = %code, %error, "strategy pipeline failed; code skipped");
                }
            }
        }

        if let Some(datetime) = last_datetime {
            let mut prices = HashMap::new();
            for code in self.manager.live_codes() {
                if let Ok(info) = self.datas.latest_bar_info(&code) {
                    prices.insert(code, info.close);
                }
            }
            self.manager.force_close_all(&prices, datetime);
        }
        tracing::info!(
            closed = self.manager.history().values().map(Vec::len).sum::<usize>(),
            balance = self.manager.balance,
            "replay finished",
        );
        Ok(())
    }

    /// One code's strategy pipeline for the tick: close pass over live
    /// positions first, then the open pass.
    fn run_code(
        &mut self,
        code: &str,
        datetime: NaiveDateTime,
    ) -> Result<(), SwingtraderError> {
        let price = self.datas.latest_bar_info(code)?.close;

        let mut closes = Vec::new();
        for signal in self.manager.live_signals(code) {
            let Some(pos) = self.manager.get_live_mut(code, signal) else {
                continue;
            };
            if let Some(op) = self.strategy.close(code, pos, self.datas.as_mut())? {
                closes.push((signal, op));
            }
        }
        for (signal, op) in closes {
            self.manager
                .close(code, signal, &op.msg, price, datetime, false)?;
        }

        let live = self.manager.live_signals(code);
        for op in self.strategy.open(code, &live, self.datas.as_mut())? {
            match op.action {
                OpAction::Open => {
                    self.manager.open(code, &op, price, datetime)?;
                }
                OpAction::Close => {
                    self.manager
                        .close(code, op.signal, &op.msg, price, datetime, false)?;
                }
            }
        }
        Ok(())
    }
}
