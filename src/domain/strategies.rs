//! Concrete strategy implementations and the name registry the CLI
//! resolves configured strategies through.

use super::config::BacktestConfig;
use super::error::SwingtraderError;
use super::heuristics::{
    divergence_angle, is_confirming_fractal_formed, is_strong_pause_fractal, last_done_stroke,
};
use super::operation::Operation;
use super::pattern::{FractalKind, StrokeDirection};
use super::position::Position;
use super::risk::{check_give_back_stop, check_stop_loss, ratchet_stop_by_stroke};
use super::signal::{Side, SignalType};
use crate::ports::market_data::MarketDataProvider;
use crate::ports::strategy::Strategy;

/// Trades strong-pause fractal endings of done strokes on the finest
/// frequency: long when a down stroke pauses at a trough, short (futures
/// only) when an up stroke pauses at a peak. Entries are gated by the
/// divergence angle of recent stroke endpoints; exits run the stop-loss,
/// the give-back stop and the confirming-fractal reversal, ratcheting the
/// stop by the last done stroke every tick.
pub struct FractalPauseStrategy {
    max_give_back_rate: Option<f64>,
    allow_short: bool,
    min_divergence_angle: f64,
}

impl FractalPauseStrategy {
    pub fn new(max_give_back_rate: Option<f64>, allow_short: bool) -> Self {
        FractalPauseStrategy {
            max_give_back_rate,
            allow_short,
            min_divergence_angle: 0.0,
        }
    }

    pub fn with_min_divergence_angle(mut self, angle: f64) -> Self {
        self.min_divergence_angle = angle;
        self
    }

    fn finest_frequency(datas: &dyn MarketDataProvider) -> Option<String> {
        datas.frequencys().last().cloned()
    }
}

impl Strategy for FractalPauseStrategy {
    fn name(&self) -> &str {
        "fractal_pause"
    }

    fn open(
        &mut self,
        code: &str,
        live: &[SignalType],
        datas: &mut dyn MarketDataProvider,
    ) -> Result<Vec<Operation>, SwingtraderError> {
        let Some(frequency) = Self::finest_frequency(datas) else {
            return Ok(Vec::new());
        };
        let pattern = datas.pattern_data(code, &frequency)?;
        let Some(stroke) = last_done_stroke(&pattern.strokes) else {
            return Ok(Vec::new());
        };
        let band = pattern.config.fractal_band;

        let mut ops = Vec::new();
        match stroke.direction {
            StrokeDirection::Down => {
                if !live.contains(&SignalType::FirstBuy)
                    && is_strong_pause_fractal(stroke, &pattern)
                {
                    let troughs: Vec<f64> = pattern
                        .strokes
                        .iter()
                        .filter(|s| s.direction == StrokeDirection::Down)
                        .map(|s| s.end.value)
                        .collect();
                    let angle = divergence_angle(&troughs, FractalKind::Trough);
                    if angle >= self.min_divergence_angle {
                        let stop = stroke.low.min(stroke.end.low(band));
                        ops.push(
                            Operation::open(
                                SignalType::FirstBuy,
                                Some(stop),
                                format!(
                                    "strong pause at trough {:.2}, trough angle {:.2}",
                                    stroke.end.value, angle
                                ),
                            )
                            .with_info("trough_angle", format!("{angle:.4}")),
                        );
                    }
                }
            }
            StrokeDirection::Up => {
                if self.allow_short
                    && !live.contains(&SignalType::FirstSell)
                    && is_strong_pause_fractal(stroke, &pattern)
                {
                    let peaks: Vec<f64> = pattern
                        .strokes
                        .iter()
                        .filter(|s| s.direction == StrokeDirection::Up)
                        .map(|s| s.end.value)
                        .collect();
                    let angle = divergence_angle(&peaks, FractalKind::Peak);
                    if angle <= -self.min_divergence_angle {
                        let stop = stroke.high.max(stroke.end.high(band));
                        ops.push(
                            Operation::open(
                                SignalType::FirstSell,
                                Some(stop),
                                format!(
                                    "strong pause at peak {:.2}, peak angle {:.2}",
                                    stroke.end.value, angle
                                ),
                            )
                            .with_info("peak_angle", format!("{angle:.4}")),
                        );
                    }
                }
            }
        }
        Ok(ops)
    }

    fn close(
        &mut self,
        code: &str,
        pos: &mut Position,
        datas: &mut dyn MarketDataProvider,
    ) -> Result<Option<Operation>, SwingtraderError> {
        let price = datas.latest_bar_info(code)?.close;
        if let Some(op) = check_stop_loss(pos, price) {
            return Ok(Some(op));
        }
        if let Some(op) = check_give_back_stop(pos, price, self.max_give_back_rate) {
            return Ok(Some(op));
        }

        let Some(frequency) = Self::finest_frequency(datas) else {
            return Ok(None);
        };
        let pattern = datas.pattern_data(code, &frequency)?;
        ratchet_stop_by_stroke(pos, &pattern.strokes);

        if let Some(stroke) = last_done_stroke(&pattern.strokes) {
            let reversing = match (pos.side, stroke.direction) {
                (Side::Long, StrokeDirection::Up) | (Side::Short, StrokeDirection::Down) => {
                    is_confirming_fractal_formed(stroke, &pattern)
                }
                _ => false,
            };
            if reversing {
                return Ok(Some(Operation::close(
                    pos.signal,
                    format!("{} confirming fractal reversal", pos.signal),
                )));
            }
        }
        Ok(None)
    }
}

/// Resolve a configured strategy name to an instance.
pub fn resolve(
    name: &str,
    config: &BacktestConfig,
) -> Result<Box<dyn Strategy>, SwingtraderError> {
    match name {
        "fractal_pause" => Ok(Box::new(FractalPauseStrategy::new(
            config.max_give_back_rate,
            config.is_futures,
        ))),
        _ => Err(SwingtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "strategy".into(),
            reason: format!("unknown strategy {name}"),
        }),
    }
}
