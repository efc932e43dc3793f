//! Risk control: stop-loss, give-back stop and stop ratcheting.
//!
//! Pure functions over a position and the latest price; no owned state.

use super::operation::Operation;
use super::pattern::{Stroke, StrokeDirection};
use super::position::Position;

/// Check whether the position's stop-loss has triggered at `price`.
///
/// Long: triggers when price drops strictly below the stop. Short:
/// strictly above. No-op when no stop is set.
pub fn check_stop_loss(pos: &Position, price: f64) -> Option<Operation> {
    let stop = pos.stop_loss?;
    let triggered = if pos.is_long() {
        price < stop
    } else {
        price > stop
    };
    if triggered {
        Some(Operation::close(
            pos.signal,
            format!("{} stop loss", pos.signal),
        ))
    } else {
        None
    }
}

/// Check whether unrealized profit has retraced from its running maximum
/// by at least `max_give_back_rate` percentage points.
///
/// Only fires while the instantaneous profit rate is positive; a position
/// that never turned a profit is left to the stop-loss.
pub fn check_give_back_stop(
    pos: &Position,
    price: f64,
    max_give_back_rate: Option<f64>,
) -> Option<Operation> {
    let max_back = max_give_back_rate?;
    let profit_rate = pos.price_profit_rate(price);
    if profit_rate > 0.0 && pos.max_profit_rate - profit_rate >= max_back {
        Some(Operation::close(
            pos.signal,
            format!("{} give-back stop", pos.signal),
        ))
    } else {
        None
    }
}

/// Ratchet the stop to the most recent done stroke: an upward stroke
/// raises a long stop to the stroke low, a downward stroke lowers a short
/// stop to the stroke high. The stop never loosens. No-op without a stop
/// or a done stroke.
pub fn ratchet_stop_by_stroke(pos: &mut Position, strokes: &[Stroke]) {
    let Some(current) = pos.stop_loss else {
        return;
    };
    let Some(stroke) = strokes.iter().rev().find(|s| s.done) else {
        return;
    };
    if pos.is_long() && stroke.direction == StrokeDirection::Up {
        pos.stop_loss = Some(current.max(stroke.low));
    } else if pos.is_short() && stroke.direction == StrokeDirection::Down {
        pos.stop_loss = Some(current.min(stroke.high));
    }
}
