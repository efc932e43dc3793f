//! Pattern-confirmation heuristics.
//!
//! Stateless functions over a pattern structure and its latest bar,
//! answering the entry/exit timing questions strategies ask. Windowing
//! and tie-break behavior here is deliberate; treat the constants as part
//! of the contract.

use super::pattern::{FractalKind, PatternData, Stroke, StrokeDirection};

/// Raw bars the latest bar may trail a fractal's supporting bars before
/// a strong-pause reading is considered stale.
const STRONG_PAUSE_MAX_BAR_GAP: i64 = 2;

/// Merged candles two fractals may be apart and still confirm each other.
const CONFIRMING_MAX_CANDLE_GAP: i64 = 3;

/// Most recent completed stroke, if any.
pub fn last_done_stroke(strokes: &[Stroke]) -> Option<&Stroke> {
    strokes.iter().rev().find(|s| s.done)
}

/// Strong-pause test for the stroke's ending fractal: the latest bar must
/// be an adjacent reversal bar closing beyond the fractal's band
/// threshold.
///
/// Rejected outright when the ending fractal is unconfirmed, when the
/// latest bar trails the fractal's supporting bars by more than
/// [`STRONG_PAUSE_MAX_BAR_GAP`] raw bars, or when the latest bar *is* the
/// fractal's last supporting bar.
pub fn is_strong_pause_fractal(stroke: &Stroke, pattern: &PatternData) -> bool {
    if !stroke.end.confirmed {
        return false;
    }
    let Some(last) = pattern.latest_bar() else {
        return false;
    };
    if last.index as i64 - stroke.end.last_bar_index as i64 > STRONG_PAUSE_MAX_BAR_GAP {
        return false;
    }
    if stroke.end.last_bar_index == last.index {
        return false;
    }
    let band = pattern.config.fractal_band;
    match stroke.end.kind {
        FractalKind::Peak => last.is_bearish() && last.close < stroke.end.low(band),
        FractalKind::Trough => last.is_bullish() && last.close > stroke.end.high(band),
    }
}

/// Confirming-fractal test: the first later fractal of the same kind must
/// be fully formed, must not exceed the stroke's ending fractal, and the
/// current price must sit beyond the ending fractal's band threshold.
///
/// Fractals more than [`CONFIRMING_MAX_CANDLE_GAP`] merged candles apart
/// do not confirm each other.
pub fn is_confirming_fractal_formed(stroke: &Stroke, pattern: &PatternData) -> bool {
    let Some(last) = pattern.latest_bar() else {
        return false;
    };
    let price = last.close;
    let Some(next_fx) = pattern
        .fractals
        .iter()
        .find(|fx| fx.index > stroke.end.index && fx.kind == stroke.end.kind)
    else {
        return false;
    };
    if next_fx.candle_index as i64 - stroke.end.candle_index as i64 > CONFIRMING_MAX_CANDLE_GAP {
        return false;
    }
    let band = pattern.config.fractal_band;
    match stroke.direction {
        StrokeDirection::Up => {
            next_fx.confirmed
                && next_fx.value < stroke.end.value
                && price < stroke.end.low(band)
        }
        StrokeDirection::Down => {
            next_fx.confirmed
                && next_fx.value > stroke.end.value
                && price > stroke.end.high(band)
        }
    }
}

/// Trend angle of a point series, in degrees.
///
/// The series is smoothed with a trailing moving average of window 2 (the
/// first entry is undefined and discarded), local extrema of the requested
/// kind are picked by three-point comparison (the right boundary counts on
/// its single neighbor), and the slope between the two most extreme points
/// (taken at their original indexes) is converted through arctangent.
/// Fewer than two extrema yield 0.
pub fn divergence_angle(points: &[f64], kind: FractalKind) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let smoothed: Vec<(usize, f64)> = (1..points.len())
        .map(|i| (i, (points[i - 1] + points[i]) / 2.0))
        .collect();

    let mut extrema: Vec<(usize, f64)> = Vec::new();
    for i in 1..smoothed.len() {
        let p1 = smoothed[i - 1];
        let p2 = smoothed[i];
        let p3 = smoothed.get(i + 1);
        let picked = match kind {
            FractalKind::Peak => p1.1 <= p2.1 && p3.is_none_or(|p| p2.1 >= p.1),
            FractalKind::Trough => p1.1 >= p2.1 && p3.is_none_or(|p| p2.1 <= p.1),
        };
        if picked {
            extrema.push(p2);
        }
    }
    if extrema.len() < 2 {
        return 0.0;
    }

    match kind {
        FractalKind::Peak => {
            extrema.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        }
        FractalKind::Trough => {
            extrema.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        }
    }
    let (i1, v1) = extrema[0];
    let (i2, v2) = extrema[1];
    let slope = (v1 - v2) / (i1 as f64 - i2 as f64);
    slope.atan().to_degrees()
}
