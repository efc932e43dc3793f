//! Pattern engine: merges bars into candles, detects fractals, links
//! strokes.
//!
//! A deliberately small implementation of the pattern-engine contract.
//! The heuristics consume only the documented structure, so a richer
//! engine can replace this adapter without touching the domain.

use crate::domain::bar::Bar;
use crate::domain::pattern::{
    Candle, Fractal, FractalKind, PatternConfig, PatternData, Stroke, StrokeDirection,
};

/// Build the full pattern structure for one (code, frequency) series.
pub fn build_pattern_data(
    code: &str,
    frequency: &str,
    bars: Vec<Bar>,
    config: &PatternConfig,
) -> PatternData {
    let candles = merge_candles(&bars);
    let fractals = detect_fractals(&candles);
    let strokes = build_strokes(&fractals, config.min_stroke_candles);
    PatternData {
        code: code.to_string(),
        frequency: frequency.to_string(),
        config: *config,
        bars,
        candles,
        fractals,
        strokes,
    }
}

/// Merge inclusion bars: a bar whose range is contained by (or contains)
/// the previous candle joins it, extending in the prevailing direction.
pub fn merge_candles(bars: &[Bar]) -> Vec<Candle> {
    let mut candles: Vec<Candle> = Vec::new();
    for bar in bars {
        let n = candles.len();
        if n == 0 {
            candles.push(Candle {
                index: 0,
                high: bar.high,
                low: bar.low,
                bar_start: bar.index,
                bar_end: bar.index,
            });
            continue;
        }
        let last = candles[n - 1];
        let contains = last.high >= bar.high && last.low <= bar.low;
        let contained = bar.high >= last.high && bar.low <= last.low;
        if contains || contained {
            let rising = n >= 2 && candles[n - 2].high <= last.high;
            let merged = if rising {
                Candle {
                    high: last.high.max(bar.high),
                    low: last.low.max(bar.low),
                    bar_end: bar.index,
                    ..last
                }
            } else {
                Candle {
                    high: last.high.min(bar.high),
                    low: last.low.min(bar.low),
                    bar_end: bar.index,
                    ..last
                }
            };
            candles[n - 1] = merged;
        } else {
            candles.push(Candle {
                index: n,
                high: bar.high,
                low: bar.low,
                bar_start: bar.index,
                bar_end: bar.index,
            });
        }
    }
    candles
}

/// Three-candle fractal detection. A fractal is confirmed once a candle
/// exists beyond its third supporting candle.
pub fn detect_fractals(candles: &[Candle]) -> Vec<Fractal> {
    let mut fractals = Vec::new();
    if candles.len() < 3 {
        return fractals;
    }
    for i in 1..candles.len() - 1 {
        let left = candles[i - 1];
        let mid = candles[i];
        let right = candles[i + 1];
        let kind = if mid.high > left.high && mid.high > right.high {
            Some(FractalKind::Peak)
        } else if mid.low < left.low && mid.low < right.low {
            Some(FractalKind::Trough)
        } else {
            None
        };
        if let Some(kind) = kind {
            let value = match kind {
                FractalKind::Peak => mid.high,
                FractalKind::Trough => mid.low,
            };
            fractals.push(Fractal {
                index: fractals.len(),
                kind,
                value,
                candle_index: mid.index,
                last_bar_index: right.bar_end,
                confirmed: i + 2 < candles.len(),
                candles: [left, mid, right],
            });
        }
    }
    fractals
}

/// Link alternating fractals into strokes spanning at least
/// `min_candles` merged candles, endpoints included. Consecutive
/// same-kind fractals keep the more extreme one; a more extreme
/// replacement also extends the stroke that ended there.
pub fn build_strokes(fractals: &[Fractal], min_candles: usize) -> Vec<Stroke> {
    let mut strokes: Vec<Stroke> = Vec::new();
    let Some(first) = fractals.first() else {
        return strokes;
    };
    let mut start = first.clone();
    for fx in &fractals[1..] {
        if fx.kind == start.kind {
            let better = match fx.kind {
                FractalKind::Peak => fx.value > start.value,
                FractalKind::Trough => fx.value < start.value,
            };
            if better {
                start = fx.clone();
                if let Some(prev) = strokes.last_mut() {
                    prev.end = start.clone();
                    prev.high = prev.start.value.max(start.value);
                    prev.low = prev.start.value.min(start.value);
                    prev.done = start.confirmed;
                }
            }
            continue;
        }
        let span = fx.candle_index + 1 - start.candle_index;
        if span < min_candles {
            continue;
        }
        let direction = match fx.kind {
            FractalKind::Peak => StrokeDirection::Up,
            FractalKind::Trough => StrokeDirection::Down,
        };
        strokes.push(Stroke {
            direction,
            high: start.value.max(fx.value),
            low: start.value.min(fx.value),
            done: fx.confirmed,
            start,
            end: fx.clone(),
        });
        start = fx.clone();
    }
    strokes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// One bar per consecutive close pair: bar `i` opens at `closes[i]`
    /// and closes at `closes[i + 1]`.
    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let (open, close) = (pair[0], pair[1]);
                Bar {
                    code: "SHFE.RB".into(),
                    datetime: NaiveDate::from_ymd_opt(2024, 1, 1)
                        .unwrap()
                        .and_hms_opt(9, 0, 0)
                        .unwrap()
                        + chrono::Duration::minutes(i as i64 * 30),
                    open,
                    high: open.max(close) + 0.25,
                    low: open.min(close) - 0.25,
                    close,
                    volume: 100.0,
                    index: i,
                }
            })
            .collect()
    }

    /// An M-shaped path: up to 110, down to 95, up to 112, down to 100.
    fn m_shape() -> Vec<f64> {
        let mut closes = Vec::new();
        for i in 0..=5 {
            closes.push(100.0 + 2.0 * i as f64); // 100 -> 110
        }
        for i in 1..=5 {
            closes.push(110.0 - 3.0 * i as f64); // -> 95
        }
        for i in 1..=5 {
            closes.push(95.0 + 3.4 * i as f64); // -> 112
        }
        for i in 1..=5 {
            closes.push(112.0 - 2.4 * i as f64); // -> 100
        }
        closes
    }

    #[test]
    fn monotone_bars_stay_unmerged() {
        let bars = bars_from_closes(&[100.0, 102.0, 104.0, 106.0]);
        let candles = merge_candles(&bars);
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[2].index, 2);
        assert_eq!(candles[2].bar_start, 2);
        assert_eq!(candles[2].bar_end, 2);
    }

    #[test]
    fn inclusion_bar_merges_into_previous_candle() {
        // the 104 -> 103 bar sits inside the 100 -> 104 bar's range
        let bars = bars_from_closes(&[100.0, 104.0, 103.0, 106.0]);
        let candles = merge_candles(&bars);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].bar_start, 0);
        assert_eq!(candles[0].bar_end, 1);
        assert!((candles[0].high - 104.25).abs() < 1e-9);
        assert_eq!(candles[1].index, 1);
        assert_eq!(candles[1].bar_start, 2);
    }

    #[test]
    fn fractals_found_at_turns() {
        let bars = bars_from_closes(&m_shape());
        let candles = merge_candles(&bars);
        let fractals = detect_fractals(&candles);

        let peaks: Vec<&Fractal> = fractals
            .iter()
            .filter(|f| f.kind == FractalKind::Peak)
            .collect();
        let troughs: Vec<&Fractal> = fractals
            .iter()
            .filter(|f| f.kind == FractalKind::Trough)
            .collect();
        assert_eq!(peaks.len(), 2);
        assert_eq!(troughs.len(), 1);
        // the first peak tops out at 110 plus the high margin
        assert!((peaks[0].value - 110.25).abs() < 1e-9);
        assert!((troughs[0].value - 94.75).abs() < 1e-9);
    }

    #[test]
    fn fractal_ordinals_and_supports() {
        let bars = bars_from_closes(&m_shape());
        let fractals = detect_fractals(&merge_candles(&bars));
        for (i, fx) in fractals.iter().enumerate() {
            assert_eq!(fx.index, i);
            assert_eq!(fx.candles[1].index, fx.candle_index);
            assert_eq!(fx.last_bar_index, fx.candles[2].bar_end);
        }
    }

    #[test]
    fn edge_fractal_is_unconfirmed() {
        // the turn bar merges into the peak candle, which then sits on the
        // second-to-last candle with nothing beyond its third support
        let bars = bars_from_closes(&[100.0, 104.0, 108.0, 103.0, 99.0]);
        let fractals = detect_fractals(&merge_candles(&bars));
        assert_eq!(fractals.len(), 1);
        assert_eq!(fractals[0].kind, FractalKind::Peak);
        assert!(!fractals[0].confirmed);
    }

    #[test]
    fn strokes_alternate_and_respect_min_span() {
        let bars = bars_from_closes(&m_shape());
        let pattern = build_pattern_data("SHFE.RB", "30m", bars, &PatternConfig::default());

        assert_eq!(pattern.strokes.len(), 2);
        assert_eq!(pattern.strokes[0].direction, StrokeDirection::Down);
        assert_eq!(pattern.strokes[1].direction, StrokeDirection::Up);
        for stroke in &pattern.strokes {
            assert!(stroke.end.candle_index + 1 - stroke.start.candle_index >= 5);
            assert!(stroke.high > stroke.low);
        }
    }

    #[test]
    fn close_opposite_fractal_is_skipped() {
        let fractals = vec![
            Fractal {
                index: 0,
                kind: FractalKind::Peak,
                value: 110.0,
                candle_index: 10,
                last_bar_index: 11,
                confirmed: true,
                candles: [Candle {
                    index: 10,
                    high: 110.0,
                    low: 108.0,
                    bar_start: 9,
                    bar_end: 11,
                }; 3],
            },
            // only two candles away: too close for a stroke
            Fractal {
                index: 1,
                kind: FractalKind::Trough,
                value: 105.0,
                candle_index: 12,
                last_bar_index: 13,
                confirmed: true,
                candles: [Candle {
                    index: 12,
                    high: 107.0,
                    low: 105.0,
                    bar_start: 11,
                    bar_end: 13,
                }; 3],
            },
        ];
        let strokes = build_strokes(&fractals, 5);
        assert!(strokes.is_empty());
    }

    #[test]
    fn empty_and_tiny_inputs() {
        assert!(merge_candles(&[]).is_empty());
        assert!(detect_fractals(&[]).is_empty());
        assert!(build_strokes(&[], 5).is_empty());
        let bars = bars_from_closes(&[100.0, 101.0]);
        assert!(detect_fractals(&merge_candles(&bars)).is_empty());
    }
}
