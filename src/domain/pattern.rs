//! Pattern structure consumed by the heuristics: merged candles, fractals
//! and strokes. Produced by a pattern engine (see
//! `adapters::pattern_builder`); read-only here.

use serde::{Deserialize, Serialize};

use super::bar::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalKind {
    Peak,
    Trough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrokeDirection {
    Up,
    Down,
}

/// Width of the band used when a fractal's high/low threshold is looked up:
/// the middle candle alone, or the full three-candle range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalBand {
    Middle,
    Full,
}

/// A merged k-line. `index` lives in merged-candle space; `bar_start`
/// and `bar_end` are the raw-bar index span the candle absorbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub index: usize,
    pub high: f64,
    pub low: f64,
    pub bar_start: usize,
    pub bar_end: usize,
}

/// A local turning point supported by three merged candles.
///
/// `index` is the fractal's ordinal among all fractals, `candle_index` is
/// the middle candle's merged-space index, and `last_bar_index` is the
/// last raw bar of the third supporting candle, which anchors the
/// strong-pause staleness window.
#[derive(Debug, Clone, PartialEq)]
pub struct Fractal {
    pub index: usize,
    pub kind: FractalKind,
    pub value: f64,
    pub candle_index: usize,
    pub last_bar_index: usize,
    pub confirmed: bool,
    pub candles: [Candle; 3],
}

impl Fractal {
    /// Upper band threshold under the given width.
    pub fn high(&self, band: FractalBand) -> f64 {
        match band {
            FractalBand::Middle => self.candles[1].high,
            FractalBand::Full => self
                .candles
                .iter()
                .map(|c| c.high)
                .fold(f64::MIN, f64::max),
        }
    }

    /// Lower band threshold under the given width.
    pub fn low(&self, band: FractalBand) -> f64 {
        match band {
            FractalBand::Middle => self.candles[1].low,
            FractalBand::Full => self.candles.iter().map(|c| c.low).fold(f64::MAX, f64::min),
        }
    }
}

/// A directional price swing between two fractals.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub direction: StrokeDirection,
    pub start: Fractal,
    pub end: Fractal,
    pub high: f64,
    pub low: f64,
    pub done: bool,
}

/// Structural configuration of the pattern engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub fractal_band: FractalBand,
    /// Minimum merged candles a stroke must span, endpoints included.
    pub min_stroke_candles: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig {
            fractal_band: FractalBand::Full,
            min_stroke_candles: 5,
        }
    }
}

/// The full pattern structure for one (code, frequency) pair at the
/// current replay position.
#[derive(Debug, Clone)]
pub struct PatternData {
    pub code: String,
    pub frequency: String,
    pub config: PatternConfig,
    pub bars: Vec<Bar>,
    pub candles: Vec<Candle>,
    pub fractals: Vec<Fractal>,
    pub strokes: Vec<Stroke>,
}

impl PatternData {
    pub fn latest_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }
}
