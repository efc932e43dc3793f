//! Backtest configuration: construction from a config port and
//! validation of every field before a run starts.
//!
//! Missing required keys are fatal at construction; the run never starts.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::error::SwingtraderError;
use super::pattern::{FractalBand, PatternConfig};
use super::position_manager::Mode;
use crate::ports::config_port::ConfigPort;

const SECTION: &str = "backtest";
const PATTERN_SECTION: &str = "pattern";

/// Pattern configuration, global with optional per-frequency overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfigMap {
    pub default: PatternConfig,
    pub per_frequency: BTreeMap<String, PatternConfig>,
}

impl PatternConfigMap {
    pub fn for_frequency(&self, frequency: &str) -> &PatternConfig {
        self.per_frequency.get(frequency).unwrap_or(&self.default)
    }
}

impl Default for PatternConfigMap {
    fn default() -> Self {
        PatternConfigMap {
            default: PatternConfig::default(),
            per_frequency: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub mode: Mode,
    pub market: String,
    pub base_code: String,
    pub codes: Vec<String>,
    /// Coarse to fine; the last entry is the finest frequency and the
    /// default replay cadence.
    pub frequencys: Vec<String>,
    pub start_datetime: NaiveDateTime,
    pub end_datetime: NaiveDateTime,
    pub init_balance: f64,
    pub fee_rate: f64,
    pub max_pos: usize,
    pub is_stock: bool,
    pub is_futures: bool,
    pub strategy: String,
    pub annual_days: f64,
    pub risk_free_rate: f64,
    pub max_give_back_rate: Option<f64>,
    pub pattern: PatternConfigMap,
}

impl BacktestConfig {
    pub fn finest_frequency(&self) -> &str {
        self.frequencys.last().map(String::as_str).unwrap_or("")
    }
}

fn required_string(config: &dyn ConfigPort, key: &str) -> Result<String, SwingtraderError> {
    match config.get_string(SECTION, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SwingtraderError::ConfigMissing {
            section: SECTION.into(),
            key: key.into(),
        }),
    }
}

fn required_double(config: &dyn ConfigPort, key: &str) -> Result<f64, SwingtraderError> {
    required_string(config, key)?
        .parse()
        .map_err(|_| SwingtraderError::ConfigInvalid {
            section: SECTION.into(),
            key: key.into(),
            reason: "expected a number".into(),
        })
}

fn required_int(config: &dyn ConfigPort, key: &str) -> Result<i64, SwingtraderError> {
    required_string(config, key)?
        .parse()
        .map_err(|_| SwingtraderError::ConfigInvalid {
            section: SECTION.into(),
            key: key.into(),
            reason: "expected an integer".into(),
        })
}

fn required_bool(config: &dyn ConfigPort, key: &str) -> Result<bool, SwingtraderError> {
    let value = required_string(config, key)?;
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(SwingtraderError::ConfigInvalid {
            section: SECTION.into(),
            key: key.into(),
            reason: "expected a boolean".into(),
        }),
    }
}

fn parse_datetime(value: &str, key: &str) -> Result<NaiveDateTime, SwingtraderError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
        .map_err(|_| SwingtraderError::ConfigInvalid {
            section: SECTION.into(),
            key: key.into(),
            reason: "expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS".into(),
        })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_fractal_band(value: &str, section: &str) -> Result<FractalBand, SwingtraderError> {
    match value {
        "middle" => Ok(FractalBand::Middle),
        "full" => Ok(FractalBand::Full),
        _ => Err(SwingtraderError::ConfigInvalid {
            section: section.into(),
            key: "fractal_band".into(),
            reason: "expected middle or full".into(),
        }),
    }
}

fn pattern_config_for(
    config: &dyn ConfigPort,
    section: &str,
    base: PatternConfig,
) -> Result<PatternConfig, SwingtraderError> {
    let fractal_band = match config.get_string(section, "fractal_band") {
        Some(value) => parse_fractal_band(value.trim(), section)?,
        None => base.fractal_band,
    };
    let min_stroke_candles =
        config.get_int(section, "min_stroke_candles", base.min_stroke_candles as i64);
    if min_stroke_candles < 3 {
        return Err(SwingtraderError::ConfigInvalid {
            section: section.into(),
            key: "min_stroke_candles".into(),
            reason: "must be at least 3".into(),
        });
    }
    Ok(PatternConfig {
        fractal_band,
        min_stroke_candles: min_stroke_candles as usize,
    })
}

fn build_pattern_map(
    config: &dyn ConfigPort,
    frequencys: &[String],
) -> Result<PatternConfigMap, SwingtraderError> {
    let default = pattern_config_for(config, PATTERN_SECTION, PatternConfig::default())?;
    let mut per_frequency = BTreeMap::new();
    for frequency in frequencys {
        let section = format!("{PATTERN_SECTION}.{frequency}");
        let has_override = config.get_string(&section, "fractal_band").is_some()
            || config.get_string(&section, "min_stroke_candles").is_some();
        if has_override {
            per_frequency.insert(
                frequency.clone(),
                pattern_config_for(config, &section, default)?,
            );
        }
    }
    Ok(PatternConfigMap {
        default,
        per_frequency,
    })
}

/// Build a [`BacktestConfig`] from a config port, requiring every key the
/// simulation depends on.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SwingtraderError> {
    let mode_str = required_string(config, "mode")?;
    let mode = Mode::from_label(&mode_str).ok_or_else(|| SwingtraderError::ConfigInvalid {
        section: SECTION.into(),
        key: "mode".into(),
        reason: "expected signal or trade".into(),
    })?;

    let codes = parse_list(&required_string(config, "codes")?);
    let frequencys = parse_list(&required_string(config, "frequencys")?);

    let start_datetime = parse_datetime(&required_string(config, "start_datetime")?, "start_datetime")?;
    let end_datetime = parse_datetime(&required_string(config, "end_datetime")?, "end_datetime")?;

    let pattern = build_pattern_map(config, &frequencys)?;

    Ok(BacktestConfig {
        mode,
        market: required_string(config, "market")?,
        base_code: required_string(config, "base_code")?,
        codes,
        frequencys,
        start_datetime,
        end_datetime,
        init_balance: required_double(config, "init_balance")?,
        fee_rate: required_double(config, "fee_rate")?,
        max_pos: required_int(config, "max_pos")? as usize,
        is_stock: required_bool(config, "is_stock")?,
        is_futures: required_bool(config, "is_futures")?,
        strategy: required_string(config, "strategy")?,
        annual_days: config.get_double(SECTION, "annual_days", 240.0),
        risk_free_rate: config.get_double(SECTION, "risk_free_rate", 0.03),
        max_give_back_rate: config
            .get_string(SECTION, "max_give_back_rate")
            .and_then(|s| s.trim().parse().ok()),
        pattern,
    })
}

/// Validate field values after construction.
pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), SwingtraderError> {
    let invalid = |key: &str, reason: &str| SwingtraderError::ConfigInvalid {
        section: SECTION.into(),
        key: key.into(),
        reason: reason.into(),
    };

    if config.init_balance <= 0.0 {
        return Err(invalid("init_balance", "must be positive"));
    }
    if config.fee_rate < 0.0 || config.fee_rate >= 1.0 {
        return Err(invalid("fee_rate", "must be in [0, 1)"));
    }
    if config.max_pos == 0 {
        return Err(invalid("max_pos", "must be at least 1"));
    }
    if config.start_datetime >= config.end_datetime {
        return Err(invalid("start_datetime", "must be before end_datetime"));
    }
    if config.codes.is_empty() {
        return Err(invalid("codes", "must list at least one code"));
    }
    if config.frequencys.is_empty() {
        return Err(invalid("frequencys", "must list at least one frequency"));
    }
    if config.annual_days <= 0.0 {
        return Err(invalid("annual_days", "must be positive"));
    }
    if config.risk_free_rate < 0.0 || config.risk_free_rate >= 1.0 {
        return Err(invalid("risk_free_rate", "must be in [0, 1)"));
    }
    if config.is_stock && config.is_futures {
        return Err(invalid("is_stock", "is_stock and is_futures are exclusive"));
    }
    Ok(())
}
