//! CSV-backed market data provider with per-tick pattern caching.
//!
//! Bar files are named `{code}_{frequency}.csv` under the base path, with
//! a `datetime,open,high,low,close,volume` header. The replay timeline is
//! the base code's bar sequence at the chosen cadence; every view handed
//! out is truncated to the replay clock.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::NaiveDateTime;

use crate::adapters::pattern_builder::build_pattern_data;
use crate::domain::bar::{Bar, BarInfo};
use crate::domain::config::{BacktestConfig, PatternConfigMap};
use crate::domain::error::SwingtraderError;
use crate::domain::pattern::PatternData;
use crate::ports::market_data::MarketDataProvider;

pub struct CsvMarketData {
    base_path: PathBuf,
    frequencys: Vec<String>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    pattern_config: PatternConfigMap,
    /// Full filtered series per (code, frequency), loaded once per run.
    series: HashMap<(String, String), Rc<Vec<Bar>>>,
    timeline: Vec<NaiveDateTime>,
    cursor: Option<usize>,
    next: usize,
    /// Per-tick caches, cleared on every advance.
    bar_cache: HashMap<(String, String), Rc<Vec<Bar>>>,
    pattern_cache: HashMap<(String, String), Rc<PatternData>>,
}

impl CsvMarketData {
    pub fn new(
        base_path: PathBuf,
        frequencys: Vec<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        pattern_config: PatternConfigMap,
    ) -> Self {
        CsvMarketData {
            base_path,
            frequencys,
            start,
            end,
            pattern_config,
            series: HashMap::new(),
            timeline: Vec::new(),
            cursor: None,
            next: 0,
            bar_cache: HashMap::new(),
            pattern_cache: HashMap::new(),
        }
    }

    pub fn from_config(config: &BacktestConfig, base_path: PathBuf) -> Self {
        CsvMarketData::new(
            base_path,
            config.frequencys.clone(),
            config.start_datetime,
            config.end_datetime,
            config.pattern.clone(),
        )
    }

    fn csv_path(&self, code: &str, frequency: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", code, frequency))
    }

    fn load_series(
        &mut self,
        code: &str,
        frequency: &str,
    ) -> Result<Rc<Vec<Bar>>, SwingtraderError> {
        let key = (code.to_string(), frequency.to_string());
        if let Some(series) = self.series.get(&key) {
            return Ok(Rc::clone(series));
        }

        let path = self.csv_path(code, frequency);
        let content = fs::read_to_string(&path).map_err(|e| SwingtraderError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut rows: Vec<(NaiveDateTime, f64, f64, f64, f64, f64)> = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| SwingtraderError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let field = |i: usize, name: &str| {
                record
                    .get(i)
                    .ok_or_else(|| SwingtraderError::Data {
                        reason: format!("missing {} column in {}", name, path.display()),
                    })
            };
            let number = |i: usize, name: &str| -> Result<f64, SwingtraderError> {
                field(i, name)?
                    .parse()
                    .map_err(|e| SwingtraderError::Data {
                        reason: format!("invalid {} value in {}: {}", name, path.display(), e),
                    })
            };

            let datetime = NaiveDateTime::parse_from_str(
                field(0, "datetime")?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| SwingtraderError::Data {
                reason: format!("invalid datetime in {}: {}", path.display(), e),
            })?;

            if datetime < self.start || datetime > self.end {
                continue;
            }
            rows.push((
                datetime,
                number(1, "open")?,
                number(2, "high")?,
                number(3, "low")?,
                number(4, "close")?,
                number(5, "volume")?,
            ));
        }

        rows.sort_by_key(|r| r.0);
        let bars: Vec<Bar> = rows
            .into_iter()
            .enumerate()
            .map(|(index, (datetime, open, high, low, close, volume))| Bar {
                code: code.to_string(),
                datetime,
                open,
                high,
                low,
                close,
                volume,
                index,
            })
            .collect();

        let series = Rc::new(bars);
        self.series.insert(key, Rc::clone(&series));
        Ok(series)
    }

    fn clock(&self) -> Result<NaiveDateTime, SwingtraderError> {
        self.current_datetime().ok_or_else(|| SwingtraderError::Data {
            reason: "replay not advanced yet".into(),
        })
    }
}

impl MarketDataProvider for CsvMarketData {
    fn init(&mut self, base_code: &str, frequency: &str) -> Result<(), SwingtraderError> {
        let base = self.load_series(base_code, frequency)?;
        self.timeline = base.iter().map(|b| b.datetime).collect();
        self.cursor = None;
        self.next = 0;
        self.bar_cache.clear();
        self.pattern_cache.clear();
        if self.timeline.is_empty() {
            return Err(SwingtraderError::Data {
                reason: format!("no bars for {base_code} at {frequency} in the configured range"),
            });
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<bool, SwingtraderError> {
        // the per-tick caches die here, never across ticks
        self.bar_cache.clear();
        self.pattern_cache.clear();
        if self.next >= self.timeline.len() {
            return Ok(false);
        }
        self.cursor = Some(self.next);
        self.next += 1;
        Ok(true)
    }

    fn current_datetime(&self) -> Option<NaiveDateTime> {
        self.cursor.map(|i| self.timeline[i])
    }

    fn bars(&mut self, code: &str, frequency: &str) -> Result<Rc<Vec<Bar>>, SwingtraderError> {
        let key = (code.to_string(), frequency.to_string());
        if let Some(view) = self.bar_cache.get(&key) {
            return Ok(Rc::clone(view));
        }
        let clock = self.clock()?;
        let full = self.load_series(code, frequency)?;
        let view: Vec<Bar> = full
            .iter()
            .filter(|b| b.datetime <= clock)
            .cloned()
            .collect();
        let view = Rc::new(view);
        self.bar_cache.insert(key, Rc::clone(&view));
        Ok(view)
    }

    fn latest_bar_info(&mut self, code: &str) -> Result<BarInfo, SwingtraderError> {
        let finest = self
            .frequencys
            .last()
            .cloned()
            .ok_or_else(|| SwingtraderError::Data {
                reason: "no frequencies configured".into(),
            })?;
        let view = self.bars(code, &finest)?;
        view.last()
            .map(BarInfo::from)
            .ok_or_else(|| SwingtraderError::Data {
                reason: format!("no bars for {code} up to the replay clock"),
            })
    }

    fn pattern_data(
        &mut self,
        code: &str,
        frequency: &str,
    ) -> Result<Rc<PatternData>, SwingtraderError> {
        let key = (code.to_string(), frequency.to_string());
        if let Some(pattern) = self.pattern_cache.get(&key) {
            return Ok(Rc::clone(pattern));
        }
        let view = self.bars(code, frequency)?;
        let config = *self.pattern_config.for_frequency(frequency);
        let pattern = Rc::new(build_pattern_data(
            code,
            frequency,
            view.as_ref().clone(),
            &config,
        ));
        self.pattern_cache.insert(key, Rc::clone(&pattern));
        Ok(pattern)
    }

    fn frequencys(&self) -> &[String] {
        &self.frequencys
    }
}
