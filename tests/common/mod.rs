#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io::Write;
use std::path::Path;

pub use swingtrader::adapters::csv_market_data::CsvMarketData;
pub use swingtrader::adapters::file_config_adapter::FileConfigAdapter;
pub use swingtrader::domain::config::{
    BacktestConfig, build_backtest_config, validate_backtest_config,
};
pub use swingtrader::domain::runner::BacktestRunner;

pub fn dt(day: u32, hour: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, min, 0)
        .unwrap()
}

/// Write a bar CSV from (open, close) pairs, one bar every 30 minutes
/// starting 2024-01-02 09:00, with a 0.25 high/low margin.
pub fn write_bars_csv(dir: &Path, name: &str, bars: &[(f64, f64)]) {
    let mut file = fs::File::create(dir.join(name)).unwrap();
    writeln!(file, "datetime,open,high,low,close,volume").unwrap();
    for (i, &(open, close)) in bars.iter().enumerate() {
        let datetime = dt(2, 9, 0) + chrono::Duration::minutes(i as i64 * 30);
        writeln!(
            file,
            "{},{},{},{},{},{}",
            datetime.format("%Y-%m-%d %H:%M:%S"),
            open,
            open.max(close) + 0.25,
            open.min(close) - 0.25,
            close,
            1000.0,
        )
        .unwrap();
    }
}

/// Price path that rises to 120, sells off to 90 and reverses sharply:
/// the down stroke ends in a strong-pause trough two bars before the
/// stream ends, so a pause strategy opens long and rides into the forced
/// liquidation.
pub fn pause_reversal_path() -> Vec<(f64, f64)> {
    let mut bars = Vec::new();
    for i in 0..5 {
        let open = 100.0 + 4.0 * i as f64;
        bars.push((open, open + 4.0)); // 100 -> 120
    }
    for i in 0..10 {
        let open = 120.0 - 3.0 * i as f64;
        bars.push((open, open - 3.0)); // 120 -> 90
    }
    bars.push((91.0, 96.0)); // gap-up reversal bar
    bars.push((96.0, 101.0));
    bars.push((101.0, 106.0));
    bars.push((106.0, 111.0));
    bars
}

pub fn config_ini(csv_dir: &Path, codes: &str) -> String {
    format!(
        r#"
[backtest]
mode = trade
market = futures
base_code = SHFE.RB
codes = {codes}
frequencys = 30m
start_datetime = 2024-01-01
end_datetime = 2024-01-31
init_balance = 100000
fee_rate = 0.0006
max_pos = 2
is_stock = false
is_futures = true
strategy = fractal_pause

[data]
csv_path = {path}
"#,
        codes = codes,
        path = csv_dir.display(),
    )
}

pub fn load_test_config(csv_dir: &Path, codes: &str) -> BacktestConfig {
    let adapter = FileConfigAdapter::from_string(&config_ini(csv_dir, codes)).unwrap();
    let config = build_backtest_config(&adapter).unwrap();
    validate_backtest_config(&config).unwrap();
    config
}
