//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_market_data::CsvMarketData;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_snapshot::JsonSnapshotAdapter;
use crate::adapters::text_report::{self, TextReportAdapter};
use crate::domain::analyzer::{compute_summary, signal_table, sorted_closed_positions};
use crate::domain::config::{BacktestConfig, build_backtest_config, validate_backtest_config};
use crate::domain::error::SwingtraderError;
use crate::domain::runner::BacktestRunner;
use crate::domain::strategies;
use crate::ports::config_port::ConfigPort;
use crate::ports::report::ReportPort;
use crate::ports::snapshot::SnapshotPort;

#[derive(Parser, Debug)]
#[command(name = "swingtrader", about = "Pattern-structure strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Replay cadence; defaults to the finest configured frequency
        #[arg(short, long)]
        frequency: Option<String>,
        /// Write a text report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Save a snapshot of the finished run to this path
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Report on a saved snapshot
    Report {
        #[arg(short, long)]
        snapshot: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            frequency,
            output,
            snapshot,
        } => run_backtest(&config, frequency.as_deref(), output.as_ref(), snapshot.as_ref()),
        Command::Validate { config } => run_validate(&config),
        Command::Report { snapshot, output } => run_report(&snapshot, output.as_ref()),
    }
}

fn fail(err: &SwingtraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SwingtraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        fail(&err)
    })
}

fn build_validated_config(adapter: &FileConfigAdapter) -> Result<BacktestConfig, ExitCode> {
    let config = build_backtest_config(adapter).map_err(|e| fail(&e))?;
    validate_backtest_config(&config).map_err(|e| fail(&e))?;
    Ok(config)
}

fn data_path(adapter: &FileConfigAdapter) -> Result<PathBuf, ExitCode> {
    match adapter.get_string("data", "csv_path") {
        Some(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Err(fail(&SwingtraderError::ConfigMissing {
            section: "data".into(),
            key: "csv_path".into(),
        })),
    }
}

fn run_backtest(
    config_path: &PathBuf,
    frequency: Option<&str>,
    output: Option<&PathBuf>,
    snapshot_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: load and validate configuration
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_validated_config(&adapter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // Stage 2: resolve the strategy and the data provider
    let strategy = match strategies::resolve(&config.strategy, &config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    eprintln!("Strategy: {}", strategy.name());
    let base_path = match data_path(&adapter) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let datas = CsvMarketData::from_config(&config, base_path);

    // Stage 3: run the replay
    eprintln!(
        "Running backtest: {} codes, {} to {}",
        config.codes.len(),
        config.start_datetime,
        config.end_datetime,
    );
    let mut runner = BacktestRunner::new(config, strategy, Box::new(datas));
    if let Err(e) = runner.run(frequency) {
        return fail(&e);
    }

    // Stage 4: statistics and report
    let summary = compute_summary(
        &runner.manager.balance_history,
        runner.config.init_balance,
        runner.manager.fee_total,
        runner.config.annual_days,
        runner.config.risk_free_rate,
    );
    let table = signal_table(&runner.manager.results);
    let positions = sorted_closed_positions(runner.manager.history());

    eprint!("\n{}", text_report::render_summary(&summary));
    eprint!("\n{}", text_report::render_signal_table(&table));

    if let Some(output) = output {
        if let Err(e) = TextReportAdapter.write(&summary, &table, &positions, output) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }

    // Stage 5: optional snapshot
    if let Some(path) = snapshot_path {
        if let Err(e) = JsonSnapshotAdapter.save(&runner.snapshot(), path) {
            return fail(&e);
        }
        eprintln!("Snapshot saved to: {}", path.display());
    }

    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_validated_config(&adapter) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = strategies::resolve(&config.strategy, &config) {
        return fail(&e);
    }
    eprintln!(
        "OK: {} codes, {} frequencies, strategy {}",
        config.codes.len(),
        config.frequencys.len(),
        config.strategy,
    );
    ExitCode::SUCCESS
}

fn run_report(snapshot_path: &PathBuf, output: Option<&PathBuf>) -> ExitCode {
    let snapshot = match JsonSnapshotAdapter.load(snapshot_path) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let summary = compute_summary(
        &snapshot.trader.balance_history,
        snapshot.config.init_balance,
        snapshot.trader.fee_total,
        snapshot.config.annual_days,
        snapshot.config.risk_free_rate,
    );
    let table = signal_table(&snapshot.trader.results);
    let positions = sorted_closed_positions(&snapshot.trader.history);

    eprint!("{}", text_report::render_summary(&summary));
    eprint!("\n{}", text_report::render_signal_table(&table));
    eprint!("\n{}", text_report::render_positions(&positions));

    if let Some(output) = output {
        if let Err(e) = TextReportAdapter.write(&summary, &table, &positions, output) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }
    ExitCode::SUCCESS
}
