//! Plain-text report adapter: run summary, per-signal table and the
//! closed-position tape.

use std::fs;
use std::path::Path;

use crate::domain::analyzer::{BacktestSummary, SignalRow};
use crate::domain::error::SwingtraderError;
use crate::domain::position::Position;
use crate::ports::report::ReportPort;

pub struct TextReportAdapter;

pub fn render_summary(summary: &BacktestSummary) -> String {
    let mut out = String::new();
    out.push_str("=== Backtest Summary ===\n");
    match (summary.start_date, summary.end_date) {
        (Some(start), Some(end)) => {
            out.push_str(&format!(
                "Trading days:       {} ({} to {})\n",
                summary.total_days, start, end
            ));
        }
        _ => out.push_str("Trading days:       0\n"),
    }
    out.push_str(&format!("End balance:        {:.2}\n", summary.end_balance));
    out.push_str(&format!("Total fees:         {:.2}\n", summary.fee_total));
    out.push_str(&format!("Total return:       {:.2}%\n", summary.total_return));
    out.push_str(&format!("Annualized return:  {:.2}%\n", summary.annual_return));
    out.push_str(&format!(
        "Max drawdown:       {:.2} ({:.2}%), {} days\n",
        summary.max_drawdown, summary.max_ddpercent, summary.max_drawdown_duration
    ));
    out.push_str(&format!(
        "Daily return:       {:.2}%  std {:.2}%\n",
        summary.daily_return, summary.return_std
    ));
    out.push_str(&format!("Sharpe ratio:       {:.2}\n", summary.sharpe_ratio));
    out.push_str(&format!(
        "Return/drawdown:    {:.2}\n",
        summary.return_drawdown_ratio
    ));
    out
}

pub fn render_signal_table(rows: &[SignalRow]) -> String {
    let mut out = String::new();
    out.push_str("=== Signal Results ===\n");
    out.push_str(&format!(
        "{:<16}{:>6}{:>6}{:>9}{:>12}{:>12}{:>12}{:>10}{:>11}{:>11}{:>8}\n",
        "signal",
        "win",
        "loss",
        "rate%",
        "gross win",
        "gross loss",
        "net",
        "back%",
        "mean win",
        "mean loss",
        "p/l"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<16}{:>6}{:>6}{:>9.2}{:>12.2}{:>12.2}{:>12.2}{:>10.2}{:>11.2}{:>11.2}{:>8.4}\n",
            row.signal.label(),
            row.win_num,
            row.loss_num,
            row.win_rate,
            row.win_balance,
            row.loss_balance,
            row.net_balance,
            row.back_rate,
            row.win_mean,
            row.loss_mean,
            row.profit_loss_ratio,
        ));
    }
    out
}

pub fn render_positions(positions: &[&Position]) -> String {
    let mut out = String::new();
    out.push_str("=== Closed Positions ===\n");
    out.push_str(&format!(
        "{:<12}{:<10}{:<22}{:<22}{:>10}{:>10}{:>9}  {}\n",
        "code", "signal", "opened", "closed", "open", "close", "rate%", "close msg"
    ));
    for pos in positions {
        let closed = pos
            .close_datetime
            .map(|dt| dt.to_string())
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<12}{:<10}{:<22}{:<22}{:>10.2}{:>10.2}{:>9.2}  {}\n",
            pos.code,
            pos.signal.label(),
            pos.open_datetime.to_string(),
            closed,
            pos.open_price,
            pos.close_price.unwrap_or(0.0),
            pos.profit_rate,
            pos.close_msg,
        ));
    }
    out
}

impl ReportPort for TextReportAdapter {
    fn write(
        &self,
        summary: &BacktestSummary,
        table: &[SignalRow],
        positions: &[&Position],
        output: &Path,
    ) -> Result<(), SwingtraderError> {
        let content = format!(
            "{}\n{}\n{}",
            render_summary(summary),
            render_signal_table(table),
            render_positions(positions),
        );
        fs::write(output, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position_manager::SignalStats;
    use crate::domain::signal::{Side, SignalType};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_summary() -> BacktestSummary {
        BacktestSummary {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 29),
            total_days: 60,
            end_balance: 112_345.67,
            total_return: 12.35,
            annual_return: 49.38,
            daily_return: 0.19,
            return_std: 1.2,
            max_drawdown: -4_200.0,
            max_ddpercent: -3.9,
            max_drawdown_duration: 11,
            sharpe_ratio: 1.87,
            return_drawdown_ratio: 3.17,
            fee_total: 321.5,
        }
    }

    fn sample_rows() -> Vec<SignalRow> {
        let results = BTreeMap::from([(
            SignalType::FirstBuy,
            SignalStats {
                win_num: 3,
                loss_num: 2,
                win_balance: 60.0,
                loss_balance: 20.0,
            },
        )]);
        crate::domain::analyzer::signal_table(&results)
    }

    #[test]
    fn summary_lists_headline_numbers() {
        let text = render_summary(&sample_summary());
        assert!(text.contains("12.35%"));
        assert!(text.contains("112345.67"));
        assert!(text.contains("-3.90%"));
        assert!(text.contains("11 days"));
        assert!(text.contains("Sharpe ratio:       1.87"));
    }

    #[test]
    fn signal_table_has_header_and_row() {
        let text = render_signal_table(&sample_rows());
        assert!(text.contains("gross win"));
        assert!(text.contains("1buy"));
        assert!(text.contains("60.00"));
        assert!(text.contains("2.0000"));
    }

    #[test]
    fn empty_table_renders_header_only() {
        let text = render_signal_table(&[]);
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn positions_tape_includes_close_msg() {
        let pos = Position {
            code: "SHFE.RB".into(),
            signal: SignalType::FirstBuy,
            side: Side::Long,
            open_price: 100.0,
            amount: 10.0,
            capital: 1000.0,
            stop_loss: Some(97.0),
            open_datetime: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            close_datetime: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap()
                .into(),
            close_price: Some(104.0),
            profit_rate: 3.88,
            max_profit_rate: 5.1,
            max_loss_rate: -0.4,
            open_msg: "entry".into(),
            close_msg: "1buy stop loss".into(),
            info: BTreeMap::new(),
        };
        let text = render_positions(&[&pos]);
        assert!(text.contains("SHFE.RB"));
        assert!(text.contains("1buy stop loss"));
        assert!(text.contains("104.00"));
    }

    #[test]
    fn write_produces_full_report_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        TextReportAdapter
            .write(&sample_summary(), &sample_rows(), &[], &path)
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("=== Backtest Summary ==="));
        assert!(content.contains("=== Signal Results ==="));
        assert!(content.contains("=== Closed Positions ==="));
    }
}
