//! Markdown report adapter implementing ReportPort.
//!
//! Renders metrics tables, an ASCII equity curve, returns statistics, final
//! positions and an error summary.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::domain::backtest::{BacktestReport, ErrorSource};
use crate::domain::error::TicktraderError;
use crate::domain::metrics::{Analysis, PerformanceMetrics, SymbolResult};
use crate::ports::report_port::ReportPort;

const CHART_WIDTH: usize = 80;
const CHART_HEIGHT: usize = 20;

pub struct MarkdownReportAdapter;

impl MarkdownReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for MarkdownReportAdapter {
    fn write(
        &self,
        report: &BacktestReport,
        analysis: &Analysis,
        output_path: &str,
    ) -> Result<(), TicktraderError> {
        let content = render(report, analysis);
        if let Some(parent) = Path::new(output_path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output_path, content)?;
        tracing::info!(path = output_path, "report written");
        Ok(())
    }
}

pub fn render(report: &BacktestReport, analysis: &Analysis) -> String {
    let m = &analysis.metrics;
    let mut output = String::new();

    output.push_str(&render_header());
    output.push_str(&render_summary(report, analysis));
    output.push_str(&render_metrics_table(m));
    output.push_str(&render_trade_statistics(m));
    output.push_str(&render_risk_table(m));
    output.push_str(&render_equity_curve(analysis));
    output.push_str(&render_returns_analysis(&analysis.returns));
    output.push_str(&render_symbol_summary(&analysis.symbol_results));
    output.push_str(&render_positions(report));
    output.push_str(&render_error_summary(report));
    output.push_str(&render_interpretation(m));
    output.push_str(&render_recommendations(m, report.errors.len()));

    output
}

fn render_header() -> String {
    String::from("# Performance Report\n\n---\n\n")
}

fn fmt_currency(value: f64) -> String {
    if value >= 0.0 {
        format!("${:.2}", value)
    } else {
        format!("-${:.2}", value.abs())
    }
}

fn fmt_pct(value: f64, precision: usize) -> String {
    format!("{:.*}%", precision, value * 100.0)
}

fn fmt_ratio(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.2}", value)
    }
}

fn render_summary(report: &BacktestReport, analysis: &Analysis) -> String {
    let filled = report.filled_orders().count();
    let rejected = report.rejected_count();
    format!(
        "## Executive Summary\n\n\
         The strategies generated {} orders ({} filled, {} rejected) and {} closed trades, \
         with a final portfolio value of {} (starting from {}).\n\n",
        report.orders.len(),
        filled,
        rejected,
        analysis.metrics.total_trades,
        fmt_currency(analysis.final_equity()),
        fmt_currency(analysis.initial_capital),
    )
}

fn render_metrics_table(m: &PerformanceMetrics) -> String {
    let mut output = String::from("## Key Performance Metrics\n\n");
    output.push_str("| Metric | Value |\n| --- | --- |\n");
    output.push_str(&format!("| Total Return | {} |\n", fmt_pct(m.total_return, 2)));
    output.push_str(&format!(
        "| Annualized Return | {} |\n",
        fmt_pct(m.annualized_return, 2)
    ));
    output.push_str(&format!("| Sharpe Ratio | {:.3} |\n", m.sharpe_ratio));
    output.push_str(&format!("| Maximum Drawdown | {} |\n", fmt_pct(m.max_drawdown, 2)));
    output.push_str(&format!(
        "| Volatility (Annualized) | {} |\n",
        fmt_pct(m.volatility, 2)
    ));
    output.push_str(&format!("| Win Rate | {} |\n", fmt_pct(m.win_rate, 2)));
    output.push_str(&format!("| Profit Factor | {} |\n", fmt_ratio(m.profit_factor)));
    output.push_str(&format!("| Total Trades | {} |\n", m.total_trades));
    output.push('\n');
    output
}

fn render_trade_statistics(m: &PerformanceMetrics) -> String {
    let mut output = String::from("## Trade Statistics\n\n");
    output.push_str("| Statistic | Value |\n| --- | --- |\n");
    output.push_str(&format!("| Winning Trades | {} |\n", m.winning_trades));
    output.push_str(&format!("| Losing Trades | {} |\n", m.losing_trades));
    output.push_str(&format!("| Average Win | {} |\n", fmt_currency(m.avg_win)));
    output.push_str(&format!("| Average Loss | {} |\n", fmt_currency(m.avg_loss)));
    output.push_str(&format!("| Largest Win | {} |\n", fmt_currency(m.largest_win)));
    output.push_str(&format!("| Largest Loss | {} |\n", fmt_currency(m.largest_loss)));
    output.push('\n');
    output
}

fn render_risk_table(m: &PerformanceMetrics) -> String {
    let mut output = String::from("## Risk Analysis\n\n");
    output.push_str("| Risk Metric | Value |\n| --- | --- |\n");
    output.push_str(&format!("| Maximum Drawdown | {} |\n", fmt_pct(m.max_drawdown, 2)));
    output.push_str(&format!(
        "| Max DD Duration | {} periods |\n",
        m.max_drawdown_duration
    ));
    output.push_str(&format!("| Volatility | {} |\n", fmt_pct(m.volatility, 2)));
    output.push_str(&format!("| Sharpe Ratio | {:.3} |\n", m.sharpe_ratio));
    output.push('\n');
    output
}

fn render_equity_curve(analysis: &Analysis) -> String {
    let values = analysis.values();
    if values.is_empty() {
        return String::from("## Equity Curve\n\nNo portfolio data available for equity curve.\n\n");
    }
    format!(
        "## Equity Curve\n\n```\n{}\n```\n\n",
        ascii_equity_curve(&values, analysis.initial_capital, CHART_WIDTH, CHART_HEIGHT)
    )
}

/// Plot `values` on a `width` x `height` character grid, joining consecutive
/// points with straight segments.
pub fn ascii_equity_curve(values: &[f64], initial_capital: f64, width: usize, height: usize) -> String {
    let Some(&last) = values.last() else {
        return "No data available for equity curve".to_string();
    };
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if range == 0.0 || width < 2 || height < 2 {
        return "No variation in portfolio value".to_string();
    }

    let w = width as i64;
    let h = height as i64;
    let x_of = |i: usize| -> i64 {
        if values.len() > 1 {
            ((i as f64 / (values.len() - 1) as f64) * (w - 1) as f64) as i64
        } else {
            w / 2
        }
    };
    let y_of = |v: f64| -> i64 { (((v - min) / range) * (h - 1) as f64) as i64 };

    let mut grid = vec![vec![' '; width]; height];
    let mut plot = |x: i64, y: i64| {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            grid[(h - 1 - y) as usize][x as usize] = '*';
        }
    };

    for (i, &v) in values.iter().enumerate() {
        plot(x_of(i), y_of(v));
    }
    for i in 0..values.len().saturating_sub(1) {
        let (x1, x2) = (x_of(i), x_of(i + 1));
        let (y1, y2) = (y_of(values[i]), y_of(values[i + 1]));
        let steps = (x2 - x1).abs().max((y2 - y1).abs());
        if steps == 0 {
            continue;
        }
        for step in 0..=steps {
            let x = x1 + ((x2 - x1) * step).div_euclid(steps);
            let y = y1 + ((y2 - y1) * step).div_euclid(steps);
            plot(x, y);
        }
    }

    for row in grid.iter_mut() {
        row[0] = '|';
    }
    for cell in grid[height - 1].iter_mut() {
        *cell = '-';
    }

    let mut output = format!(
        "Equity Curve ({} - {})\n",
        fmt_currency(min),
        fmt_currency(max)
    );
    let lines: Vec<String> = grid.into_iter().map(|row| row.into_iter().collect()).collect();
    output.push_str(&lines.join("\n"));
    output.push_str(&format!(
        "\nInitial: {} | Final: {}",
        fmt_currency(initial_capital),
        fmt_currency(last)
    ));
    output
}

fn render_returns_analysis(returns: &[f64]) -> String {
    if returns.is_empty() {
        return String::new();
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let stdev = if returns.len() > 1 {
        (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let min = returns.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = returns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let mut output = String::from("## Returns Analysis\n\n**Periodic Returns Statistics:**\n\n");
    output.push_str(&format!("- **Mean Return:** {}\n", fmt_pct(mean, 4)));
    output.push_str(&format!("- **Median Return:** {}\n", fmt_pct(median(returns), 4)));
    output.push_str(&format!("- **Standard Deviation:** {}\n", fmt_pct(stdev, 4)));
    output.push_str(&format!("- **Min Return:** {}\n", fmt_pct(min, 4)));
    output.push_str(&format!("- **Max Return:** {}\n", fmt_pct(max, 4)));
    output.push('\n');
    output
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn render_symbol_summary(results: &[SymbolResult]) -> String {
    if results.is_empty() {
        return String::new();
    }
    let mut output = String::from("## Per-Symbol Summary\n\n");
    output.push_str("| Symbol | Trades | Wins | Losses | Win Rate | Total PnL | Largest Win | Largest Loss |\n");
    output.push_str("| --- | --- | --- | --- | --- | --- | --- | --- |\n");
    for r in results {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            r.symbol,
            r.total_trades,
            r.winning_trades,
            r.losing_trades,
            fmt_pct(r.win_rate, 1),
            fmt_currency(r.total_pnl),
            fmt_currency(r.largest_win),
            fmt_currency(r.largest_loss),
        ));
    }
    output.push('\n');
    output
}

fn render_positions(report: &BacktestReport) -> String {
    let mut output = String::from("## Final Positions\n\n");
    if report.positions.is_empty() {
        output.push_str("No positions held at end of backtest.\n\n");
        return output;
    }
    output.push_str("| Symbol | Quantity | Average Price | Cost Basis |\n");
    output.push_str("| --- | --- | --- | --- |\n");
    for (symbol, position) in &report.positions {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            symbol,
            position.quantity,
            fmt_currency(position.average_cost),
            fmt_currency(position.cost_basis()),
        ));
    }
    output.push('\n');
    output
}

fn render_error_summary(report: &BacktestReport) -> String {
    if report.errors.is_empty() {
        return String::new();
    }
    let mut by_source: BTreeMap<ErrorSource, usize> = BTreeMap::new();
    for record in &report.errors {
        *by_source.entry(record.source).or_default() += 1;
    }

    let mut output = String::from("## Error Analysis\n\n");
    output.push_str(&format!("**Total Errors:** {}\n\n**Error Summary:**\n", report.errors.len()));
    for (source, count) in by_source {
        output.push_str(&format!("- {}: {}\n", source, count));
    }
    output.push('\n');
    output
}

fn render_interpretation(m: &PerformanceMetrics) -> String {
    let mut text = String::from("## Performance Interpretation\n\n");

    text.push_str(if m.total_return > 0.1 {
        "The strategy demonstrates **strong positive performance** with significant returns. "
    } else if m.total_return > 0.0 {
        "The strategy shows **modest positive performance** with small but positive returns. "
    } else {
        "The strategy shows **negative or flat performance** over the backtest period. "
    });

    text.push_str(if m.sharpe_ratio > 1.0 {
        "The **Sharpe ratio is excellent**, indicating strong risk-adjusted returns. "
    } else if m.sharpe_ratio > 0.5 {
        "The **Sharpe ratio is good**, showing decent risk-adjusted performance. "
    } else {
        "The **Sharpe ratio is poor**, suggesting weak risk-adjusted returns. "
    });

    text.push_str(if m.max_drawdown < 0.1 {
        "**Maximum drawdown is low**. "
    } else if m.max_drawdown < 0.2 {
        "**Maximum drawdown is moderate**. "
    } else {
        "**Maximum drawdown is high**, indicating significant risk exposure. "
    });

    text.push_str(if m.win_rate > 0.6 {
        "The **win rate is high**."
    } else if m.win_rate > 0.4 {
        "The **win rate is moderate**."
    } else {
        "The **win rate is low**."
    });
    text.push_str("\n\n");

    text.push_str(if m.profit_factor > 2.0 {
        "**Profit factor is excellent** (>2.0). "
    } else if m.profit_factor > 1.5 {
        "**Profit factor is good** (>1.5). "
    } else if m.profit_factor > 1.0 {
        "**Profit factor is positive** (>1.0). "
    } else {
        "**Profit factor is poor** (<=1.0), losses match or exceed gains. "
    });

    if m.total_trades < 10 {
        text.push_str("**Low trade frequency** limits the statistical significance of these results.");
    } else if m.total_trades > 100 {
        text.push_str("**High trade frequency** gives a reasonable sample size.");
    }
    text.push_str("\n\n");
    text
}

fn render_recommendations(m: &PerformanceMetrics, error_count: usize) -> String {
    let mut items: Vec<&str> = Vec::new();

    if m.total_return < 0.0 {
        items.push("**Consider strategy revision**: returns are negative.");
    }
    if m.sharpe_ratio < 0.5 {
        items.push("**Improve risk-adjusted returns**: the Sharpe ratio is low.");
    }
    if m.max_drawdown > 0.2 {
        items.push("**Implement better risk controls**: maximum drawdown exceeds 20%.");
    }
    if m.win_rate < 0.4 {
        items.push("**Review signal quality**: fewer than 40% of trades win.");
    }
    if m.profit_factor < 1.2 {
        items.push("**Optimize trade management**: the profit factor is below 1.2.");
    }
    if error_count > 0 {
        items.push("**Address execution errors**: the error log is not empty.");
    }
    if m.total_trades < 20 {
        items.push("**Extend backtest period**: fewer than 20 closed trades.");
    }
    if items.is_empty() {
        items.push("**No issues flagged** by the checks above.");
    }

    let mut output = String::from("## Recommendations\n\n");
    for item in items {
        output.push_str(&format!("- {}\n", item));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::ErrorRecord;
    use crate::domain::order::{Order, OrderStatus, Side};
    use crate::domain::position::Position;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 20)
            .unwrap()
            .and_hms_opt(14, minute, 0)
            .unwrap()
    }

    fn order(minute: u32, side: Side, qty: i64, price: f64, status: OrderStatus) -> Order {
        Order {
            side,
            symbol: "AAPL".to_string(),
            quantity: qty,
            price,
            timestamp: ts(minute),
            status,
        }
    }

    fn sample_report() -> BacktestReport {
        let mut positions = BTreeMap::new();
        positions.insert(
            "AAPL".to_string(),
            Position {
                quantity: 2,
                average_cost: 105.0,
            },
        );
        BacktestReport {
            positions,
            orders: vec![
                order(0, Side::Buy, 2, 100.0, OrderStatus::Filled),
                order(1, Side::Sell, 2, 110.0, OrderStatus::Filled),
                order(2, Side::Buy, 2, 105.0, OrderStatus::Filled),
                order(3, Side::Buy, 1, 104.0, OrderStatus::Rejected),
            ],
            errors: vec![ErrorRecord {
                timestamp: ts(3),
                source: ErrorSource::Execution,
                origin: "AAPL".to_string(),
                message: "AAPL BUY x1: EXECUTION ERROR: simulated venue outage".to_string(),
            }],
        }
    }

    fn empty_report() -> BacktestReport {
        BacktestReport {
            positions: BTreeMap::new(),
            orders: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn fmt_currency_negative() {
        assert_eq!(fmt_currency(-12.5), "-$12.50");
        assert_eq!(fmt_currency(3.0), "$3.00");
    }

    #[test]
    fn fmt_ratio_handles_infinity() {
        assert_eq!(fmt_ratio(f64::INFINITY), "inf");
        assert_eq!(fmt_ratio(1.234), "1.23");
    }

    #[test]
    fn median_of_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn ascii_curve_flat_series() {
        let out = ascii_equity_curve(&[100.0, 100.0], 100.0, 80, 20);
        assert_eq!(out, "No variation in portfolio value");
    }

    #[test]
    fn ascii_curve_dimensions_and_labels() {
        let out = ascii_equity_curve(&[100.0, 120.0, 90.0], 100.0, 40, 10);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "Equity Curve ($90.00 - $120.00)");
        assert!(lines[1..11].iter().all(|l| l.chars().count() == 40));
        assert!(lines[1..11].iter().all(|l| l.starts_with('|') || l.starts_with('-')));
        assert_eq!(lines[10], "-".repeat(40));
        assert_eq!(lines[11], "Initial: $100.00 | Final: $90.00");
        assert!(lines[1].contains('*'));
    }

    #[test]
    fn render_full_report_sections() {
        let report = sample_report();
        let analysis = Analysis::compute(&report, 10_000.0, 0.02);
        let out = render(&report, &analysis);

        assert!(out.starts_with("# Performance Report"));
        assert!(out.contains("## Key Performance Metrics"));
        assert!(out.contains("## Trade Statistics"));
        assert!(out.contains("## Risk Analysis"));
        assert!(out.contains("## Equity Curve\n\n```\nEquity Curve"));
        assert!(out.contains("## Returns Analysis"));
        assert!(out.contains("| AAPL | 1 | 1 | 0 | 100.0% | $20.00 |"));
        assert!(out.contains("| AAPL | 2 | $105.00 | $210.00 |"));
        assert!(out.contains("**Total Errors:** 1"));
        assert!(out.contains("- EXECUTION ERROR: 1"));
        assert!(out.contains("| Profit Factor | inf |"));
        assert!(out.contains("## Recommendations"));
        assert!(out.contains("4 orders (3 filled, 1 rejected)"));
    }

    #[test]
    fn render_empty_report() {
        let report = empty_report();
        let analysis = Analysis::compute(&report, 10_000.0, 0.02);
        let out = render(&report, &analysis);

        assert!(out.contains("No portfolio data available for equity curve."));
        assert!(out.contains("No positions held at end of backtest."));
        assert!(!out.contains("## Returns Analysis"));
        assert!(!out.contains("## Error Analysis"));
        assert!(out.contains("final portfolio value of $10000.00"));
    }

    #[test]
    fn write_creates_file_and_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("performance.md");
        let report = sample_report();
        let analysis = Analysis::compute(&report, 10_000.0, 0.02);

        MarkdownReportAdapter::new()
            .write(&report, &analysis, path.to_str().unwrap())
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Performance Report"));
    }
}
