//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::markdown_report_adapter::MarkdownReportAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestEngine, BacktestReport, RunStats};
use crate::domain::config_validation::{
    DEFAULT_CROSSOVER_QTY, DEFAULT_INITIAL_CAPITAL, DEFAULT_LONG_WINDOW, DEFAULT_LOOKBACK,
    DEFAULT_MOMENTUM_QTY, DEFAULT_RISK_FREE_RATE, DEFAULT_SHORT_WINDOW, DEFAULT_THRESHOLD_PCT,
    validate_backtest_config, validate_strategy_config,
};
use crate::domain::error::TicktraderError;
use crate::domain::execution::DEFAULT_FAILURE_RATE;
use crate::domain::metrics::{Analysis, PerformanceMetrics};
use crate::domain::strategy::{Momentum, MovingAverageCrossover, Strategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_REPORT_PATH: &str = "performance.md";

#[derive(Parser, Debug)]
#[command(name = "ticktrader", about = "Event-driven tick backtester")]
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
        /// Price CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Markdown report path, overrides [report] output
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Seed for the execution failure sampler
        #[arg(long)]
        seed: Option<u64>,
        /// Print the raw report and metrics as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show symbols and data ranges in a price file
    Info {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            seed,
            json,
        } => run_backtest(&config, data.as_ref(), output.as_ref(), seed, json),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data, symbol } => run_info(&data, symbol.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: TicktraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TicktraderError> {
    let seed = match adapter.get_string("backtest", "seed") {
        Some(s) => Some(s.trim().parse::<u64>().map_err(|_| {
            TicktraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "seed".into(),
                reason: "seed must be a non-negative integer".into(),
            }
        })?),
        None => None,
    };

    Ok(BacktestConfig {
        initial_capital: adapter.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE),
        failure_rate: adapter.get_double("backtest", "failure_rate", DEFAULT_FAILURE_RATE),
        seed,
    })
}

/// One crossover and/or one momentum strategy per symbol, in symbol order.
pub fn build_strategies(
    adapter: &dyn ConfigPort,
    symbols: &[String],
) -> Result<Vec<Box<dyn Strategy>>, TicktraderError> {
    let crossover = adapter.get_bool("crossover", "enabled", true);
    let momentum = adapter.get_bool("momentum", "enabled", true);

    let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();
    for symbol in symbols {
        if crossover {
            let short = adapter.get_int("crossover", "short_window", DEFAULT_SHORT_WINDOW);
            let long = adapter.get_int("crossover", "long_window", DEFAULT_LONG_WINDOW);
            let qty = adapter.get_int("crossover", "trade_qty", DEFAULT_CROSSOVER_QTY);
            let strategy = MovingAverageCrossover::new(
                symbol.as_str(),
                to_window(short, "crossover", "short_window")?,
                to_window(long, "crossover", "long_window")?,
                qty,
            )
            .map_err(|e| strategy_invalid("crossover", e))?;
            strategies.push(Box::new(strategy));
        }
        if momentum {
            let lookback = adapter.get_int("momentum", "lookback", DEFAULT_LOOKBACK);
            let threshold = adapter.get_double("momentum", "threshold_pct", DEFAULT_THRESHOLD_PCT);
            let qty = adapter.get_int("momentum", "trade_qty", DEFAULT_MOMENTUM_QTY);
            let strategy = Momentum::new(
                symbol.as_str(),
                to_window(lookback, "momentum", "lookback")?,
                threshold,
                qty,
            )
            .map_err(|e| strategy_invalid("momentum", e))?;
            strategies.push(Box::new(strategy));
        }
    }
    Ok(strategies)
}

fn to_window(value: i64, section: &str, key: &str) -> Result<usize, TicktraderError> {
    usize::try_from(value).map_err(|_| TicktraderError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("must be >= 0, got {value}"),
    })
}

fn strategy_invalid(section: &str, err: crate::domain::error::StrategyError) -> TicktraderError {
    TicktraderError::ConfigInvalid {
        section: section.into(),
        key: "parameters".into(),
        reason: err.to_string(),
    }
}

/// Symbols from `[backtest] symbols`, else every symbol in the data.
pub fn resolve_symbols(config: &dyn ConfigPort, available: &[String]) -> Vec<String> {
    match config.get_list("backtest", "symbols") {
        Some(list) => {
            for symbol in list.iter().filter(|s| !available.contains(s)) {
                tracing::warn!(symbol = %symbol, "configured symbol has no data");
            }
            list
        }
        None => available.to_vec(),
    }
}

pub fn resolve_data_path(
    data_override: Option<&PathBuf>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, TicktraderError> {
    if let Some(p) = data_override {
        return Ok(p.clone());
    }
    config
        .get_string("data", "path")
        .map(PathBuf::from)
        .ok_or_else(|| TicktraderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })
}

pub fn resolve_output_path(output_override: Option<&PathBuf>, config: &dyn ConfigPort) -> PathBuf {
    output_override.cloned().unwrap_or_else(|| {
        config
            .get_string("report", "output")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH))
    })
}

/// Output of a completed pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub report: BacktestReport,
    pub metrics: PerformanceMetrics,
    #[serde(skip)]
    pub analysis: Analysis,
    #[serde(skip)]
    pub stats: RunStats,
}

/// Load data, run the engine, analyze the report and write it through
/// `report_port` when an output path is given.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    config: &dyn ConfigPort,
    bt_config: &BacktestConfig,
    output_path: Option<&Path>,
) -> Result<PipelineOutput, TicktraderError> {
    let observations = data_port.fetch_observations()?;
    if observations.is_empty() {
        return Err(TicktraderError::NoData {
            source_name: "price data".into(),
        });
    }

    let available: Vec<String> = observations
        .iter()
        .map(|o| o.symbol.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let symbols = resolve_symbols(config, &available);
    let strategies = build_strategies(config, &symbols)?;

    eprintln!(
        "Running backtest: {} observations, {} symbols, {} strategies",
        observations.len(),
        symbols.len(),
        strategies.len()
    );

    let mut engine = BacktestEngine::from_config(strategies, bt_config);
    engine.run(observations);
    let report = engine.report();
    let analysis = Analysis::compute(&report, bt_config.initial_capital, bt_config.risk_free_rate);

    if let Some(path) = output_path {
        report_port.write(&report, &analysis, &path.to_string_lossy())?;
    }

    Ok(PipelineOutput {
        metrics: analysis.metrics.clone(),
        report,
        analysis,
        stats: engine.stats(),
    })
}

fn run_backtest(
    config_path: &Path,
    data_override: Option<&PathBuf>,
    output_override: Option<&PathBuf>,
    seed_override: Option<u64>,
    json: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter).and_then(|_| validate_strategy_config(&adapter)) {
        return fail(e);
    }

    let mut bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if seed_override.is_some() {
        bt_config.seed = seed_override;
    }

    let data_path = match resolve_data_path(data_override, &adapter) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let output_path = resolve_output_path(output_override, &adapter);

    eprintln!("Loading data from {}", data_path.display());
    let data_port = CsvAdapter::new(data_path);
    let report_port = MarkdownReportAdapter::new();

    let out = match run_backtest_pipeline(
        &data_port,
        &report_port,
        &adapter,
        &bt_config,
        Some(&output_path),
    ) {
        Ok(out) => out,
        Err(e) => return fail(e),
    };

    print_summary(&out);
    eprintln!("\nReport written to: {}", output_path.display());

    if json {
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{s}"),
            Err(e) => return fail(e.into()),
        }
    }
    ExitCode::SUCCESS
}

fn print_summary(out: &PipelineOutput) {
    let m = &out.metrics;
    eprintln!("\n=== Run ===");
    eprintln!("Ticks:            {}", out.stats.ticks_processed);
    eprintln!("Orders Filled:    {}", out.stats.orders_filled);
    eprintln!("Orders Rejected:  {}", out.stats.orders_rejected);
    eprintln!("Errors Logged:    {}", out.report.errors.len());

    eprintln!("\n=== Aggregate Results ===");
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Volatility:       {:.2}%", m.volatility * 100.0);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);

    if !out.analysis.symbol_results.is_empty() {
        eprintln!("\n=== Per-Symbol Summary ===");
        for r in &out.analysis.symbol_results {
            let pnl_sign = if r.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}${:.2}",
                r.symbol,
                r.total_trades,
                r.win_rate * 100.0,
                pnl_sign,
                r.total_pnl,
            );
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(e);
    }

    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    eprintln!("\nBacktest:");
    eprintln!("  Initial Capital: {:.2}", bt_config.initial_capital);
    eprintln!("  Risk-Free Rate:  {}", bt_config.risk_free_rate);
    eprintln!("  Failure Rate:    {}", bt_config.failure_rate);
    match bt_config.seed {
        Some(seed) => eprintln!("  Seed:            {seed}"),
        None => eprintln!("  Seed:            (entropy)"),
    }
    if let Some(symbols) = adapter.get_list("backtest", "symbols") {
        eprintln!("  Symbols:         {}", symbols.join(", "));
    }
    if let Some(path) = adapter.get_string("data", "path") {
        eprintln!("  Data:            {path}");
    }

    if let Err(e) = build_strategies(&adapter, &["CHECK".to_string()]) {
        return fail(e);
    }
    eprintln!("\nStrategies per symbol:");
    if adapter.get_bool("crossover", "enabled", true) {
        eprintln!(
            "  MovingAverageCrossover {}/{} qty {}",
            adapter.get_int("crossover", "short_window", DEFAULT_SHORT_WINDOW),
            adapter.get_int("crossover", "long_window", DEFAULT_LONG_WINDOW),
            adapter.get_int("crossover", "trade_qty", DEFAULT_CROSSOVER_QTY),
        );
    }
    if adapter.get_bool("momentum", "enabled", true) {
        eprintln!(
            "  Momentum lookback {} threshold {} qty {}",
            adapter.get_int("momentum", "lookback", DEFAULT_LOOKBACK),
            adapter.get_double("momentum", "threshold_pct", DEFAULT_THRESHOLD_PCT),
            adapter.get_int("momentum", "trade_qty", DEFAULT_MOMENTUM_QTY),
        );
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(data_path: &Path, symbol: Option<&str>) -> ExitCode {
    let adapter = CsvAdapter::new(data_path.to_path_buf());

    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => match adapter.list_symbols() {
            Ok(s) => s,
            Err(e) => return fail(e),
        },
    };

    if symbols.is_empty() {
        return fail(TicktraderError::NoData {
            source_name: data_path.display().to_string(),
        });
    }

    for s in &symbols {
        match adapter.get_data_range(s) {
            Ok(Some((first, last, count))) => {
                println!("{}: {} observations, {} to {}", s, count, first, last);
            }
            Ok(None) => eprintln!("{}: no data found", s),
            Err(e) => return fail(e),
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn cli_parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "ticktrader", "backtest", "--config", "c.ini", "--data", "d.csv", "--seed", "9",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest {
                config,
                data,
                output,
                seed,
                json,
            } => {
                assert_eq!(config, PathBuf::from("c.ini"));
                assert_eq!(data, Some(PathBuf::from("d.csv")));
                assert_eq!(output, None);
                assert_eq!(seed, Some(9));
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["ticktrader"]).is_err());
    }

    #[test]
    fn build_backtest_config_defaults() {
        let config = build_backtest_config(&make_config("")).unwrap();
        assert_eq!(config, BacktestConfig::default());
    }

    #[test]
    fn build_backtest_config_reads_values() {
        let config = build_backtest_config(&make_config(
            "[backtest]\ninitial_capital = 5000\nrisk_free_rate = 0.01\nfailure_rate = 0\nseed = 11\n",
        ))
        .unwrap();
        assert_eq!(config.initial_capital, 5000.0);
        assert_eq!(config.risk_free_rate, 0.01);
        assert_eq!(config.failure_rate, 0.0);
        assert_eq!(config.seed, Some(11));
    }

    #[test]
    fn build_backtest_config_rejects_bad_seed() {
        let err = build_backtest_config(&make_config("[backtest]\nseed = x\n")).unwrap_err();
        assert!(matches!(err, TicktraderError::ConfigInvalid { key, .. } if key == "seed"));
    }

    #[test]
    fn build_strategies_two_per_symbol_by_default() {
        let symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
        let strategies = build_strategies(&make_config(""), &symbols).unwrap();
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "MovingAverageCrossover(AAPL 3/8)",
                "Momentum(AAPL 5)",
                "MovingAverageCrossover(MSFT 3/8)",
                "Momentum(MSFT 5)",
            ]
        );
    }

    #[test]
    fn build_strategies_with_huge_lookback_does_not_panic() {
        let config = make_config(
            "[crossover]\nenabled = false\n[momentum]\nlookback = 4000000000000000000\n",
        );
        assert!(validate_strategy_config(&config).is_err());
        let strategies = build_strategies(&config, &["AAPL".to_string()]).unwrap();
        assert_eq!(strategies.len(), 1);
    }

    #[test]
    fn build_strategies_respects_enabled_flags() {
        let symbols = vec!["AAPL".to_string()];
        let strategies =
            build_strategies(&make_config("[momentum]\nenabled = false\n"), &symbols).unwrap();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].name(), "MovingAverageCrossover(AAPL 3/8)");
    }

    #[test]
    fn build_strategies_rejects_bad_windows() {
        let symbols = vec!["AAPL".to_string()];
        let err = build_strategies(
            &make_config("[crossover]\nshort_window = 5\nlong_window = 2\n"),
            &symbols,
        );
        assert!(matches!(err, Err(TicktraderError::ConfigInvalid { .. })));
        let err = build_strategies(&make_config("[momentum]\nlookback = -1\n"), &symbols);
        assert!(matches!(err, Err(TicktraderError::ConfigInvalid { .. })));
    }

    #[test]
    fn resolve_symbols_prefers_config() {
        let available = vec!["AAPL".to_string(), "MSFT".to_string()];
        assert_eq!(resolve_symbols(&make_config(""), &available), available);
        assert_eq!(
            resolve_symbols(&make_config("[backtest]\nsymbols = MSFT\n"), &available),
            vec!["MSFT".to_string()]
        );
    }

    #[test]
    fn resolve_paths() {
        let config = make_config("[data]\npath = ticks.csv\n[report]\noutput = out.md\n");
        assert_eq!(
            resolve_data_path(None, &config).unwrap(),
            PathBuf::from("ticks.csv")
        );
        let over = PathBuf::from("other.csv");
        assert_eq!(resolve_data_path(Some(&over), &config).unwrap(), over);
        assert_eq!(resolve_output_path(None, &config), PathBuf::from("out.md"));
        assert_eq!(
            resolve_output_path(None, &make_config("")),
            PathBuf::from(DEFAULT_REPORT_PATH)
        );
        assert!(matches!(
            resolve_data_path(None, &make_config("")),
            Err(TicktraderError::ConfigMissing { .. })
        ));
    }
}
