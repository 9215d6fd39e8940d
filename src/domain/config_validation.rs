//! Configuration validation.
//!
//! Validates all config fields before a backtest runs. Absent keys fall back
//! to the same defaults the CLI uses, so only present-but-wrong values fail.

use crate::domain::error::TicktraderError;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
pub const DEFAULT_SHORT_WINDOW: i64 = 3;
pub const DEFAULT_LONG_WINDOW: i64 = 8;
pub const DEFAULT_CROSSOVER_QTY: i64 = 2;
pub const DEFAULT_LOOKBACK: i64 = 5;
pub const DEFAULT_THRESHOLD_PCT: f64 = 0.01;
pub const DEFAULT_MOMENTUM_QTY: i64 = 1;
/// Upper bound for any rolling window length.
pub const MAX_WINDOW: i64 = 100_000;

fn invalid(section: &str, key: &str, reason: &str) -> TicktraderError {
    TicktraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    validate_initial_capital(config)?;
    validate_risk_free_rate(config)?;
    validate_failure_rate(config)?;
    validate_seed(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let crossover = config.get_bool("crossover", "enabled", true);
    let momentum = config.get_bool("momentum", "enabled", true);
    if !crossover && !momentum {
        return Err(invalid(
            "crossover",
            "enabled",
            "at least one of [crossover] or [momentum] must be enabled",
        ));
    }
    if crossover {
        validate_crossover(config)?;
    }
    if momentum {
        validate_momentum(config)?;
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let value = config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be a positive finite number",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let value = config.get_double("backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_failure_rate(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let value = config.get_double(
        "backtest",
        "failure_rate",
        crate::domain::execution::DEFAULT_FAILURE_RATE,
    );
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "failure_rate",
            "failure_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_seed(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    match config.get_string("backtest", "seed") {
        Some(s) if s.trim().parse::<u64>().is_err() => Err(invalid(
            "backtest",
            "seed",
            "seed must be a non-negative integer",
        )),
        _ => Ok(()),
    }
}

fn validate_crossover(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let short = config.get_int("crossover", "short_window", DEFAULT_SHORT_WINDOW);
    let long = config.get_int("crossover", "long_window", DEFAULT_LONG_WINDOW);
    if short < 1 {
        return Err(invalid(
            "crossover",
            "short_window",
            "short_window must be at least 1",
        ));
    }
    if short >= long {
        return Err(invalid(
            "crossover",
            "long_window",
            "long_window must be greater than short_window",
        ));
    }
    if long > MAX_WINDOW {
        return Err(invalid(
            "crossover",
            "long_window",
            &format!("long_window must be at most {MAX_WINDOW}"),
        ));
    }
    let qty = config.get_int("crossover", "trade_qty", DEFAULT_CROSSOVER_QTY);
    if qty < 1 {
        return Err(invalid("crossover", "trade_qty", "trade_qty must be at least 1"));
    }
    Ok(())
}

fn validate_momentum(config: &dyn ConfigPort) -> Result<(), TicktraderError> {
    let lookback = config.get_int("momentum", "lookback", DEFAULT_LOOKBACK);
    if lookback < 1 {
        return Err(invalid("momentum", "lookback", "lookback must be at least 1"));
    }
    if lookback > MAX_WINDOW {
        return Err(invalid(
            "momentum",
            "lookback",
            &format!("lookback must be at most {MAX_WINDOW}"),
        ));
    }
    let threshold = config.get_double("momentum", "threshold_pct", DEFAULT_THRESHOLD_PCT);
    if threshold.is_nan() || threshold < 0.0 {
        return Err(invalid(
            "momentum",
            "threshold_pct",
            "threshold_pct must be non-negative",
        ));
    }
    let qty = config.get_int("momentum", "trade_qty", DEFAULT_MOMENTUM_QTY);
    if qty < 1 {
        return Err(invalid("momentum", "trade_qty", "trade_qty must be at least 1"));
    }
    Ok(())
}
