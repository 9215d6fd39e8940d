//! Backtest driver and event loop.
//!
//! Per observation: every strategy generates intents against the live ledger,
//! each intent is validated into an order, each order is executed and logged.
//! Failures are recorded in the error log and never abort the run.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::error::{ExecutionError, OrderError, StrategyError};
use super::execution::{DEFAULT_FAILURE_RATE, ExecutionConfig, ExecutionSimulator};
use super::observation::{PriceObservation, sort_by_time};
use super::order::{Order, OrderStatus, TradeIntent, create_order};
use super::position::{Position, PositionLedger};
use super::strategy::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub risk_free_rate: f64,
    pub failure_rate: f64,
    pub seed: Option<u64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            risk_free_rate: 0.02,
            failure_rate: DEFAULT_FAILURE_RATE,
            seed: None,
        }
    }
}

impl BacktestConfig {
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            failure_rate: self.failure_rate,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Strategy,
    Order,
    Execution,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSource::Strategy => write!(f, "STRATEGY ERROR"),
            ErrorSource::Order => write!(f, "ORDER ERROR"),
            ErrorSource::Execution => write!(f, "EXECUTION ERROR"),
        }
    }
}

/// One entry of the error log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub source: ErrorSource,
    /// Strategy name for strategy errors, symbol otherwise.
    pub origin: String,
    pub message: String,
}

impl ErrorRecord {
    fn strategy(timestamp: NaiveDateTime, name: &str, err: &StrategyError) -> Self {
        Self {
            timestamp,
            source: ErrorSource::Strategy,
            origin: name.to_string(),
            message: format!("Strategy {name} error: {err}"),
        }
    }

    fn order(timestamp: NaiveDateTime, intent: &TradeIntent, err: &OrderError) -> Self {
        Self {
            timestamp,
            source: ErrorSource::Order,
            origin: intent.symbol.clone(),
            message: format!(
                "{} {} x{}: {}: {err}",
                intent.symbol,
                intent.action,
                intent.quantity,
                ErrorSource::Order
            ),
        }
    }

    fn execution(order: &Order, err: &ExecutionError) -> Self {
        Self {
            timestamp: order.timestamp,
            source: ErrorSource::Execution,
            origin: order.symbol.clone(),
            message: format!(
                "{} {} x{}: {}: {err}",
                order.symbol,
                order.side,
                order.quantity,
                ErrorSource::Execution
            ),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp, self.message)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub ticks_processed: usize,
    pub orders_filled: usize,
    pub orders_rejected: usize,
    pub invalid_intents: usize,
    pub strategy_errors: usize,
}

impl RunStats {
    pub fn orders_logged(&self) -> usize {
        self.orders_filled + self.orders_rejected
    }
}

/// Immutable snapshot of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub positions: BTreeMap<String, Position>,
    pub orders: Vec<Order>,
    pub errors: Vec<ErrorRecord>,
}

impl BacktestReport {
    pub fn filled_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Filled)
    }

    pub fn rejected_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Rejected)
            .count()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

pub struct BacktestEngine {
    strategies: Vec<Box<dyn Strategy>>,
    ledger: PositionLedger,
    executor: ExecutionSimulator,
    order_log: Vec<Order>,
    error_log: Vec<ErrorRecord>,
    stats: RunStats,
}

impl BacktestEngine {
    pub fn new(strategies: Vec<Box<dyn Strategy>>, executor: ExecutionSimulator) -> Self {
        Self {
            strategies,
            ledger: PositionLedger::new(),
            executor,
            order_log: Vec::new(),
            error_log: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn from_config(strategies: Vec<Box<dyn Strategy>>, config: &BacktestConfig) -> Self {
        Self::new(
            strategies,
            ExecutionSimulator::from_config(&config.execution_config()),
        )
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Process one observation through every strategy.
    pub fn on_tick(&mut self, observation: &PriceObservation) {
        let Self {
            strategies,
            ledger,
            executor,
            order_log,
            error_log,
            stats,
        } = self;
        stats.ticks_processed += 1;

        for strategy in strategies.iter_mut() {
            let intents = match strategy.generate(observation, ledger) {
                Ok(intents) => intents,
                Err(e) => {
                    let record = ErrorRecord::strategy(observation.timestamp, strategy.name(), &e);
                    tracing::warn!(strategy = strategy.name(), error = %e, "strategy failed");
                    error_log.push(record);
                    stats.strategy_errors += 1;
                    continue;
                }
            };

            for intent in &intents {
                let mut order = match create_order(intent, observation) {
                    Ok(order) => order,
                    Err(e) => {
                        tracing::warn!(symbol = %intent.symbol, error = %e, "intent rejected");
                        error_log.push(ErrorRecord::order(observation.timestamp, intent, &e));
                        stats.invalid_intents += 1;
                        continue;
                    }
                };

                match executor.execute(&mut order, ledger) {
                    Ok(()) => {
                        tracing::debug!(
                            symbol = %order.symbol,
                            side = %order.side,
                            quantity = order.quantity,
                            price = order.price,
                            "order filled"
                        );
                        stats.orders_filled += 1;
                    }
                    Err(e) => {
                        if !order.status.is_terminal() {
                            order.status = OrderStatus::Rejected;
                        }
                        tracing::warn!(symbol = %order.symbol, error = %e, "order rejected");
                        error_log.push(ErrorRecord::execution(&order, &e));
                        stats.orders_rejected += 1;
                    }
                }
                order_log.push(order);
            }
        }
    }

    /// Sort by timestamp (ties keep input order) and process every observation.
    pub fn run(&mut self, mut observations: Vec<PriceObservation>) {
        sort_by_time(&mut observations);
        for observation in &observations {
            self.on_tick(observation);
        }
        tracing::info!(
            ticks = self.stats.ticks_processed,
            filled = self.stats.orders_filled,
            rejected = self.stats.orders_rejected,
            invalid_intents = self.stats.invalid_intents,
            strategy_errors = self.stats.strategy_errors,
            "backtest complete"
        );
    }

    pub fn report(&self) -> BacktestReport {
        BacktestReport {
            positions: self.ledger.snapshot(),
            orders: self.order_log.clone(),
            errors: self.error_log.clone(),
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn order_log(&self) -> &[Order] {
        &self.order_log
    }

    pub fn error_log(&self) -> &[ErrorRecord] {
        &self.error_log
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }
}
