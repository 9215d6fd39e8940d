//! Portfolio reconstruction from a completed order log.
//!
//! Replays FILLED orders against a private ledger, independent of the live
//! one, and records `cash + Σ quantity * average_cost` after every fill.
//! Open positions are valued at cost, not marked to market.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::order::{Order, OrderStatus, Side};
use super::position::PositionLedger;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: PositionLedger,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: PositionLedger::new(),
            equity_curve: Vec::new(),
        }
    }

    /// Replay `orders` from `initial_capital`.
    ///
    /// Orders are stably sorted by timestamp; non-FILLED orders are skipped.
    /// When the log is non-empty the curve starts with a point at the initial
    /// capital, stamped with the earliest order time.
    pub fn reconstruct(orders: &[Order], initial_capital: f64) -> Self {
        let mut portfolio = Portfolio::new(initial_capital);
        let mut sorted: Vec<&Order> = orders.iter().collect();
        sorted.sort_by_key(|o| o.timestamp);

        let Some(first) = sorted.first() else {
            return portfolio;
        };
        portfolio.record_equity(first.timestamp, initial_capital);

        for order in sorted {
            if order.status != OrderStatus::Filled {
                continue;
            }
            portfolio.apply(order);
        }
        portfolio
    }

    fn apply(&mut self, order: &Order) {
        let applied = self.positions.apply_fill(order);
        match order.side {
            Side::Buy => self.cash -= order.quantity as f64 * order.price,
            Side::Sell => self.cash += applied as f64 * order.price,
        }
        let equity = self.total_equity();
        self.record_equity(order.timestamp, equity);
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Cash plus open positions at cost.
    pub fn total_equity(&self) -> f64 {
        self.cash + self.positions.total_cost_basis()
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }

    pub fn values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    pub fn returns(&self) -> Vec<f64> {
        periodic_returns(&self.values())
    }
}

/// Simple returns between consecutive values; pairs whose previous value is
/// exactly zero are skipped.
pub fn periodic_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}
