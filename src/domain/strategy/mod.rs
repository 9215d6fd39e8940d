//! Signal generators.
//!
//! A strategy sees every observation of the run, in time order, together with
//! a read-only view of the live ledger. It keeps its own rolling state and
//! returns zero or more intents per observation.

pub mod crossover;
pub mod momentum;

use std::collections::VecDeque;

pub use crossover::MovingAverageCrossover;
pub use momentum::Momentum;

use super::error::StrategyError;
use super::observation::PriceObservation;
use super::order::TradeIntent;
use super::position::PositionLedger;

pub trait Strategy {
    /// Identity used in error records.
    fn name(&self) -> &str;

    fn generate(
        &mut self,
        observation: &PriceObservation,
        positions: &PositionLedger,
    ) -> Result<Vec<TradeIntent>, StrategyError>;
}

/// Fixed-capacity price buffer; the oldest price is evicted on overflow.
#[derive(Debug, Clone)]
pub(crate) struct PriceWindow {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, price: f64) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.prices.len() == self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.prices.len()
    }

    pub(crate) fn oldest(&self) -> Option<f64> {
        self.prices.front().copied()
    }

    pub(crate) fn newest(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    /// Mean of the most recent `n` prices (all of them if fewer).
    pub(crate) fn mean_of_last(&self, n: usize) -> f64 {
        let n = n.min(self.prices.len());
        if n == 0 {
            return 0.0;
        }
        self.prices.iter().rev().take(n).sum::<f64>() / n as f64
    }
}

/// Quantity to sell: never more than held, nothing when flat.
pub(crate) fn exit_quantity(trade_qty: i64, positions: &PositionLedger, symbol: &str) -> i64 {
    trade_qty.min(positions.quantity(symbol)).max(0)
}
