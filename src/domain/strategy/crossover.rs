//! Moving-average crossover.
//!
//! Buys when the short SMA crosses above the long SMA, sells (position-aware)
//! when it crosses below. Nothing is emitted until the long window is full.

use super::{PriceWindow, Strategy, exit_quantity};
use crate::domain::error::StrategyError;
use crate::domain::observation::PriceObservation;
use crate::domain::order::TradeIntent;
use crate::domain::position::PositionLedger;

#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    name: String,
    symbol: String,
    short_window: usize,
    trade_qty: i64,
    prices: PriceWindow,
    prev_diff: Option<f64>,
}

impl MovingAverageCrossover {
    pub fn new(
        symbol: impl Into<String>,
        short_window: usize,
        long_window: usize,
        trade_qty: i64,
    ) -> Result<Self, StrategyError> {
        if short_window < 1 || short_window >= long_window {
            return Err(StrategyError::new(
                "require 1 <= short_window < long_window",
            ));
        }
        if trade_qty < 1 {
            return Err(StrategyError::new("trade_qty must be >= 1"));
        }
        let symbol = symbol.into();
        Ok(Self {
            name: format!("MovingAverageCrossover({symbol} {short_window}/{long_window})"),
            symbol,
            short_window,
            trade_qty,
            prices: PriceWindow::new(long_window),
            prev_diff: None,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &mut self,
        observation: &PriceObservation,
        positions: &PositionLedger,
    ) -> Result<Vec<TradeIntent>, StrategyError> {
        if observation.symbol != self.symbol {
            return Ok(Vec::new());
        }
        let price = observation.price;
        self.prices.push(price);
        if !self.prices.is_full() {
            return Ok(Vec::new());
        }

        let short_ma = self.prices.mean_of_last(self.short_window);
        let long_ma = self.prices.mean_of_last(self.prices.len());
        let diff = short_ma - long_ma;

        let mut out = Vec::new();
        if let Some(prev) = self.prev_diff {
            if prev <= 0.0 && diff > 0.0 {
                out.push(TradeIntent::buy(&self.symbol, self.trade_qty).at(price));
            } else if prev >= 0.0 && diff < 0.0 {
                let qty = exit_quantity(self.trade_qty, positions, &self.symbol);
                if qty > 0 {
                    out.push(TradeIntent::sell(&self.symbol, qty).at(price));
                }
            }
        }
        self.prev_diff = Some(diff);
        Ok(out)
    }
}
