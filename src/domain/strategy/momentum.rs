//! Lookback momentum.
//!
//! change = (now - past) / past over `lookback` observations. Buys when the
//! change reaches `+threshold_pct`, sells (position-aware) at `-threshold_pct`.

use super::{PriceWindow, Strategy, exit_quantity};
use crate::domain::error::StrategyError;
use crate::domain::observation::PriceObservation;
use crate::domain::order::TradeIntent;
use crate::domain::position::PositionLedger;

#[derive(Debug, Clone)]
pub struct Momentum {
    name: String,
    symbol: String,
    threshold_pct: f64,
    trade_qty: i64,
    prices: PriceWindow,
}

impl Momentum {
    pub fn new(
        symbol: impl Into<String>,
        lookback: usize,
        threshold_pct: f64,
        trade_qty: i64,
    ) -> Result<Self, StrategyError> {
        if lookback < 1 {
            return Err(StrategyError::new("lookback must be >= 1"));
        }
        if threshold_pct.is_nan() || threshold_pct < 0.0 {
            return Err(StrategyError::new("threshold_pct must be >= 0"));
        }
        if trade_qty < 1 {
            return Err(StrategyError::new("trade_qty must be >= 1"));
        }
        let symbol = symbol.into();
        Ok(Self {
            name: format!("Momentum({symbol} {lookback})"),
            symbol,
            threshold_pct,
            trade_qty,
            prices: PriceWindow::new(lookback + 1),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Strategy for Momentum {
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
        self.prices.push(observation.price);
        if !self.prices.is_full() {
            return Ok(Vec::new());
        }

        let (Some(past), Some(now)) = (self.prices.oldest(), self.prices.newest()) else {
            return Ok(Vec::new());
        };
        if past <= 0.0 {
            return Ok(Vec::new());
        }

        let change = (now - past) / past;
        let mut out = Vec::new();
        if change >= self.threshold_pct {
            out.push(TradeIntent::buy(&self.symbol, self.trade_qty).at(now));
        } else if change <= -self.threshold_pct {
            let qty = exit_quantity(self.trade_qty, positions, &self.symbol);
            if qty > 0 {
                out.push(TradeIntent::sell(&self.symbol, qty).at(now));
            }
        }
        Ok(out)
    }
}
