//! Performance metrics and trade statistics.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use super::backtest::BacktestReport;
use super::order::{Order, OrderStatus, Side};
use super::portfolio::{EquityPoint, Portfolio};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub volatility: f64,
    pub win_rate: f64,
    /// `+inf` with wins and no losses; written as `"inf"` when serialized.
    #[serde(serialize_with = "serialize_ratio")]
    pub profit_factor: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_win: f64,
    /// Mean of losing trades; negative or zero.
    pub avg_loss: f64,
    pub largest_win: f64,
    /// Most negative realized trade; negative or zero.
    pub largest_loss: f64,
}

/// Finite values as numbers, non-finite ones as `"inf"`, `"-inf"` or `"nan"`.
pub fn serialize_ratio<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("nan")
    } else if *value > 0.0 {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

/// One realized close of a round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePnl {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub quantity: i64,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolResult {
    pub symbol: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl SymbolResult {
    /// Per-symbol breakdown, sorted by symbol.
    pub fn compute_per_symbol(trades: &[TradePnl]) -> Vec<SymbolResult> {
        let mut by_symbol: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for trade in trades {
            by_symbol.entry(&trade.symbol).or_default().push(trade.pnl);
        }

        by_symbol
            .into_iter()
            .map(|(symbol, pnls)| {
                let stats = TradeStats::from_pnls(&pnls);
                SymbolResult {
                    symbol: symbol.to_string(),
                    total_trades: stats.total_trades,
                    winning_trades: stats.winning_trades,
                    losing_trades: stats.losing_trades,
                    total_pnl: pnls.iter().sum(),
                    win_rate: stats.win_rate,
                    largest_win: stats.largest_win,
                    largest_loss: stats.largest_loss,
                }
            })
            .collect()
    }
}

impl PerformanceMetrics {
    /// Metrics over a reconstructed portfolio and the order log it came from.
    ///
    /// Without any FILLED order every field is zero.
    pub fn compute(portfolio: &Portfolio, orders: &[Order], risk_free_rate: f64) -> Self {
        if !orders.iter().any(|o| o.status == OrderStatus::Filled) {
            return Self::default();
        }

        let equity_curve = &portfolio.equity_curve;
        let initial_capital = portfolio.initial_capital;
        let final_equity = portfolio.final_equity();

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let periods = equity_curve.len() as f64;
        let annualized_return = if initial_capital <= 0.0 || periods == 0.0 {
            0.0
        } else {
            let ratio = final_equity / initial_capital;
            if ratio > 0.0 {
                ratio.powf(TRADING_DAYS_PER_YEAR / periods) - 1.0
            } else {
                -1.0
            }
        };

        let returns = portfolio.returns();
        let volatility = annualized_volatility(&returns);
        let sharpe_ratio = if volatility > 0.0 {
            (annualized_return - risk_free_rate) / volatility
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let trades = realized_trade_pnls(orders);
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let stats = TradeStats::from_pnls(&pnls);

        PerformanceMetrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            max_drawdown,
            max_drawdown_duration,
            volatility,
            win_rate: stats.win_rate,
            profit_factor: stats.profit_factor,
            total_trades: stats.total_trades,
            winning_trades: stats.winning_trades,
            losing_trades: stats.losing_trades,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            largest_win: stats.largest_win,
            largest_loss: stats.largest_loss,
        }
    }
}

/// Everything derived from one backtest report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub initial_capital: f64,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    pub returns: Vec<f64>,
    pub trades: Vec<TradePnl>,
    pub symbol_results: Vec<SymbolResult>,
}

impl Analysis {
    pub fn compute(report: &BacktestReport, initial_capital: f64, risk_free_rate: f64) -> Self {
        let portfolio = Portfolio::reconstruct(&report.orders, initial_capital);
        let metrics = PerformanceMetrics::compute(&portfolio, &report.orders, risk_free_rate);
        let trades = realized_trade_pnls(&report.orders);
        let symbol_results = SymbolResult::compute_per_symbol(&trades);

        tracing::debug!(
            points = portfolio.equity_curve.len(),
            trades = trades.len(),
            "analysis computed"
        );

        Analysis {
            initial_capital,
            metrics,
            returns: portfolio.returns(),
            equity_curve: portfolio.equity_curve,
            trades,
            symbol_results,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    total_trades: usize,
    winning_trades: usize,
    losing_trades: usize,
    win_rate: f64,
    profit_factor: f64,
    avg_win: f64,
    avg_loss: f64,
    largest_win: f64,
    largest_loss: f64,
}

impl TradeStats {
    fn from_pnls(pnls: &[f64]) -> Self {
        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for &pnl in pnls {
            if pnl > 0.0 {
                winning_trades += 1;
                gross_profit += pnl;
                if pnl > largest_win {
                    largest_win = pnl;
                }
            } else if pnl < 0.0 {
                losing_trades += 1;
                gross_loss += pnl.abs();
                if pnl < largest_loss {
                    largest_loss = pnl;
                }
            }
        }

        let total_trades = pnls.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if winning_trades > 0 {
            gross_profit / winning_trades as f64
        } else {
            0.0
        };

        let avg_loss = if losing_trades > 0 {
            -gross_loss / losing_trades as f64
        } else {
            0.0
        };

        TradeStats {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
        }
    }
}

/// Realized P&L of every close, grouped by symbol (symbol order) and in time
/// order within a symbol.
///
/// Each symbol keeps a signed running position with an average entry price.
/// An order against the position closes up to `|position|` units; whatever is
/// left opens or extends exposure in the order's direction.
pub fn realized_trade_pnls(orders: &[Order]) -> Vec<TradePnl> {
    let mut by_symbol: BTreeMap<&str, Vec<&Order>> = BTreeMap::new();
    for order in orders.iter().filter(|o| o.status == OrderStatus::Filled) {
        by_symbol.entry(&order.symbol).or_default().push(order);
    }

    let mut out = Vec::new();
    for (symbol, mut fills) in by_symbol {
        fills.sort_by_key(|o| o.timestamp);

        let mut position = 0i64;
        let mut entry = 0.0_f64;
        for order in fills {
            let direction = match order.side {
                Side::Buy => 1,
                Side::Sell => -1,
            };
            let mut remaining = order.quantity;

            if position != 0 && position.signum() != direction {
                let closed = remaining.min(position.abs());
                let pnl = if position > 0 {
                    (order.price - entry) * closed as f64
                } else {
                    (entry - order.price) * closed as f64
                };
                out.push(TradePnl {
                    symbol: symbol.to_string(),
                    timestamp: order.timestamp,
                    quantity: closed,
                    pnl,
                });
                position += direction * closed;
                if position == 0 {
                    entry = 0.0;
                }
                remaining -= closed;
            }

            if remaining > 0 {
                let new_position = position + direction * remaining;
                entry = (entry * position.abs() as f64 + order.price * remaining as f64)
                    / new_position.abs() as f64;
                position = new_position;
            }
        }
    }
    out
}

/// Sample standard deviation of `returns`, annualized. Zero with fewer than
/// two returns.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown fraction and the longest run of points that are not a
/// new peak. The first point counts toward the run.
pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else {
            if peak > 0.0 {
                let dd = (peak - point.equity) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}
