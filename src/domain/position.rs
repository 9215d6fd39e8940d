//! Per-symbol positions and the position ledger.
//!
//! The ledger is the only owner of live position state. Strategies get a
//! shared reference; only the execution simulator applies fills.

use std::collections::BTreeMap;

use serde::Serialize;

use super::order::{Order, OrderStatus, Side};

/// Net long holding and weighted-average cost for one symbol.
///
/// `average_cost` is zero whenever `quantity` is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub quantity: i64,
    pub average_cost: f64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity as f64 * self.average_cost
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.average_cost)
    }

    /// Apply a fill of `quantity` at `price`. Returns the quantity actually
    /// applied, which is smaller than requested when a sell is clipped.
    pub fn apply(&mut self, side: Side, quantity: i64, price: f64) -> i64 {
        match side {
            Side::Buy => {
                let new_qty = self.quantity + quantity;
                if new_qty > 0 {
                    self.average_cost = (self.average_cost * self.quantity as f64
                        + price * quantity as f64)
                        / new_qty as f64;
                }
                self.quantity = new_qty;
                quantity
            }
            Side::Sell => {
                let sell_qty = quantity.min(self.quantity);
                self.quantity -= sell_qty;
                if self.quantity == 0 {
                    self.average_cost = 0.0;
                }
                sell_qty
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionLedger {
    positions: BTreeMap<String, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position, or a zero position for an unseen symbol.
    pub fn get(&self, symbol: &str) -> Position {
        self.positions.get(symbol).copied().unwrap_or_default()
    }

    pub fn quantity(&self, symbol: &str) -> i64 {
        self.get(symbol).quantity
    }

    /// Apply a filled order. Sells beyond the held quantity are clipped;
    /// the return value is the quantity actually applied. Orders that are
    /// not `FILLED` leave the ledger untouched.
    pub fn apply_fill(&mut self, order: &Order) -> i64 {
        if order.status != OrderStatus::Filled {
            tracing::debug!(
                symbol = %order.symbol,
                status = %order.status,
                "ignoring non-filled order"
            );
            return 0;
        }

        let position = self.positions.entry(order.symbol.clone()).or_default();
        let applied = position.apply(order.side, order.quantity, order.price);
        if applied < order.quantity {
            tracing::debug!(
                symbol = %order.symbol,
                requested = order.quantity,
                applied,
                "sell clipped to held quantity"
            );
        }
        applied
    }

    /// Symbols that have ever been filled, in symbol order.
    pub fn positions(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions.iter().map(|(s, p)| (s.as_str(), p))
    }

    pub fn snapshot(&self) -> BTreeMap<String, Position> {
        self.positions.clone()
    }

    pub fn total_cost_basis(&self) -> f64 {
        self.positions.values().map(Position::cost_basis).sum()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn filled(side: Side, quantity: i64, price: f64) -> Order {
        Order {
            side,
            symbol: "AAPL".into(),
            quantity,
            price,
            timestamp: NaiveDate::from_ymd_opt(2025, 9, 20)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            status: OrderStatus::Filled,
        }
    }

    #[test]
    fn unknown_symbol_is_zero_position() {
        let ledger = PositionLedger::new();
        assert_eq!(ledger.get("XYZ"), Position::default());
        assert!(ledger.is_empty());
    }

    #[test]
    fn buys_average_the_cost() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(&filled(Side::Buy, 10, 100.0));
        ledger.apply_fill(&filled(Side::Buy, 30, 120.0));

        let pos = ledger.get("AAPL");
        assert_eq!(pos.quantity, 40);
        assert!((pos.average_cost - 115.0).abs() < 1e-9);
    }

    #[test]
    fn partial_sell_keeps_average_cost() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(&filled(Side::Buy, 10, 100.0));
        let applied = ledger.apply_fill(&filled(Side::Sell, 4, 130.0));

        assert_eq!(applied, 4);
        let pos = ledger.get("AAPL");
        assert_eq!(pos.quantity, 6);
        assert!((pos.average_cost - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_sell_resets_average_cost() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(&filled(Side::Buy, 5, 100.0));
        ledger.apply_fill(&filled(Side::Sell, 5, 90.0));

        let pos = ledger.get("AAPL");
        assert!(pos.is_flat());
        assert_eq!(pos.average_cost, 0.0);
    }

    #[test]
    fn oversell_is_clipped() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(&filled(Side::Buy, 3, 100.0));
        let applied = ledger.apply_fill(&filled(Side::Sell, 10, 105.0));

        assert_eq!(applied, 3);
        assert_eq!(ledger.quantity("AAPL"), 0);
        assert_eq!(ledger.get("AAPL").average_cost, 0.0);
    }

    #[test]
    fn sell_without_holding_creates_flat_entry() {
        let mut ledger = PositionLedger::new();
        let applied = ledger.apply_fill(&filled(Side::Sell, 2, 50.0));

        assert_eq!(applied, 0);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("AAPL"), Position::default());
    }

    #[test]
    fn rejected_order_is_ignored() {
        let mut ledger = PositionLedger::new();
        let mut order = filled(Side::Buy, 5, 100.0);
        order.status = OrderStatus::Rejected;

        assert_eq!(ledger.apply_fill(&order), 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn position_valuation_helpers() {
        let pos = Position {
            quantity: 100,
            average_cost: 50.0,
        };
        assert!((pos.cost_basis() - 5000.0).abs() < f64::EPSILON);
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(45.0) - (-500.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_is_sorted_by_symbol() {
        let mut ledger = PositionLedger::new();
        let mut msft = filled(Side::Buy, 1, 300.0);
        msft.symbol = "MSFT".into();
        ledger.apply_fill(&msft);
        ledger.apply_fill(&filled(Side::Buy, 2, 100.0));

        let symbols: Vec<&str> = ledger.positions().map(|(s, _)| s).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
        assert!((ledger.total_cost_basis() - 500.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn buy_sequence_average_is_weighted_mean(
            fills in prop::collection::vec((1i64..1_000, 1.0f64..1_000.0), 1..30)
        ) {
            let mut ledger = PositionLedger::new();
            for &(qty, price) in &fills {
                ledger.apply_fill(&filled(Side::Buy, qty, price));
            }

            let total_qty: i64 = fills.iter().map(|(q, _)| q).sum();
            let weighted: f64 = fills.iter().map(|&(q, p)| q as f64 * p).sum::<f64>()
                / total_qty as f64;

            let pos = ledger.get("AAPL");
            prop_assert_eq!(pos.quantity, total_qty);
            prop_assert!((pos.average_cost - weighted).abs() <= 1e-6 * weighted.max(1.0));
        }

        #[test]
        fn quantity_never_negative(
            fills in prop::collection::vec((any::<bool>(), 1i64..50, 1.0f64..200.0), 0..40)
        ) {
            let mut ledger = PositionLedger::new();
            for &(is_buy, qty, price) in &fills {
                let side = if is_buy { Side::Buy } else { Side::Sell };
                ledger.apply_fill(&filled(side, qty, price));

                let pos = ledger.get("AAPL");
                prop_assert!(pos.quantity >= 0);
                if pos.quantity == 0 {
                    prop_assert_eq!(pos.average_cost, 0.0);
                }
            }
        }
    }
}
