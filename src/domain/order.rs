//! Trade intents, orders and the order factory.
//!
//! A strategy emits [`TradeIntent`]s. [`create_order`] validates an intent
//! against its originating observation and returns a `NEW` [`Order`], or an
//! [`OrderError`] naming the first rule that failed. Validation is stateless:
//! selling more than is held is not a validation failure.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::error::OrderError;
use super::observation::PriceObservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(OrderError::InvalidSide(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Filled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::New)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// What a strategy would like to trade. `price: None` means "at the
/// observation price".
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub action: String,
    pub symbol: String,
    pub quantity: i64,
    pub price: Option<f64>,
}

impl TradeIntent {
    pub fn new(action: impl Into<String>, symbol: impl Into<String>, quantity: i64) -> Self {
        Self {
            action: action.into(),
            symbol: symbol.into(),
            quantity,
            price: None,
        }
    }

    pub fn buy(symbol: impl Into<String>, quantity: i64) -> Self {
        Self::new("BUY", symbol, quantity)
    }

    pub fn sell(symbol: impl Into<String>, quantity: i64) -> Self {
        Self::new("SELL", symbol, quantity)
    }

    pub fn at(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub side: Side,
    pub symbol: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(rename = "time")]
    pub timestamp: NaiveDateTime,
    pub status: OrderStatus,
}

impl Order {
    /// Gross value at the order price.
    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// Validate an intent and build a `NEW` order from it.
///
/// Rules are checked in order: side, quantity, price, symbol.
pub fn create_order(
    intent: &TradeIntent,
    observation: &PriceObservation,
) -> Result<Order, OrderError> {
    let side: Side = intent.action.parse()?;

    if intent.quantity <= 0 {
        return Err(OrderError::NonPositiveQuantity(intent.quantity));
    }

    let price = intent.price.unwrap_or(observation.price);
    if !price.is_finite() || price <= 0.0 {
        return Err(OrderError::NonPositivePrice(price));
    }

    if intent.symbol.trim().is_empty() {
        return Err(OrderError::MissingSymbol);
    }

    Ok(Order {
        side,
        symbol: intent.symbol.clone(),
        quantity: intent.quantity,
        price,
        timestamp: observation.timestamp,
        status: OrderStatus::New,
    })
}
