//! Domain error types.
//!
//! `OrderError`, `ExecutionError` and `StrategyError` are recoverable inside the
//! backtest driver. `TicktraderError` covers the outer surfaces (config, data,
//! report output) and maps onto process exit codes.

/// A trade intent that cannot become a well-formed order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("invalid side: {0:?}")]
    InvalidSide(String),

    #[error("quantity must be > 0, got {0}")]
    NonPositiveQuantity(i64),

    #[error("price must be > 0, got {0}")]
    NonPositivePrice(f64),

    #[error("symbol is required")]
    MissingSymbol,
}

/// Failure while executing a validated order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("simulated venue outage")]
    VenueOutage,

    #[error("order is already {0}, only NEW orders can be executed")]
    NotNew(crate::domain::order::OrderStatus),
}

/// Any failure raised by a strategy while generating signals.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct StrategyError {
    pub message: String,
}

impl StrategyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Top-level error type for ticktrader.
#[derive(Debug, thiserror::Error)]
pub enum TicktraderError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no observations loaded from {source_name}")]
    NoData { source_name: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TicktraderError> for std::process::ExitCode {
    fn from(err: &TicktraderError) -> Self {
        let code: u8 = match err {
            TicktraderError::Io(_) | TicktraderError::Json(_) => 1,
            TicktraderError::ConfigParse { .. }
            | TicktraderError::ConfigMissing { .. }
            | TicktraderError::ConfigInvalid { .. } => 2,
            TicktraderError::Data { .. } => 3,
            TicktraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
