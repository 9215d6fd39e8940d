//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod metrics;
pub mod observation;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod strategy;
