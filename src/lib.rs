//! ticktrader: event-driven tick backtester.
//!
//! Observations flow through strategies into validated orders, simulated
//! fills and a position ledger; the resulting order log is replayed into a
//! value series and performance metrics. Hexagonal layout: domain logic in
//! [`domain`], port traits in [`ports`], concrete implementations in
//! [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
