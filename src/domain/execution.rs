//! Fill simulation with injected venue failures.
//!
//! Every order draws exactly one uniform sample from a [`RandomSource`]. A
//! sample below the configured failure rate rejects the order; anything else
//! fills it at its stated price with no slippage.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::ExecutionError;
use super::order::{Order, OrderStatus};
use super::position::PositionLedger;

pub const DEFAULT_FAILURE_RATE: f64 = 0.03;

/// Source of uniform samples in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl RandomSource for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.gen_range(0.0..1.0)
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct ConstantSource(pub f64);

impl RandomSource for ConstantSource {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Replays a fixed list of samples, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    samples: Vec<f64>,
    next: usize,
}

impl SequenceSource {
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples, next: 0 }
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        if self.samples.is_empty() {
            return 1.0;
        }
        let sample = self.samples[self.next % self.samples.len()];
        self.next += 1;
        sample
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub failure_rate: f64,
    pub seed: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            failure_rate: DEFAULT_FAILURE_RATE,
            seed: None,
        }
    }
}

pub struct ExecutionSimulator {
    failure_rate: f64,
    source: Box<dyn RandomSource>,
}

impl ExecutionSimulator {
    /// Seeded from `config.seed`, or from OS entropy when unset.
    pub fn from_config(config: &ExecutionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_source(config.failure_rate, Box::new(rng))
    }

    pub fn with_source(failure_rate: f64, source: Box<dyn RandomSource>) -> Self {
        Self {
            failure_rate,
            source,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// Execute a `NEW` order in place.
    ///
    /// On success the status becomes `FILLED` and the fill is applied to the
    /// ledger. On a simulated outage the status becomes `REJECTED` and the
    /// ledger is untouched.
    pub fn execute(
        &mut self,
        order: &mut Order,
        ledger: &mut PositionLedger,
    ) -> Result<(), ExecutionError> {
        if order.status != OrderStatus::New {
            return Err(ExecutionError::NotNew(order.status));
        }

        if self.source.next_unit() < self.failure_rate {
            order.status = OrderStatus::Rejected;
            return Err(ExecutionError::VenueOutage);
        }

        order.status = OrderStatus::Filled;
        ledger.apply_fill(order);
        Ok(())
    }
}

impl std::fmt::Debug for ExecutionSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSimulator")
            .field("failure_rate", &self.failure_rate)
            .finish_non_exhaustive()
    }
}
