#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use ticktrader::domain::backtest::{BacktestEngine, BacktestReport};
use ticktrader::domain::error::{StrategyError, TicktraderError};
use ticktrader::domain::execution::{ConstantSource, ExecutionSimulator};
use ticktrader::domain::metrics::Analysis;
pub use ticktrader::domain::observation::PriceObservation;
use ticktrader::domain::order::TradeIntent;
use ticktrader::domain::position::PositionLedger;
use ticktrader::domain::strategy::Strategy;
use ticktrader::ports::data_port::DataPort;
use ticktrader::ports::report_port::ReportPort;

pub struct MockDataPort {
    pub observations: Vec<PriceObservation>,
    pub error: Option<String>,
    /// Number of port calls that touched the source.
    pub reads: Cell<usize>,
}

impl MockDataPort {
    pub fn new(observations: Vec<PriceObservation>) -> Self {
        Self {
            observations,
            error: None,
            reads: Cell::new(0),
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    fn check(&self) -> Result<(), TicktraderError> {
        self.reads.set(self.reads.get() + 1);
        match &self.error {
            Some(reason) => Err(TicktraderError::Data {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_observations(&self) -> Result<Vec<PriceObservation>, TicktraderError> {
        self.check()?;
        Ok(self.observations.clone())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TicktraderError> {
        self.check()?;
        let symbols: BTreeSet<String> =
            self.observations.iter().map(|o| o.symbol.clone()).collect();
        Ok(symbols.into_iter().collect())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TicktraderError> {
        self.check()?;
        let stamps: Vec<NaiveDateTime> = self
            .observations
            .iter()
            .filter(|o| o.symbol == symbol)
            .map(|o| o.timestamp)
            .collect();
        match (stamps.iter().min(), stamps.iter().max()) {
            (Some(&min), Some(&max)) => Ok(Some((min, max, stamps.len()))),
            _ => Ok(None),
        }
    }
}

/// Captures every write instead of touching the filesystem.
pub struct MockReportPort {
    pub written: RefCell<Vec<(String, BacktestReport, f64)>>,
}

impl MockReportPort {
    pub fn new() -> Self {
        Self {
            written: RefCell::new(Vec::new()),
        }
    }

    pub fn write_count(&self) -> usize {
        self.written.borrow().len()
    }
}

impl ReportPort for MockReportPort {
    fn write(
        &self,
        report: &BacktestReport,
        analysis: &Analysis,
        output_path: &str,
    ) -> Result<(), TicktraderError> {
        self.written.borrow_mut().push((
            output_path.to_string(),
            report.clone(),
            analysis.final_equity(),
        ));
        Ok(())
    }
}

pub fn ts(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 20)
        .unwrap()
        .and_hms_opt(14, minute, 0)
        .unwrap()
}

pub fn obs(minute: u32, symbol: &str, price: f64) -> PriceObservation {
    PriceObservation::new(ts(minute), symbol, price)
}

pub fn prices(symbol: &str, series: &[f64]) -> Vec<PriceObservation> {
    series
        .iter()
        .enumerate()
        .map(|(i, &p)| obs(i as u32, symbol, p))
        .collect()
}

/// Engine whose execution step never fails.
pub fn reliable_engine(strategies: Vec<Box<dyn Strategy>>) -> BacktestEngine {
    BacktestEngine::new(
        strategies,
        ExecutionSimulator::with_source(0.0, Box::new(ConstantSource(0.5))),
    )
}

/// Engine whose execution step always fails.
pub fn outage_engine(strategies: Vec<Box<dyn Strategy>>) -> BacktestEngine {
    BacktestEngine::new(
        strategies,
        ExecutionSimulator::with_source(1.0, Box::new(ConstantSource(0.5))),
    )
}

/// Buys one share on the first drop, then sells everything on the next
/// rise, then stops trading. A dip buyer that re-entered on every drop would
/// log a third order on the 100/99/101/98 sequence.
pub struct SingleRoundTripDipBuyer {
    symbol: String,
    last_price: Option<f64>,
    done: bool,
}

impl SingleRoundTripDipBuyer {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            last_price: None,
            done: false,
        }
    }
}

impl Strategy for SingleRoundTripDipBuyer {
    fn name(&self) -> &str {
        "SingleRoundTripDipBuyer"
    }

    fn generate(
        &mut self,
        observation: &PriceObservation,
        positions: &PositionLedger,
    ) -> Result<Vec<TradeIntent>, StrategyError> {
        if observation.symbol != self.symbol {
            return Ok(Vec::new());
        }
        let previous = self.last_price.replace(observation.price);
        let (Some(previous), false) = (previous, self.done) else {
            return Ok(Vec::new());
        };

        let held = positions.quantity(&self.symbol);
        if observation.price < previous && held == 0 {
            return Ok(vec![TradeIntent::buy(self.symbol.as_str(), 1)]);
        }
        if observation.price > previous && held > 0 {
            self.done = true;
            return Ok(vec![TradeIntent::sell(self.symbol.as_str(), held)]);
        }
        Ok(Vec::new())
    }
}

pub struct AlwaysFails;

impl Strategy for AlwaysFails {
    fn name(&self) -> &str {
        "AlwaysFails"
    }

    fn generate(
        &mut self,
        _observation: &PriceObservation,
        _positions: &PositionLedger,
    ) -> Result<Vec<TradeIntent>, StrategyError> {
        Err(StrategyError::new("indicator buffer corrupted"))
    }
}

/// Emits the same intents on every observation of its symbol.
pub struct FixedIntents {
    pub symbol: String,
    pub intents: Vec<TradeIntent>,
}

impl FixedIntents {
    pub fn new(symbol: &str, intents: Vec<TradeIntent>) -> Self {
        Self {
            symbol: symbol.to_string(),
            intents,
        }
    }
}

impl Strategy for FixedIntents {
    fn name(&self) -> &str {
        "FixedIntents"
    }

    fn generate(
        &mut self,
        observation: &PriceObservation,
        _positions: &PositionLedger,
    ) -> Result<Vec<TradeIntent>, StrategyError> {
        if observation.symbol == self.symbol {
            Ok(self.intents.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

/// Net filled quantity per symbol, clipped at zero the way the ledger clips
/// oversells.
pub fn net_filled_quantities(report: &BacktestReport) -> HashMap<String, i64> {
    let mut net: HashMap<String, i64> = HashMap::new();
    for order in report.filled_orders() {
        let held = net.entry(order.symbol.clone()).or_insert(0);
        *held = match order.side {
            ticktrader::domain::order::Side::Buy => *held + order.quantity,
            ticktrader::domain::order::Side::Sell => (*held - order.quantity).max(0),
        };
    }
    net
}

pub const SAMPLE_CSV: &str = "timestamp,symbol,price\n\
    2025-09-20T14:00:00,AAPL,100.0\n\
    2025-09-20T14:00:00,MSFT,300.0\n\
    2025-09-20T14:01:00,AAPL,101.0\n\
    2025-09-20T14:01:00,MSFT,299.0\n\
    2025-09-20T14:02:00,AAPL,102.0\n\
    2025-09-20T14:02:00,MSFT,297.0\n\
    2025-09-20T14:03:00,AAPL,104.0\n\
    2025-09-20T14:03:00,MSFT,296.0\n\
    2025-09-20T14:04:00,AAPL,103.0\n\
    2025-09-20T14:04:00,MSFT,298.0\n\
    2025-09-20T14:05:00,AAPL,99.0\n\
    2025-09-20T14:05:00,MSFT,301.0\n\
    2025-09-20T14:06:00,AAPL,97.0\n\
    2025-09-20T14:06:00,MSFT,304.0\n\
    2025-09-20T14:07:00,AAPL,98.0\n\
    2025-09-20T14:07:00,MSFT,306.0\n\
    2025-09-20T14:08:00,AAPL,101.0\n\
    2025-09-20T14:08:00,MSFT,303.0\n\
    2025-09-20T14:09:00,AAPL,105.0\n\
    2025-09-20T14:09:00,MSFT,300.0\n\
    2025-09-20T14:10:00,AAPL,107.0\n\
    2025-09-20T14:10:00,MSFT,298.0\n\
    2025-09-20T14:11:00,AAPL,106.0\n\
    2025-09-20T14:11:00,MSFT,295.0\n";
