//! Report generation port.

use crate::domain::backtest::BacktestReport;
use crate::domain::error::TicktraderError;
use crate::domain::metrics::Analysis;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(
        &self,
        report: &BacktestReport,
        analysis: &Analysis,
        output_path: &str,
    ) -> Result<(), TicktraderError>;
}
