//! Price data access port.

use crate::domain::error::TicktraderError;
use crate::domain::observation::PriceObservation;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Every observation of the source, in source order.
    fn fetch_observations(&self) -> Result<Vec<PriceObservation>, TicktraderError>;

    /// Distinct symbols, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, TicktraderError>;

    /// First timestamp, last timestamp and observation count for `symbol`.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TicktraderError>;
}
