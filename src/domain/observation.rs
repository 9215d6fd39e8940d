//! Timestamped price observations (ticks).

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceObservation {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub price: f64,
}

impl PriceObservation {
    pub fn new(timestamp: NaiveDateTime, symbol: impl Into<String>, price: f64) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            price,
        }
    }
}

/// Stable sort by timestamp; ties keep their input order.
pub fn sort_by_time(observations: &mut [PriceObservation]) {
    observations.sort_by_key(|o| o.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 20)
            .unwrap()
            .and_hms_opt(14, minute, 0)
            .unwrap()
    }

    #[test]
    fn new_observation_fields() {
        let obs = PriceObservation::new(at(30), "AAPL", 172.5);
        assert_eq!(obs.timestamp, at(30));
        assert_eq!(obs.symbol, "AAPL");
        assert!((obs.price - 172.5).abs() < f64::EPSILON);
    }

    #[test]
    fn sort_is_stable_for_equal_timestamps() {
        let mut data = vec![
            PriceObservation::new(at(31), "MSFT", 1.0),
            PriceObservation::new(at(30), "AAPL", 2.0),
            PriceObservation::new(at(31), "AAPL", 3.0),
            PriceObservation::new(at(30), "MSFT", 4.0),
        ];
        sort_by_time(&mut data);

        let prices: Vec<f64> = data.iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![2.0, 4.0, 1.0, 3.0]);
    }
}
