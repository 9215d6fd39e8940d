//! CSV file data adapter.
//!
//! Reads a file with a `timestamp,symbol,price` header. Rows that cannot be
//! turned into an observation are skipped and reported, never fatal.

use crate::domain::error::TicktraderError;
use crate::domain::observation::PriceObservation;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A data row that was dropped during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingested {
    pub observations: Vec<PriceObservation>,
    pub skipped: Vec<SkippedRow>,
}

pub struct CsvAdapter {
    path: PathBuf,
}

struct Columns {
    timestamp: usize,
    symbol: usize,
    price: usize,
    width: usize,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Parse the whole file, keeping observations in file order.
    pub fn read_all(&self) -> Result<Ingested, TicktraderError> {
        let bytes = fs::read(&self.path).map_err(|e| TicktraderError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        parse_bytes(&bytes)
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse CSV text with a header row into observations.
pub fn parse_observations(content: &str) -> Result<Ingested, TicktraderError> {
    parse_bytes(content.as_bytes())
}

/// Rows that are not valid UTF-8 are skipped like any other malformed row.
fn parse_bytes(bytes: &[u8]) -> Result<Ingested, TicktraderError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers().map_err(|e| TicktraderError::Data {
        reason: format!("CSV header error: {}", e),
    })?;
    let columns = locate_columns(headers)?;

    let mut ingested = Ingested::default();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                skip(&mut ingested, line, format!("unreadable row: {}", e));
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        match parse_record(&record, &columns) {
            Ok(observation) => ingested.observations.push(observation),
            Err(reason) => skip(&mut ingested, line, reason),
        }
    }

    Ok(ingested)
}

fn skip(ingested: &mut Ingested, line: u64, reason: String) {
    tracing::warn!(line, reason = %reason, "skipping row");
    ingested.skipped.push(SkippedRow { line, reason });
}

fn locate_columns(headers: &csv::StringRecord) -> Result<Columns, TicktraderError> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| TicktraderError::Data {
                reason: format!("missing {} column", name),
            })
    };
    Ok(Columns {
        timestamp: find("timestamp")?,
        symbol: find("symbol")?,
        price: find("price")?,
        width: headers.len(),
    })
}

fn parse_record(record: &csv::StringRecord, columns: &Columns) -> Result<PriceObservation, String> {
    if record.len() != columns.width {
        return Err(format!(
            "expected {} columns, found {}",
            columns.width,
            record.len()
        ));
    }

    let raw_ts = record.get(columns.timestamp).unwrap_or_default();
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| format!("invalid timestamp: {:?}", raw_ts))?;

    let symbol = record.get(columns.symbol).unwrap_or_default();
    if symbol.is_empty() {
        return Err("empty symbol".to_string());
    }

    let raw_price = record.get(columns.price).unwrap_or_default();
    let price: f64 = raw_price
        .parse()
        .map_err(|e| format!("invalid price {:?}: {}", raw_price, e))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(format!("price must be > 0, got {}", price));
    }

    Ok(PriceObservation::new(timestamp, symbol, price))
}

impl DataPort for CsvAdapter {
    fn fetch_observations(&self) -> Result<Vec<PriceObservation>, TicktraderError> {
        let ingested = self.read_all()?;
        if !ingested.skipped.is_empty() {
            tracing::info!(
                path = %self.path.display(),
                loaded = ingested.observations.len(),
                skipped = ingested.skipped.len(),
                "loaded observations with skipped rows"
            );
        }
        Ok(ingested.observations)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TicktraderError> {
        let observations = self.read_all()?.observations;
        let symbols: BTreeSet<String> = observations.into_iter().map(|o| o.symbol).collect();
        Ok(symbols.into_iter().collect())
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, TicktraderError> {
        let observations = self.read_all()?.observations;
        let mut stamps = observations
            .iter()
            .filter(|o| o.symbol == symbol)
            .map(|o| o.timestamp);

        let Some(first) = stamps.next() else {
            return Ok(None);
        };
        let (min, max, count) = stamps.fold((first, first, 1usize), |(lo, hi, n), t| {
            (lo.min(t), hi.max(t), n + 1)
        });
        Ok(Some((min, max, count)))
    }
}
