//! Static CSV price history, used when the live source is unavailable.
//!
//! Expects a header row with a `Date` column and a `Close` column. Without a
//! `Close` column the last numeric column is used. When a `Symbol` column is
//! present and any row matches the requested symbol, only those rows are kept.
//! An optional `Volume` column is attached to each point.

use crate::domain::errors::ForecastError;
use crate::domain::market::{PricePoint, PriceSeries};
use crate::domain::ports::PriceDataService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%m/%d/%Y"];

pub struct CsvPriceService {
    path: PathBuf,
}

impl CsvPriceService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, symbol: &str) -> Result<PriceSeries> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open price CSV {}", self.path.display()))?;
        let series = parse_closes(file, symbol)?;
        info!(
            "CsvPriceService: Loaded {} closes from {}",
            series.len(),
            self.path.display()
        );
        Ok(series)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // Accept a trailing time component ("2024-01-02 00:00:00")
    let day = raw.trim().split([' ', 'T']).next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn parse_closes<R: Read>(reader: R, symbol: &str) -> Result<PriceSeries> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().context("Price CSV has no header row")?.clone();
    let records: Vec<csv::StringRecord> = rdr
        .records()
        .collect::<std::result::Result<_, _>>()
        .context("Failed to read price CSV records")?;

    let date_idx = find_column(&headers, "Date").context("Price CSV has no Date column")?;
    let volume_idx = find_column(&headers, "Volume");
    let close_idx = match find_column(&headers, "Close") {
        Some(idx) => idx,
        None => {
            let first = records.first().context("Price CSV has no rows")?;
            let idx = (0..headers.len())
                .rev()
                .filter(|idx| *idx != date_idx && Some(*idx) != volume_idx)
                .find(|idx| first.get(*idx).is_some_and(|v| v.trim().parse::<f64>().is_ok()))
                .context("Price CSV has no numeric column")?;
            warn!(
                "CsvPriceService: No Close column, using '{}'",
                headers.get(idx).unwrap_or_default()
            );
            idx
        }
    };

    let symbol_idx = find_column(&headers, "Symbol");
    let matches_symbol = |record: &csv::StringRecord| match symbol_idx {
        Some(idx) => record.get(idx).is_some_and(|s| s.trim() == symbol),
        None => true,
    };
    let filter_by_symbol = symbol_idx.is_some() && records.iter().any(matches_symbol);

    let points = records
        .iter()
        .filter(|record| !filter_by_symbol || matches_symbol(*record))
        .filter_map(|record| {
            let date = parse_date(record.get(date_idx)?)?;
            let close = record.get(close_idx)?.trim().parse::<f64>().ok()?;
            if !close.is_finite() {
                return None;
            }
            let point = PricePoint::new(date, close);
            let volume = volume_idx
                .and_then(|idx| record.get(idx))
                .and_then(|v| v.trim().parse::<f64>().ok());
            Some(match volume {
                Some(volume) if volume.is_finite() => point.with_volume(volume),
                _ => point,
            })
        })
        .collect();

    Ok(PriceSeries::from_unordered(points))
}

#[async_trait]
impl PriceDataService for CsvPriceService {
    /// Returns the whole file: the bundled dataset is static and usually ends before
    /// the requested range, so the range is not applied.
    async fn fetch_closes(
        &self,
        symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError> {
        let loader = CsvPriceService::new(self.path.clone());
        let symbol_owned = symbol.to_string();
        tokio::task::spawn_blocking(move || loader.load(&symbol_owned))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r)
            .map_err(|e| ForecastError::DataUnavailable {
                source_name: self.name().to_string(),
                reason: format!("{:#}", e),
            })
    }

    fn name(&self) -> &str {
        "csv"
    }
}
