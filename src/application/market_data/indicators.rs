//! Technical indicators for the historical view
//!
//! Exponential indicators (EMA, MACD, RSI) stream through `ta`; rolling means and
//! sample standard deviations over fixed windows use `statrs`. A value is omitted
//! (None) until its indicator has seen enough points. Volume columns are only
//! produced when every point of the series carries a volume.

use crate::domain::errors::ForecastError;
use crate::domain::market::PriceSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use ta::Next;
use ta::indicators::{
    ExponentialMovingAverage, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
};

const MA_DAYS: [usize; 3] = [10, 50, 100];
const RSI_PERIOD: usize = 14;
const BB_PERIOD: usize = 20;
const BB_STD_MULTIPLIER: f64 = 2.0;
const VOLUME_SMA_PERIOD: usize = 20;

/// Number of trailing points returned by the historical view
pub const HISTORICAL_POINTS: usize = 200;

/// Indicator columns aligned with the input closes
#[derive(Debug, Clone, Default)]
pub struct IndicatorTable {
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl IndicatorTable {
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// Finite indicator values at row `idx`
    pub fn row(&self, idx: usize) -> BTreeMap<String, f64> {
        self.columns
            .iter()
            .filter_map(|(name, values)| {
                values
                    .get(idx)
                    .copied()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .map(|v| (name.clone(), v))
            })
            .collect()
    }

    fn push(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.columns.push((name.into(), values));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: NaiveDate,
    pub price: f64,
    pub index: usize,
    #[serde(flatten)]
    pub indicators: BTreeMap<String, f64>,
}

fn indicator_error(err: ta::errors::TaError) -> ForecastError {
    ForecastError::Indicator {
        reason: format!("{:?}", err),
    }
}

fn rolling<F>(closes: &[f64], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    (0..closes.len())
        .map(|i| (i + 1 >= window).then(|| f(&closes[i + 1 - window..=i])))
        .collect()
}

fn rolling_mean(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(closes, window, |w| w.iter().mean())
}

fn rolling_std(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(closes, window, |w| w.iter().std_dev())
}

fn ema(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, ForecastError> {
    let mut ema = ExponentialMovingAverage::new(period).map_err(indicator_error)?;
    Ok(closes.iter().map(|c| Some(ema.next(*c))).collect())
}

/// Difference against the previous close, None for the first point
fn lagged<F>(closes: &[f64], f: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    std::iter::once(None)
        .chain(closes.windows(2).map(|w| Some(f(w[0], w[1]))))
        .take(closes.len())
        .collect()
}

pub fn compute_indicators(
    closes: &[f64],
    volumes: Option<&[f64]>,
) -> Result<IndicatorTable, ForecastError> {
    let mut table = IndicatorTable::default();

    for days in MA_DAYS {
        table.push(format!("MA_{}_days", days), rolling_mean(closes, days));
    }
    table.push("SMA_20", rolling_mean(closes, 20));
    table.push("SMA_50", rolling_mean(closes, 50));
    table.push("EMA_12", ema(closes, 12)?);
    table.push("EMA_26", ema(closes, 26)?);

    let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(indicator_error)?;
    let macd_out: Vec<_> = closes.iter().map(|c| macd.next(*c)).collect();
    table.push("MACD", macd_out.iter().map(|o| Some(o.macd)).collect());
    table.push("MACD_Signal", macd_out.iter().map(|o| Some(o.signal)).collect());
    table.push(
        "MACD_Histogram",
        macd_out.iter().map(|o| Some(o.histogram)).collect(),
    );

    // RSI needs RSI_PERIOD price changes before it is defined
    let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).map_err(indicator_error)?;
    let rsi_values = closes
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let value = rsi.next(*c);
            (i >= RSI_PERIOD).then_some(value)
        })
        .collect();
    table.push("RSI", rsi_values);

    let middle = rolling_mean(closes, BB_PERIOD);
    let deviation = rolling_std(closes, BB_PERIOD);
    let band = |sign: f64| -> Vec<Option<f64>> {
        middle
            .iter()
            .zip(&deviation)
            .map(|(m, s)| Some((*m)? + sign * BB_STD_MULTIPLIER * (*s)?))
            .collect()
    };
    table.push("BB_Upper", band(1.0));
    table.push("BB_Lower", band(-1.0));
    table.push("BB_Middle", middle.clone());
    table.push(
        "BB_Width",
        deviation
            .iter()
            .map(|s| s.map(|s| 2.0 * BB_STD_MULTIPLIER * s))
            .collect(),
    );

    if let Some(volumes) = volumes {
        let volume_sma = rolling_mean(volumes, VOLUME_SMA_PERIOD);
        let ratio = volumes
            .iter()
            .zip(&volume_sma)
            .map(|(v, sma)| sma.map(|sma| v / sma))
            .collect();
        table.push("Volume_SMA", volume_sma);
        table.push("Volume", volumes.iter().map(|v| Some(*v)).collect());
        table.push("Volume_Ratio", ratio);
    }

    table.push("Daily_Return", lagged(closes, |prev, cur| cur / prev - 1.0));
    let first = closes.first().copied();
    table.push(
        "Cumulative_Return",
        closes
            .iter()
            .map(|c| first.map(|f| c / f - 1.0))
            .collect(),
    );
    table.push("Price_Change", lagged(closes, |prev, cur| cur - prev));
    table.push(
        "Price_Change_Pct",
        lagged(closes, |prev, cur| (cur - prev) / prev * 100.0),
    );

    table.push("Volatility_20", rolling_std(closes, 20));
    table.push("Volatility_50", rolling_std(closes, 50));

    Ok(table)
}

/// The trailing `HISTORICAL_POINTS` closes with every defined indicator attached
pub fn historical_view(
    series: &PriceSeries,
) -> Result<(Vec<HistoricalPoint>, Vec<String>), ForecastError> {
    let closes = series.closes();
    let volumes = series.volumes();
    let table = compute_indicators(&closes, volumes.as_deref())?;

    let skip = series.len().saturating_sub(HISTORICAL_POINTS);
    let points = series
        .points()
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(index, point)| HistoricalPoint {
            date: point.date,
            price: point.close,
            index,
            indicators: table.row(index),
        })
        .collect();

    Ok((points, table.names()))
}
