use crate::domain::errors::ForecastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily close, with the traded volume when the source reports one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Ordered daily closes with strictly increasing dates.
///
/// Gaps (weekends, holidays) are allowed; duplicates and out-of-order dates are not.
/// Prices are expected to be strictly positive: the windowing step divides by them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, ForecastError> {
        if let Some(pair) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(ForecastError::InvalidSeries {
                reason: format!(
                    "dates must be strictly increasing ({} followed by {})",
                    pair[0].date, pair[1].date
                ),
            });
        }
        Ok(Self { points })
    }

    /// Sorts by date and keeps the last close seen for each date.
    /// Used by adapters whose sources may repeat rows.
    pub fn from_unordered(mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Volumes, only when every point carries one
    pub fn volumes(&self) -> Option<Vec<f64>> {
        self.points.iter().map(|p| p.volume).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_rejects_duplicate_dates() {
        let result = PriceSeries::new(vec![
            PricePoint::new(day(1), 100.0),
            PricePoint::new(day(1), 101.0),
        ]);
        assert!(matches!(result, Err(ForecastError::InvalidSeries { .. })));
    }

    #[test]
    fn test_rejects_decreasing_dates() {
        let result = PriceSeries::new(vec![
            PricePoint::new(day(3), 100.0),
            PricePoint::new(day(2), 101.0),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_accepts_gaps() {
        let series = PriceSeries::new(vec![
            PricePoint::new(day(1), 100.0),
            PricePoint::new(day(4), 101.0),
            PricePoint::new(day(5), 102.0),
        ])
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![100.0, 101.0, 102.0]);
        assert_eq!(series.last().unwrap().date, day(5));
    }

    #[test]
    fn test_from_unordered_sorts_and_keeps_latest_duplicate() {
        let series = PriceSeries::from_unordered(vec![
            PricePoint::new(day(2), 102.0),
            PricePoint::new(day(1), 100.0),
            PricePoint::new(day(2), 103.0),
        ]);
        assert_eq!(series.closes(), vec![100.0, 103.0]);
    }

    #[test]
    fn test_volumes_require_every_point() {
        let full = PriceSeries::new(vec![
            PricePoint::new(day(1), 100.0).with_volume(5_000.0),
            PricePoint::new(day(2), 101.0).with_volume(7_000.0),
        ])
        .unwrap();
        assert_eq!(full.volumes(), Some(vec![5_000.0, 7_000.0]));

        let partial = PriceSeries::new(vec![
            PricePoint::new(day(1), 100.0).with_volume(5_000.0),
            PricePoint::new(day(2), 101.0),
        ])
        .unwrap();
        assert_eq!(partial.volumes(), None);
    }
}
