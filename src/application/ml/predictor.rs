use crate::domain::errors::ForecastError;
use crate::domain::market::PriceSeries;
use crate::domain::ml::{Forecast, ForecastPoint, ModelArtifact};
use chrono::Duration;
use ndarray::Array2;
use std::collections::VecDeque;
use tracing::debug;

/// Autoregressive multi-step forecaster over a trained artifact.
///
/// The last `window_len` closes are scaled with the stored scaler; each step's
/// prediction is appended and the oldest value dropped, so later steps are built
/// on earlier predictions and errors compound.
pub struct Predictor<'a> {
    artifact: &'a ModelArtifact,
}

impl<'a> Predictor<'a> {
    pub fn new(artifact: &'a ModelArtifact) -> Self {
        Self { artifact }
    }

    pub fn from_artifact(artifact: Option<&'a ModelArtifact>) -> Result<Self, ForecastError> {
        artifact.map(Self::new).ok_or(ForecastError::ModelUnavailable)
    }

    pub fn forecast(&self, series: &PriceSeries, horizon: usize) -> Result<Forecast, ForecastError> {
        let window_len = self.artifact.window_len();
        let last = match series.last() {
            Some(point) if series.len() >= window_len => *point,
            _ => {
                // Exactly one window of closes is enough
                return Err(ForecastError::InsufficientHistory {
                    required: window_len.saturating_sub(1),
                    actual: series.len(),
                });
            }
        };

        let closes = series.closes();
        let scaler = &self.artifact.scaler;
        let mut window: VecDeque<f64> = closes[closes.len() - window_len..]
            .iter()
            .map(|price| scaler.transform(*price))
            .collect();

        let mut scaled_predictions = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let input = Array2::from_shape_fn((1, window_len), |(_, j)| window[j]);
            let next = self.artifact.model.predict(&input)[0];
            scaled_predictions.push(next);
            window.pop_front();
            window.push_back(next);
        }

        let prices = scaler.inverse_transform_all(&scaled_predictions);
        let points: Vec<ForecastPoint> = prices
            .into_iter()
            .enumerate()
            .map(|(idx, predicted_price)| ForecastPoint {
                date: last.date + Duration::days(idx as i64 + 1),
                predicted_price,
                day: idx + 1,
            })
            .collect();

        debug!("Forecast {} days from {} ({:.2})", horizon, last.date, last.close);

        Ok(Forecast {
            points,
            current_price: last.close,
            last_date: last.date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::PricePoint;
    use crate::domain::ml::network::{ConvPadding, ForecastModel, ModelConfig};
    use crate::domain::ml::{MinMaxScaler, ModelMetrics, RegressionReport, TrainingHistory};
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn artifact(window_len: usize) -> ModelArtifact {
        let mut rng = StdRng::seed_from_u64(5);
        let model = ForecastModel::new(ModelConfig::new(window_len, ConvPadding::Same), &mut rng).unwrap();
        let report = RegressionReport::evaluate(&[1.0], &[1.0]);
        let metrics = ModelMetrics::from_training(&report, &TrainingHistory::default());
        ModelArtifact::new(model, MinMaxScaler { min: 100.0, max: 200.0 }, metrics)
    }

    fn series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        PriceSeries::new(
            (0..n)
                .map(|i| PricePoint::new(start + Duration::days(i as i64), 120.0 + i as f64))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_artifact_is_model_unavailable() {
        assert!(matches!(
            Predictor::from_artifact(None),
            Err(ForecastError::ModelUnavailable)
        ));
    }

    #[test]
    fn test_forecast_days_and_dates() {
        let artifact = artifact(10);
        let history = series(30);
        let forecast = Predictor::new(&artifact).forecast(&history, 5).unwrap();

        assert_eq!(forecast.horizon(), 5);
        assert_eq!(forecast.current_price, 149.0);
        let last_date = NaiveDate::from_ymd_opt(2024, 3, 30).unwrap();
        assert_eq!(forecast.last_date, last_date);
        for (idx, point) in forecast.points.iter().enumerate() {
            assert_eq!(point.day, idx + 1);
            assert_eq!(point.date, last_date + Duration::days(idx as i64 + 1));
            assert!(point.predicted_price.is_finite());
        }
    }

    #[test]
    fn test_exact_window_is_enough() {
        let artifact = artifact(10);
        assert!(Predictor::new(&artifact).forecast(&series(10), 1).is_ok());
        assert!(matches!(
            Predictor::new(&artifact).forecast(&series(9), 1),
            Err(ForecastError::InsufficientHistory {
                required: 9,
                actual: 9
            })
        ));
    }

    #[test]
    fn test_each_step_feeds_the_previous_prediction_back() {
        let artifact = artifact(10);
        let history = series(30);
        let forecast = Predictor::new(&artifact).forecast(&history, 3).unwrap();

        let scaler = &artifact.scaler;
        let mut window: Vec<f64> = history.closes()[20..]
            .iter()
            .map(|c| scaler.transform(*c))
            .collect();
        let mut expected = Vec::new();
        for _ in 0..3 {
            let input = Array2::from_shape_vec((1, 10), window.clone()).unwrap();
            let next = artifact.model.predict(&input)[0];
            expected.push(next);
            window.remove(0);
            window.push(next);
        }

        // Re-predicting the unshifted window would repeat the first step
        assert!((expected[1] - expected[0]).abs() > 1e-12);
        for (point, scaled) in forecast.points.iter().zip(&expected) {
            assert!((point.predicted_price - scaler.inverse_transform(*scaled)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_horizon_is_empty() {
        let artifact = artifact(10);
        let forecast = Predictor::new(&artifact).forecast(&series(12), 0).unwrap();
        assert!(forecast.points.is_empty());
    }
}
