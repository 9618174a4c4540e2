use serde::{Deserialize, Serialize};

/// Min-max scaler mapping `[min, max]` onto `[0, 1]`.
///
/// Fit once per training run over the full fetched history and persisted with the
/// model; prediction reuses the stored state and never refits.
///
/// A constant series makes `max - min` zero: `transform` then yields NaN or infinity.
/// This is a precondition on the input, not a guarded error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { min, max }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.min) / self.range()
    }

    pub fn inverse_transform(&self, scaled: f64) -> f64 {
        scaled * self.range() + self.min
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    pub fn inverse_transform_all(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|&v| self.inverse_transform(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_finds_extremes() {
        let scaler = MinMaxScaler::fit(&[120.0, 80.0, 200.0, 150.0]);
        assert_eq!(scaler.min, 80.0);
        assert_eq!(scaler.max, 200.0);
        assert_eq!(scaler.transform(80.0), 0.0);
        assert_eq!(scaler.transform(200.0), 1.0);
        assert!((scaler.transform(140.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_within_range() {
        let scaler = MinMaxScaler::fit(&[17_000.0, 22_500.0, 19_250.5]);
        let mut x = scaler.min;
        while x <= scaler.max {
            let back = scaler.inverse_transform(scaler.transform(x));
            assert!((back - x).abs() < 1e-9, "{} -> {}", x, back);
            x += 137.25;
        }
    }

    #[test]
    fn test_batch_helpers_match_scalar() {
        let scaler = MinMaxScaler::fit(&[1.0, 3.0]);
        assert_eq!(scaler.transform_all(&[1.0, 2.0, 3.0]), vec![0.0, 0.5, 1.0]);
        assert_eq!(scaler.inverse_transform_all(&[0.0, 0.25, 2.0]), vec![1.0, 1.5, 5.0]);
    }

    #[test]
    fn test_constant_series_degenerates_to_nan() {
        let scaler = MinMaxScaler::fit(&[250.0, 250.0, 250.0]);
        assert_eq!(scaler.range(), 0.0);
        assert!(scaler.transform(250.0).is_nan());
        assert!(scaler.transform(251.0).is_infinite());
    }
}
