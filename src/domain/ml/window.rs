//! Sliding-window sample construction
//!
//! Every window is expressed relative to its own first price (the anchor):
//! `window[j] = (price[i + j] - price[i]) / price[i]`, and the target is the same
//! transform applied to `price[i + L]`. Windows are therefore scale-invariant, so one
//! model covers different price regimes.
//!
//! Precondition: prices are strictly positive. A zero anchor is not checked and
//! yields non-finite values.

use ndarray::{Array1, Array2, Axis, s};

/// Windows and targets, one row per anchor, in chronological order
#[derive(Debug, Clone)]
pub struct TrainingSet {
    /// `[samples, window_len]`
    pub inputs: Array2<f64>,
    /// `[samples]`
    pub targets: Array1<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn window_len(&self) -> usize {
        self.inputs.ncols()
    }

    /// Positional split: the leading `1 - validation_fraction` share trains, the tail validates.
    ///
    /// Adjacent windows overlap, so the first validation windows share raw prices with
    /// the last training windows. That leakage is kept as-is for metric comparability.
    pub fn split(&self, validation_fraction: f64) -> (TrainingSet, TrainingSet) {
        let train_len = ((self.len() as f64) * (1.0 - validation_fraction)).floor() as usize;
        let train_len = train_len.min(self.len());
        (self.rows(0, train_len), self.rows(train_len, self.len()))
    }

    /// Gathers the given rows (used for shuffled mini-batches)
    pub fn select(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            inputs: self.inputs.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
        }
    }

    fn rows(&self, start: usize, end: usize) -> TrainingSet {
        TrainingSet {
            inputs: self.inputs.slice(s![start..end, ..]).to_owned(),
            targets: self.targets.slice(s![start..end]).to_owned(),
        }
    }
}

/// Number of samples `build_windows` produces for `n` prices
pub fn window_count(n: usize, window_len: usize) -> usize {
    n.saturating_sub(window_len + 2)
}

/// Builds all `(window, target)` pairs for anchors `1 ..= n - window_len - 2`.
///
/// Anchor 0 is never used, and the last usable target index is `n - 2`.
/// Returns an empty set when `n <= window_len + 2`.
pub fn build_windows(prices: &[f64], window_len: usize) -> TrainingSet {
    let count = window_count(prices.len(), window_len);
    let mut inputs = Array2::<f64>::zeros((count, window_len));
    let mut targets = Array1::<f64>::zeros(count);

    for (row, anchor_idx) in (1..=count).enumerate() {
        let anchor = prices[anchor_idx];
        for j in 0..window_len {
            inputs[[row, j]] = (prices[anchor_idx + j] - anchor) / anchor;
        }
        targets[row] = (prices[anchor_idx + window_len] - anchor) / anchor;
    }

    TrainingSet { inputs, targets }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_window_count_matches_formula() {
        for n in [0, 5, 12, 13, 14, 50, 200] {
            let set = build_windows(&linear(n), 10);
            assert_eq!(set.len(), n.saturating_sub(12), "n = {}", n);
            assert_eq!(set.window_len(), 10);
        }
    }

    #[test]
    fn test_too_short_series_is_empty() {
        assert!(build_windows(&linear(12), 10).is_empty());
        assert_eq!(build_windows(&linear(13), 10).len(), 1);
    }

    #[test]
    fn test_first_element_is_zero() {
        let set = build_windows(&[10.0, 20.0, 15.0, 30.0, 45.0, 60.0, 5.0, 8.0], 3);
        for row in set.inputs.rows() {
            assert_eq!(row[0], 0.0);
        }
    }

    #[test]
    fn test_relative_values_and_target() {
        // anchor index 1 -> price 20
        let prices = [10.0, 20.0, 30.0, 10.0, 40.0, 50.0];
        let set = build_windows(&prices, 2);
        assert_eq!(set.len(), 2);
        assert_eq!(set.inputs.row(0).to_vec(), vec![0.0, 0.5]);
        assert_eq!(set.targets[0], -0.5);
        // anchor index 2 -> price 30
        assert!((set.inputs[[1, 1]] - (10.0 - 30.0) / 30.0).abs() < 1e-12);
        assert!((set.targets[1] - (40.0 - 30.0) / 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_split_is_positional() {
        let set = build_windows(&linear(200), 10);
        let (train, validation) = set.split(0.2);
        assert_eq!(train.len(), 150);
        assert_eq!(validation.len(), 38);
        assert_eq!(train.inputs.row(0), set.inputs.row(0));
        assert_eq!(validation.inputs.row(0), set.inputs.row(150));
        assert_eq!(validation.targets[37], set.targets[187]);
    }

    #[test]
    fn test_select_gathers_rows() {
        let set = build_windows(&linear(30), 5);
        let picked = set.select(&[3, 0]);
        assert_eq!(picked.inputs.row(0), set.inputs.row(3));
        assert_eq!(picked.targets[1], set.targets[0]);
    }
}
