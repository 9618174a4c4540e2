//! Model evaluation metrics
//!
//! `ModelMetrics` serializes to the exact 13-key mapping exposed by the train and
//! model-info responses; its field names are part of the external contract.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Loss and error figures for one epoch, training and validation side by side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub loss: f64,
    pub mae: f64,
    pub rmse: f64,
    pub val_loss: f64,
    pub val_mae: f64,
    pub val_rmse: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochStats>,
}

impl TrainingHistory {
    pub fn push(&mut self, stats: EpochStats) {
        self.epochs.push(stats);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}

/// Regression scores on price-unit values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
    pub rmse: f64,
    pub explained_variance: f64,
    pub max_error: f64,
}

impl RegressionReport {
    /// Scores `predicted` against `actual`.
    ///
    /// R² and explained variance follow the usual convention for a constant target:
    /// 1.0 for a perfect fit, 0.0 otherwise. Both slices must have the same length.
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len());
        if n == 0 {
            return Self {
                mse: f64::NAN,
                mae: f64::NAN,
                r2: f64::NAN,
                rmse: f64::NAN,
                explained_variance: f64::NAN,
                max_error: f64::NAN,
            };
        }
        let actual = &actual[..n];
        let predicted = &predicted[..n];

        let residuals: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| a - p)
            .collect();

        let mse = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
        let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64;
        let max_error = residuals.iter().map(|r| r.abs()).fold(0.0, f64::max);

        let actual_mean = actual.iter().mean();
        let ss_res = residuals.iter().map(|r| r * r).sum::<f64>();
        let ss_tot = actual.iter().map(|a| (a - actual_mean).powi(2)).sum::<f64>();
        let r2 = finite_ratio_score(ss_res, ss_tot);

        let residual_variance = residuals.iter().population_variance();
        let actual_variance = actual.iter().population_variance();
        let explained_variance = finite_ratio_score(residual_variance, actual_variance);

        Self {
            mse,
            mae,
            r2,
            rmse: mse.sqrt(),
            explained_variance,
            max_error,
        }
    }
}

/// `1 - numerator / denominator`, pinned to 1.0 / 0.0 when the denominator vanishes
fn finite_ratio_score(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        if numerator == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - numerator / denominator
    }
}

/// The persisted metrics mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
    pub rmse: f64,
    pub explained_variance: f64,
    pub max_error: f64,
    pub training_loss: f64,
    pub validation_loss: f64,
    pub training_mse: f64,
    pub validation_mse: f64,
    pub training_mae: f64,
    pub validation_mae: f64,
    pub training_epochs: usize,
}

impl ModelMetrics {
    pub const KEYS: [&'static str; 13] = [
        "mse",
        "mae",
        "r2",
        "rmse",
        "explained_variance",
        "max_error",
        "training_loss",
        "validation_loss",
        "training_mse",
        "validation_mse",
        "training_mae",
        "validation_mae",
        "training_epochs",
    ];

    /// Combines the validation report with the endpoint values of the loss curves
    pub fn from_training(report: &RegressionReport, history: &TrainingHistory) -> Self {
        let last = history.last().copied().unwrap_or(EpochStats {
            loss: f64::NAN,
            mae: f64::NAN,
            rmse: f64::NAN,
            val_loss: f64::NAN,
            val_mae: f64::NAN,
            val_rmse: f64::NAN,
        });

        Self {
            mse: report.mse,
            mae: report.mae,
            r2: report.r2,
            rmse: report.rmse,
            explained_variance: report.explained_variance,
            max_error: report.max_error,
            training_loss: last.loss,
            validation_loss: last.val_loss,
            // The loss is MSE, so the tracked MSE curve is the loss curve
            training_mse: last.loss,
            validation_mse: last.val_loss,
            training_mae: last.mae,
            validation_mae: last.val_mae,
            training_epochs: history.len(),
        }
    }
}
