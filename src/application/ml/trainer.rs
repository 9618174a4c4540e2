//! Training orchestration
//!
//! Windows the series, fits the scaler, splits positionally, runs mini-batch Adam
//! and scores the validation segment in price units.

use crate::domain::errors::ForecastError;
use crate::domain::market::PriceSeries;
use crate::domain::ml::network::{Adam, ForecastModel, ModelConfig, mse_loss};
use crate::domain::ml::{
    EpochStats, MinMaxScaler, ModelArtifact, ModelMetrics, RegressionReport, TrainingHistory,
    TrainingSet, build_windows,
};
use ndarray::Array1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub epochs: usize,
    pub batch_size: usize,
    /// Tail share of the windows held out for validation
    pub validation_split: f64,
    pub learning_rate: f64,
    /// Fixes initialisation, shuffling and dropout when set
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            epochs: 40,
            batch_size: 40,
            validation_split: 0.2,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub metrics: ModelMetrics,
    pub history: TrainingHistory,
    pub train_samples: usize,
    pub validation_samples: usize,
}

#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn train(&self, series: &PriceSeries) -> Result<TrainingOutcome, ForecastError> {
        let window_len = self.config.model.window_len;
        if series.len() <= window_len + 2 {
            return Err(ForecastError::InsufficientHistory {
                required: window_len + 2,
                actual: series.len(),
            });
        }
        self.config.model.validate()?;
        if self.config.epochs == 0 || self.config.batch_size == 0 {
            return Err(ForecastError::TrainingAborted {
                reason: "epochs and batch size must be positive".to_string(),
            });
        }

        let closes = series.closes();
        let scaler = MinMaxScaler::fit(&closes);
        let windows = build_windows(&closes, window_len);
        let (train_set, validation_set) = windows.split(self.config.validation_split);
        if train_set.is_empty() || validation_set.is_empty() {
            return Err(ForecastError::TrainingAborted {
                reason: format!(
                    "split of {} windows left {} for training and {} for validation",
                    windows.len(),
                    train_set.len(),
                    validation_set.len()
                ),
            });
        }

        info!(
            "Training on {} windows ({} train / {} validation), window length {}",
            windows.len(),
            train_set.len(),
            validation_set.len(),
            window_len
        );

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut model = ForecastModel::new(self.config.model, &mut rng)?;
        let mut optimizer = Adam::new(self.config.learning_rate);
        let mut history = TrainingHistory::default();
        let mut order: Vec<usize> = (0..train_set.len()).collect();

        for epoch in 1..=self.config.epochs {
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0;
            let mut abs_sum = 0.0;

            for batch_idx in order.chunks(self.config.batch_size) {
                let batch = train_set.select(batch_idx);
                let (predicted, cache) = model.forward_train(&batch.inputs, &mut rng);
                let (loss, grad) = mse_loss(&predicted, &batch.targets);
                if !loss.is_finite() {
                    return Err(ForecastError::TrainingAborted {
                        reason: format!("non-finite loss at epoch {}", epoch),
                    });
                }
                let grads = model.backward(&cache, &grad);
                model.apply_gradients(&grads, &mut optimizer);

                loss_sum += loss * batch.len() as f64;
                abs_sum += (&predicted - &batch.targets).mapv(f64::abs).sum();
            }

            let train_n = train_set.len() as f64;
            let (val_loss, val_mae) = self.evaluate(&model, &validation_set);
            let stats = EpochStats {
                loss: loss_sum / train_n,
                mae: abs_sum / train_n,
                rmse: (loss_sum / train_n).sqrt(),
                val_loss,
                val_mae,
                val_rmse: val_loss.sqrt(),
            };
            debug!(
                "Epoch {}/{}: loss={:.6} mae={:.6} val_loss={:.6} val_mae={:.6}",
                epoch, self.config.epochs, stats.loss, stats.mae, stats.val_loss, stats.val_mae
            );
            history.push(stats);
        }

        // Score in price units through the fitted scaler
        let predicted = model.predict_batched(&validation_set.inputs, self.config.batch_size);
        let actual = scaler.inverse_transform_all(&validation_set.targets.to_vec());
        let predicted = scaler.inverse_transform_all(&predicted.to_vec());
        let report = RegressionReport::evaluate(&actual, &predicted);
        let metrics = ModelMetrics::from_training(&report, &history);

        info!(
            "Training complete after {} epochs: mse={:.4} mae={:.4} r2={:.4}",
            history.len(),
            metrics.mse,
            metrics.mae,
            metrics.r2
        );

        Ok(TrainingOutcome {
            artifact: ModelArtifact::new(model, scaler, metrics.clone()),
            metrics,
            history,
            train_samples: train_set.len(),
            validation_samples: validation_set.len(),
        })
    }

    /// Inference-mode loss and MAE over a whole set
    fn evaluate(&self, model: &ForecastModel, set: &TrainingSet) -> (f64, f64) {
        let predicted = model.predict_batched(&set.inputs, self.config.batch_size);
        let residuals: Array1<f64> = &predicted - &set.targets;
        let n = set.len().max(1) as f64;
        (
            residuals.mapv(|r| r * r).sum() / n,
            residuals.mapv(f64::abs).sum() / n,
        )
    }
}
