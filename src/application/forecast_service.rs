//! Forecasting session
//!
//! `ForecastService` owns the currently installed artifact. Every operation that
//! reads or replaces it holds the lock for its whole duration, so a training run
//! and a prediction never interleave.

use crate::application::market_data::indicators::{HistoricalPoint, historical_view};
use crate::application::ml::{Predictor, Trainer, TrainingConfig};
use crate::domain::errors::ForecastError;
use crate::domain::market::PriceSeries;
use crate::domain::ml::{Forecast, ModelArtifact, ModelMetrics};
use crate::domain::ports::PriceDataService;
use crate::domain::repositories::ArtifactRepository;
use crate::infrastructure::observability::Metrics;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ForecastServiceConfig {
    pub symbol: String,
    /// Calendar days of history requested for training and prediction
    pub lookback_days: i64,
    pub training: TrainingConfig,
}

impl Default for ForecastServiceConfig {
    fn default() -> Self {
        Self {
            symbol: "^NSEI".to_string(),
            lookback_days: 365,
            training: TrainingConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub metrics: ModelMetrics,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub data_points: usize,
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub summary: Vec<String>,
    pub window_len: usize,
    pub param_count: usize,
    pub metrics: Option<ModelMetrics>,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HistoricalData {
    pub symbol: String,
    pub points: Vec<HistoricalPoint>,
    pub indicators: Vec<String>,
}

pub struct ForecastService {
    prices: Arc<dyn PriceDataService>,
    repository: Arc<dyn ArtifactRepository>,
    trainer: Trainer,
    config: ForecastServiceConfig,
    metrics: Metrics,
    current: Mutex<Option<ModelArtifact>>,
}

impl ForecastService {
    pub fn new(
        prices: Arc<dyn PriceDataService>,
        repository: Arc<dyn ArtifactRepository>,
        config: ForecastServiceConfig,
        metrics: Metrics,
    ) -> Self {
        metrics.set_model(None);
        Self {
            prices,
            repository,
            trainer: Trainer::new(config.training.clone()),
            config,
            metrics,
            current: Mutex::new(None),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Window length new models are trained with
    pub fn configured_window_len(&self) -> usize {
        self.config.training.model.window_len
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let end = Utc::now().date_naive();
        (end - Duration::days(self.config.lookback_days), end)
    }

    async fn fetch_history(&self) -> Result<PriceSeries, ForecastError> {
        let (start, end) = self.date_range();
        let result = self
            .prices
            .fetch_closes(&self.config.symbol, start, end)
            .await;
        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics.inc_fetches(self.prices.name(), outcome);
        let series = result?;
        if series.is_empty() {
            return Err(ForecastError::DataUnavailable {
                source_name: self.prices.name().to_string(),
                reason: format!("no closes for {}", self.config.symbol),
            });
        }
        Ok(series)
    }

    /// Fills the slot from the repository when nothing is installed yet.
    ///
    /// A repository failure is logged and treated as "no model".
    async fn ensure_loaded(&self, slot: &mut MutexGuard<'_, Option<ModelArtifact>>) {
        if slot.is_some() {
            return;
        }
        match self.repository.load().await {
            Ok(Some(artifact)) => {
                info!(
                    "Loaded stored model (window length {}, trained {})",
                    artifact.window_len(),
                    artifact.trained_at
                );
                self.metrics.set_model(Some(artifact.window_len()));
                **slot = Some(artifact);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load stored model: {:#}", e),
        }
    }

    /// Fetch, fit, persist, then install the new artifact
    pub async fn train(&self) -> Result<TrainingReport, ForecastError> {
        let timer = Instant::now();
        let mut slot = self.current.lock().await;
        let result = self.run_training(&mut slot).await;
        self.metrics
            .observe_operation("train", timer.elapsed().as_secs_f64());

        match &result {
            Ok(report) => {
                self.metrics.inc_training("success");
                self.metrics
                    .last_validation_mse
                    .set(report.metrics.validation_mse);
                self.metrics
                    .last_training_epochs
                    .set(report.metrics.training_epochs as f64);
            }
            Err(e) => {
                self.metrics.inc_training("error");
                error!("Training failed: {}", e);
            }
        }
        result
    }

    async fn run_training(
        &self,
        slot: &mut MutexGuard<'_, Option<ModelArtifact>>,
    ) -> Result<TrainingReport, ForecastError> {
        let series = self.fetch_history().await?;
        let data_points = series.len();
        info!(
            "Training {} on {} closes ({} to {})",
            self.config.symbol,
            data_points,
            series.points().first().map(|p| p.date).unwrap_or_default(),
            series.points().last().map(|p| p.date).unwrap_or_default()
        );

        let trainer = self.trainer.clone();
        let outcome = tokio::task::spawn_blocking(move || trainer.train(&series))
            .await
            .map_err(|e| ForecastError::TrainingAborted {
                reason: format!("training task failed: {}", e),
            })??;

        self.repository
            .save(&outcome.artifact)
            .await
            .map_err(ForecastError::storage)?;

        self.metrics.set_model(Some(outcome.artifact.window_len()));
        **slot = Some(outcome.artifact);

        Ok(TrainingReport {
            metrics: outcome.metrics,
            train_samples: outcome.train_samples,
            validation_samples: outcome.validation_samples,
            data_points,
        })
    }

    /// Autoregressive forecast of the next `days` closes
    pub async fn predict(&self, days: usize) -> Result<Forecast, ForecastError> {
        let timer = Instant::now();
        let mut slot = self.current.lock().await;
        self.ensure_loaded(&mut slot).await;

        let result = match Predictor::from_artifact(slot.as_ref()) {
            Ok(predictor) => match self.fetch_history().await {
                Ok(series) => predictor.forecast(&series, days),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        self.metrics
            .observe_operation("predict", timer.elapsed().as_secs_f64());

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics.inc_predictions(outcome);
        if let Ok(forecast) = &result {
            info!(
                "Forecast {} days for {} from {}",
                forecast.horizon(),
                self.config.symbol,
                forecast.last_date
            );
        }
        result
    }

    pub async fn model_info(&self) -> Result<ModelInfo, ForecastError> {
        let mut slot = self.current.lock().await;
        self.ensure_loaded(&mut slot).await;

        let artifact = slot.as_ref().ok_or(ForecastError::ModelUnavailable)?;
        Ok(ModelInfo {
            summary: artifact.model.summary(),
            window_len: artifact.window_len(),
            param_count: artifact.model.param_count(),
            metrics: artifact.metrics.clone(),
            trained_at: artifact.trained_at,
        })
    }

    /// Recent closes with technical indicators; independent of any model
    pub async fn historical(&self) -> Result<HistoricalData, ForecastError> {
        let timer = Instant::now();
        let series = self.fetch_history().await?;
        let (points, indicators) = historical_view(&series)?;
        self.metrics
            .observe_operation("historical", timer.elapsed().as_secs_f64());
        Ok(HistoricalData {
            symbol: self.config.symbol.clone(),
            points,
            indicators,
        })
    }

    pub async fn has_model(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::network::{ConvPadding, ModelConfig};
    use crate::infrastructure::mock::{InMemoryArtifactRepository, StaticPriceService};

    fn small_config() -> ForecastServiceConfig {
        ForecastServiceConfig {
            symbol: "^NSEI".to_string(),
            lookback_days: 365,
            training: TrainingConfig {
                model: ModelConfig::new(10, ConvPadding::Same),
                epochs: 1,
                batch_size: 32,
                seed: Some(3),
                ..TrainingConfig::default()
            },
        }
    }

    fn service(prices: StaticPriceService, repository: InMemoryArtifactRepository) -> ForecastService {
        ForecastService::new(
            Arc::new(prices),
            Arc::new(repository),
            small_config(),
            Metrics::new().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_predict_without_model_is_unavailable() {
        let svc = service(
            StaticPriceService::linear("static", 60, 100.0, 1.0),
            InMemoryArtifactRepository::new(),
        );
        let err = svc.predict(7).await.unwrap_err();
        assert!(matches!(err, ForecastError::ModelUnavailable));
        assert_eq!(Metrics::count(&svc.metrics().predictions_total, "error"), 1.0);
    }

    #[tokio::test]
    async fn test_train_installs_and_persists() {
        let repository = InMemoryArtifactRepository::new();
        let svc = service(
            StaticPriceService::linear("static", 60, 100.0, 1.0),
            repository.clone(),
        );

        let report = svc.train().await.unwrap();
        assert_eq!(report.data_points, 60);
        assert_eq!(report.train_samples + report.validation_samples, 48);
        assert_eq!(report.metrics.training_epochs, 1);
        assert!(svc.has_model().await);
        assert!(repository.load().await.unwrap().is_some());
        assert_eq!(svc.metrics().model_loaded.get(), 1.0);

        let forecast = svc.predict(3).await.unwrap();
        assert_eq!(forecast.horizon(), 3);
        assert_eq!(forecast.current_price, 159.0);
    }

    #[tokio::test]
    async fn test_stored_model_is_loaded_lazily() {
        let trainer = Trainer::new(small_config().training);
        let outcome = trainer
            .train(&crate::infrastructure::mock::linear_series(60, 100.0, 1.0))
            .unwrap();
        let svc = service(
            StaticPriceService::linear("static", 30, 200.0, 1.0),
            InMemoryArtifactRepository::with_artifact(outcome.artifact),
        );

        assert!(!svc.has_model().await);
        let info = svc.model_info().await.unwrap();
        assert_eq!(info.window_len, 10);
        assert!(info.metrics.is_some());
        assert!(svc.has_model().await);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_model() {
        let svc = service(
            StaticPriceService::failing("static"),
            InMemoryArtifactRepository::new(),
        );
        let err = svc.train().await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable { .. }));
        assert!(!svc.has_model().await);
        assert_eq!(Metrics::count(&svc.metrics().training_runs_total, "error"), 1.0);
    }

    #[tokio::test]
    async fn test_short_history_fails_training() {
        let svc = service(
            StaticPriceService::linear("static", 12, 100.0, 1.0),
            InMemoryArtifactRepository::new(),
        );
        assert!(matches!(
            svc.train().await,
            Err(ForecastError::InsufficientHistory { .. })
        ));
    }

    #[tokio::test]
    async fn test_historical_returns_indicators() {
        let svc = service(
            StaticPriceService::linear("static", 250, 100.0, 1.0),
            InMemoryArtifactRepository::new(),
        );
        let data = svc.historical().await.unwrap();
        assert_eq!(data.points.len(), 200);
        assert_eq!(data.indicators.len(), 21);
        assert_eq!(data.symbol, "^NSEI");
    }
}
