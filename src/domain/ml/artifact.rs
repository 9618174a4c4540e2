use super::metrics::ModelMetrics;
use super::network::ForecastModel;
use super::scaler::MinMaxScaler;
use chrono::{DateTime, Utc};

/// Everything a prediction needs, produced by one training run.
///
/// An artifact is replaced wholesale by the next run, never patched.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub model: ForecastModel,
    pub scaler: MinMaxScaler,
    /// Absent when an older artifact is loaded without its metrics file
    pub metrics: Option<ModelMetrics>,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn new(model: ForecastModel, scaler: MinMaxScaler, metrics: ModelMetrics) -> Self {
        Self {
            model,
            scaler,
            metrics: Some(metrics),
            trained_at: Utc::now(),
        }
    }

    pub fn window_len(&self) -> usize {
        self.model.window_len()
    }
}
