use thiserror::Error;

/// Errors surfaced by the forecasting pipeline
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Price data unavailable from {source_name}: {reason}")]
    DataUnavailable { source_name: String, reason: String },

    #[error("Insufficient history: need more than {required} points, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Model not available. Please train first.")]
    ModelUnavailable,

    #[error("Window length {window_len} is too short for the convolution stack (minimum {min})")]
    WindowTooShort { window_len: usize, min: usize },

    #[error("Invalid price series: {reason}")]
    InvalidSeries { reason: String },

    #[error("Artifact storage failed: {reason}")]
    Storage { reason: String },

    #[error("Training aborted: {reason}")]
    TrainingAborted { reason: String },

    #[error("Indicator computation failed: {reason}")]
    Indicator { reason: String },
}

impl ForecastError {
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage {
            reason: format!("{:#}", err),
        }
    }

    /// Whether the caller can fix this by changing the request (train first, send more data)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ModelUnavailable)
    }
}
