//! Forecasting configuration parsing from environment variables.
//!
//! Covers the symbol, history lookback, model topology and training loop.

use crate::application::ForecastServiceConfig;
use crate::application::ml::TrainingConfig;
use crate::domain::ml::network::{ConvPadding, ModelConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Forecasting environment configuration
#[derive(Debug, Clone)]
pub struct ForecastEnvConfig {
    pub symbol: String,
    pub lookback_days: i64,

    // Model
    pub window_len: usize,
    pub conv_padding: ConvPadding,

    // Training loop
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub learning_rate: f64,
    pub seed: Option<u64>,

    // Storage
    pub artifact_dir: PathBuf,
}

impl ForecastEnvConfig {
    pub fn from_env() -> Result<Self> {
        let seed = match env::var("FORECAST_SEED") {
            Ok(raw) => Some(raw.parse::<u64>().context("Failed to parse FORECAST_SEED")?),
            Err(_) => None,
        };

        let padding_str =
            env::var("FORECAST_CONV_PADDING").unwrap_or_else(|_| "valid".to_string());
        let conv_padding = ConvPadding::from_str(&padding_str)?;

        let validation_split = Self::parse_f64("FORECAST_VALIDATION_SPLIT", 0.2)?;
        if !(0.0..1.0).contains(&validation_split) {
            anyhow::bail!(
                "FORECAST_VALIDATION_SPLIT must be in [0, 1), got {}",
                validation_split
            );
        }

        Ok(Self {
            symbol: env::var("FORECAST_SYMBOL").unwrap_or_else(|_| "^NSEI".to_string()),
            lookback_days: env::var("FORECAST_LOOKBACK_DAYS")
                .unwrap_or_else(|_| "365".to_string())
                .parse::<i64>()
                .context("Failed to parse FORECAST_LOOKBACK_DAYS")?,
            window_len: Self::parse_usize("FORECAST_WINDOW_LEN", 100)?,
            conv_padding,
            epochs: Self::parse_usize("FORECAST_EPOCHS", 40)?,
            batch_size: Self::parse_usize("FORECAST_BATCH_SIZE", 40)?,
            validation_split,
            learning_rate: Self::parse_f64("FORECAST_LEARNING_RATE", 0.001)?,
            seed,
            artifact_dir: env::var("FORECAST_ARTIFACT_DIR")
                .unwrap_or_else(|_| "saved_model".to_string())
                .into(),
        })
    }

    pub fn to_service_config(&self) -> ForecastServiceConfig {
        ForecastServiceConfig {
            symbol: self.symbol.clone(),
            lookback_days: self.lookback_days,
            training: TrainingConfig {
                model: ModelConfig::new(self.window_len, self.conv_padding),
                epochs: self.epochs,
                batch_size: self.batch_size,
                validation_split: self.validation_split,
                learning_rate: self.learning_rate,
                seed: self.seed,
            },
        }
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_config_defaults() {
        let _guard = crate::config_tests::env_lock();
        let config = ForecastEnvConfig::from_env().expect("Should parse with defaults");
        assert_eq!(config.symbol, "^NSEI");
        assert_eq!(config.window_len, 100);
        assert_eq!(config.epochs, 40);
        assert_eq!(config.conv_padding, ConvPadding::Valid);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_service_config_carries_training_settings() {
        let _guard = crate::config_tests::env_lock();
        let config = ForecastEnvConfig::from_env().expect("Should parse with defaults");
        let service = config.to_service_config();
        assert_eq!(service.training.model.window_len, config.window_len);
        assert_eq!(service.training.batch_size, 40);
        assert_eq!(service.lookback_days, 365);
    }
}
