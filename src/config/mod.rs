//! Configuration module for indexcast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Forecast, Data Source, and Observability.

mod data_source_config;
mod forecast_config;
mod observability_config;

pub use data_source_config::DataSourceEnvConfig;
pub use forecast_config::ForecastEnvConfig;
pub use observability_config::ObservabilityEnvConfig;

use anyhow::{Context, Result};

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub forecast: ForecastEnvConfig,
    pub data_source: DataSourceEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            forecast: ForecastEnvConfig::from_env().context("Failed to load forecast config")?,
            data_source: DataSourceEnvConfig::from_env(),
            observability: ObservabilityEnvConfig::from_env(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_defaults() {
        let _guard = crate::config_tests::env_lock();
        let config = Config::from_env().expect("Should parse with defaults");
        assert_eq!(config.forecast.batch_size, 40);
        assert!(config.observability.enabled);
    }
}
