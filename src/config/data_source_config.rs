//! Price data source configuration parsing from environment variables.

use crate::infrastructure::yahoo::DEFAULT_YAHOO_BASE_URL;
use std::env;
use std::path::PathBuf;

/// Data source environment configuration
#[derive(Debug, Clone)]
pub struct DataSourceEnvConfig {
    pub yahoo_base_url: String,
    /// Static dataset served when Yahoo fails or returns nothing
    pub fallback_csv_path: PathBuf,
}

impl DataSourceEnvConfig {
    pub fn from_env() -> Self {
        Self {
            yahoo_base_url: env::var("YAHOO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_YAHOO_BASE_URL.to_string()),
            fallback_csv_path: env::var("FALLBACK_CSV_PATH")
                .unwrap_or_else(|_| "data/NIFTY50_all.csv".to_string())
                .into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_config_defaults() {
        let _guard = crate::config_tests::env_lock();
        let config = DataSourceEnvConfig::from_env();
        assert_eq!(config.yahoo_base_url, DEFAULT_YAHOO_BASE_URL);
        assert!(config.fallback_csv_path.ends_with("NIFTY50_all.csv"));
    }
}
