//! Primary/fallback composition of price sources

use crate::domain::errors::ForecastError;
use crate::domain::market::PriceSeries;
use crate::domain::ports::PriceDataService;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

/// Tries `primary` first; on an error or an empty series, serves from `fallback`.
pub struct FallbackPriceService {
    primary: Arc<dyn PriceDataService>,
    fallback: Arc<dyn PriceDataService>,
}

impl FallbackPriceService {
    pub fn new(primary: Arc<dyn PriceDataService>, fallback: Arc<dyn PriceDataService>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl PriceDataService for FallbackPriceService {
    async fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError> {
        match self.primary.fetch_closes(symbol, start, end).await {
            Ok(series) if !series.is_empty() => return Ok(series),
            Ok(_) => warn!(
                "{} returned no data for {}, falling back to {}",
                self.primary.name(),
                symbol,
                self.fallback.name()
            ),
            Err(e) => warn!(
                "{} failed for {}: {}. Falling back to {}",
                self.primary.name(),
                symbol,
                e,
                self.fallback.name()
            ),
        }

        let series = self.fallback.fetch_closes(symbol, start, end).await?;
        if series.is_empty() {
            return Err(ForecastError::DataUnavailable {
                source_name: self.name().to_string(),
                reason: format!("no data available for {} from any source", symbol),
            });
        }
        Ok(series)
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::StaticPriceService;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_primary_wins_when_it_has_data() {
        let primary = Arc::new(StaticPriceService::linear("primary", 5, 100.0, 1.0));
        let fallback = Arc::new(StaticPriceService::linear("fallback", 3, 500.0, 1.0));
        let service = FallbackPriceService::new(primary, fallback);
        let series = service.fetch_closes("^NSEI", day(), day()).await.unwrap();
        assert_eq!(series.len(), 5);
    }

    #[tokio::test]
    async fn test_falls_back_on_error_and_empty() {
        let fallback = Arc::new(StaticPriceService::linear("fallback", 3, 500.0, 1.0));

        let failing = FallbackPriceService::new(Arc::new(StaticPriceService::failing("down")), fallback.clone());
        let series = failing.fetch_closes("^NSEI", day(), day()).await.unwrap();
        assert_eq!(series.closes(), vec![500.0, 501.0, 502.0]);

        let empty = FallbackPriceService::new(Arc::new(StaticPriceService::empty("empty")), fallback);
        assert_eq!(empty.fetch_closes("^NSEI", day(), day()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_errors_when_every_source_is_empty() {
        let service = FallbackPriceService::new(
            Arc::new(StaticPriceService::failing("down")),
            Arc::new(StaticPriceService::empty("empty")),
        );
        let err = service.fetch_closes("^NSEI", day(), day()).await.unwrap_err();
        assert!(matches!(err, ForecastError::DataUnavailable { .. }));
    }
}
