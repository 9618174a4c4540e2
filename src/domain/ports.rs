use crate::domain::errors::ForecastError;
use crate::domain::market::PriceSeries;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of daily closing prices
#[async_trait]
pub trait PriceDataService: Send + Sync {
    /// Closes for `symbol` with dates in `[start, end]`, ascending
    async fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError>;

    /// Short label used in logs and metrics
    fn name(&self) -> &str;
}
