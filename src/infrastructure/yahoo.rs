//! Yahoo Finance chart API client
//!
//! Daily closes come from `/v8/finance/chart/{symbol}`; the symbol is percent-encoded
//! into the path so index tickers like `^NSEI` survive.

use crate::domain::errors::ForecastError;
use crate::domain::market::{PricePoint, PriceSeries};
use crate::domain::ports::PriceDataService;
use crate::infrastructure::core::http_client_factory::{
    HttpClientFactory, build_url_with_query, urlencoding_encode,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

pub struct YahooPriceService {
    client: ClientWithMiddleware,
    base_url: String,
}

impl YahooPriceService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url: base_url.into(),
        }
    }

    async fn fetch_internal(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding_encode(symbol)
        );

        // period2 is exclusive, so step past the last requested day
        let period1 = start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);
        let period2 = (end + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc().timestamp())
            .unwrap_or(period1);
        let period1_str = period1.to_string();
        let period2_str = period2.to_string();

        let url_with_query = build_url_with_query(
            &url,
            &[
                ("period1", period1_str.as_str()),
                ("period2", period2_str.as_str()),
                ("interval", "1d"),
                ("events", "history"),
            ],
        );
        debug!("YahooPriceService: GET {}", url_with_query);

        let response = self
            .client
            .get(&url_with_query)
            .send()
            .await
            .context("Failed to fetch chart from Yahoo Finance")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo chart fetch failed ({}): {}", status, error_text);
        }

        let envelope: ChartEnvelope = response
            .json()
            .await
            .context("Failed to parse Yahoo chart response")?;

        let series = parse_chart(envelope)?;
        info!(
            "YahooPriceService: Fetched {} closes for {}",
            series.len(),
            symbol
        );
        Ok(series)
    }
}

/// Pairs timestamps with non-null closes, attaching the volume when present
fn parse_chart(envelope: ChartEnvelope) -> Result<PriceSeries> {
    if let Some(err) = envelope.chart.error {
        anyhow::bail!("Yahoo chart error {}: {}", err.code, err.description);
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .context("Yahoo chart response has no result")?;
    let (closes, volumes) = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| (q.close, q.volume))
        .unwrap_or_default();

    let points = result
        .timestamp
        .iter()
        .zip(closes)
        .enumerate()
        .filter_map(|(idx, (ts, close))| {
            let close = close.filter(|c| c.is_finite())?;
            let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
            let point = PricePoint::new(date, close);
            Some(match volumes.get(idx).copied().flatten() {
                Some(volume) if volume.is_finite() => point.with_volume(volume),
                _ => point,
            })
        })
        .collect();

    Ok(PriceSeries::from_unordered(points))
}

#[async_trait]
impl PriceDataService for YahooPriceService {
    async fn fetch_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ForecastError> {
        self.fetch_internal(symbol, start, end)
            .await
            .map_err(|e| ForecastError::DataUnavailable {
                source_name: self.name().to_string(),
                reason: format!("{:#}", e),
            })
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<PriceSeries> {
        parse_chart(serde_json::from_str(json)?)
    }

    #[test]
    fn test_parse_skips_null_closes() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704153600,1704240000,1704326400],
            "indicators":{"quote":[{"close":[21665.8,null,21517.35]}]}
        }],"error":null}}"#;
        let series = parse(json).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(series.last().unwrap().close, 21517.35);
        assert_eq!(series.volumes(), None);
    }

    #[test]
    fn test_parse_attaches_volume() {
        let json = r#"{"chart":{"result":[{
            "timestamp":[1704153600,1704240000],
            "indicators":{"quote":[{"close":[21665.8,21517.35],"volume":[245300,null]}]}
        }],"error":null}}"#;
        let series = parse(json).unwrap();
        assert_eq!(series.points()[0].volume, Some(245_300.0));
        assert_eq!(series.points()[1].volume, None);
    }

    #[test]
    fn test_parse_reports_api_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse(json).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_parse_empty_result() {
        let json = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse(json).unwrap().is_empty());
    }
}
