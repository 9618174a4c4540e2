//! Transport-agnostic request handlers
//!
//! Each handler returns a status code and a JSON body. Every failure is
//! rendered as `{"status": "error", "message": ...}`; a missing model is the
//! caller's problem (400), anything else is ours (500).

use crate::application::ForecastService;
use crate::domain::errors::ForecastError;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_FORECAST_DAYS: usize = 7;

/// External market pages served by `market_links`: (name, url, description)
const MARKET_LINKS: [(&str, &str, &str); 5] = [
    (
        "NSE India",
        "https://www.nseindia.com/",
        "Official National Stock Exchange website",
    ),
    (
        "Money Control",
        "https://www.moneycontrol.com/india/stockpricequote/",
        "Comprehensive stock market information",
    ),
    (
        "Yahoo Finance",
        "https://finance.yahoo.com/quote/%5ENSEI/",
        "NIFTY 50 on Yahoo Finance",
    ),
    (
        "Trading View",
        "https://www.tradingview.com/symbols/NSE-NIFTY/",
        "Advanced charting and analysis",
    ),
    (
        "Investing.com",
        "https://in.investing.com/indices/s-p-cnx-nifty",
        "Real-time NIFTY data and news",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok,
    BadRequest,
    InternalServerError,
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        match self {
            HttpStatus::Ok => 200,
            HttpStatus::BadRequest => 400,
            HttpStatus::InternalServerError => 500,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HttpStatus::Ok)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: HttpStatus,
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: HttpStatus::Ok,
            body,
        }
    }

    fn error(err: &ForecastError) -> Self {
        let status = if err.is_client_error() {
            HttpStatus::BadRequest
        } else {
            HttpStatus::InternalServerError
        };
        Self {
            status,
            body: json!({ "status": "error", "message": err.to_string() }),
        }
    }

    /// Error by status code or by an `"error"` status in the body
    pub fn is_error(&self) -> bool {
        !self.status.is_success() || self.body.get("status") == Some(&json!("error"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    #[serde(default = "default_days")]
    pub days: usize,
}

fn default_days() -> usize {
    DEFAULT_FORECAST_DAYS
}

impl Default for PredictRequest {
    fn default() -> Self {
        Self {
            days: DEFAULT_FORECAST_DAYS,
        }
    }
}

#[derive(Clone)]
pub struct ForecastApi {
    service: Arc<ForecastService>,
}

impl ForecastApi {
    pub fn new(service: Arc<ForecastService>) -> Self {
        Self { service }
    }

    pub fn health(&self) -> ApiResponse {
        ApiResponse::ok(json!({
            "status": "healthy",
            "message": "Index forecasting API is running",
            "symbol": self.service.symbol(),
        }))
    }

    pub async fn train(&self) -> ApiResponse {
        info!("API: train");
        match self.service.train().await {
            Ok(report) => ApiResponse::ok(json!({
                "status": "success",
                "success": true,
                "message": "Model trained successfully",
                "performance": report.metrics,
                "data_points": report.data_points,
                "train_samples": report.train_samples,
                "validation_samples": report.validation_samples,
            })),
            Err(e) => {
                error!("API: training failed: {}", e);
                ApiResponse {
                    status: HttpStatus::InternalServerError,
                    body: json!({
                        "status": "error",
                        "success": false,
                        "message": format!("Training failed: {}", e),
                    }),
                }
            }
        }
    }

    pub async fn predict(&self, request: PredictRequest) -> ApiResponse {
        info!("API: predict {} days", request.days);
        match self.service.predict(request.days).await {
            Ok(forecast) => ApiResponse::ok(json!({
                "status": "success",
                "predictions": forecast.points,
                "current_price": forecast.current_price,
                "last_date": forecast.last_date,
            })),
            Err(e) => {
                error!("API: prediction failed: {}", e);
                ApiResponse::error(&e)
            }
        }
    }

    pub async fn model_info(&self) -> ApiResponse {
        match self.service.model_info().await {
            Ok(info) => ApiResponse::ok(json!({
                "status": "success",
                "model_loaded": true,
                "model_summary": info.summary,
                "sequence_length": info.window_len,
                "parameters": info.param_count,
                "trained_at": info.trained_at.to_rfc3339(),
                "performance": info.metrics,
            })),
            Err(ForecastError::ModelUnavailable) => ApiResponse::ok(json!({
                "status": "error",
                "message": "No model available",
                "model_loaded": false,
                "sequence_length": self.service.configured_window_len(),
            })),
            Err(e) => ApiResponse::error(&e),
        }
    }

    pub async fn historical(&self) -> ApiResponse {
        match self.service.historical().await {
            Ok(data) => ApiResponse::ok(json!({
                "status": "success",
                "symbol": data.symbol,
                "data": data.points,
                "indicators": data.indicators,
            })),
            Err(e) => {
                error!("API: historical data failed: {}", e);
                ApiResponse::error(&e)
            }
        }
    }

    pub fn market_links(&self) -> ApiResponse {
        let links: Vec<Value> = MARKET_LINKS
            .iter()
            .map(|(name, url, description)| {
                json!({ "name": name, "url": url, "description": description })
            })
            .collect();
        ApiResponse::ok(json!({ "status": "success", "links": links }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HttpStatus::Ok.code(), 200);
        assert_eq!(HttpStatus::BadRequest.code(), 400);
        assert_eq!(HttpStatus::InternalServerError.code(), 500);
    }

    #[test]
    fn test_error_mapping() {
        let missing = ApiResponse::error(&ForecastError::ModelUnavailable);
        assert_eq!(missing.status, HttpStatus::BadRequest);
        assert_eq!(missing.body["status"], "error");

        let storage = ApiResponse::error(&ForecastError::Storage {
            reason: "disk full".to_string(),
        });
        assert_eq!(storage.status, HttpStatus::InternalServerError);
        assert!(storage.is_error());
    }

    #[test]
    fn test_predict_request_defaults_days() {
        let request: PredictRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.days, 7);
        let request: PredictRequest = serde_json::from_str(r#"{"days": 3}"#).unwrap();
        assert_eq!(request.days, 3);
    }

    #[test]
    fn test_error_body_with_ok_status_is_error() {
        let response = ApiResponse::ok(json!({ "status": "error", "message": "No model available" }));
        assert!(response.is_error());
        assert!(!ApiResponse::ok(json!({ "status": "healthy" })).is_error());
    }
}
