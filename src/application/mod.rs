pub mod forecast_service;

// Price history views
pub mod market_data;

// Training and inference
pub mod ml;

pub use forecast_service::{ForecastService, ForecastServiceConfig};
