pub mod api;

pub use api::{ApiResponse, ForecastApi, HttpStatus, PredictRequest};
