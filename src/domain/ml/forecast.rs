use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One forecast day. `day` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_price: f64,
    pub day: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(rename = "predictions")]
    pub points: Vec<ForecastPoint>,
    pub current_price: f64,
    pub last_date: NaiveDate,
}

impl Forecast {
    pub fn horizon(&self) -> usize {
        self.points.len()
    }
}
