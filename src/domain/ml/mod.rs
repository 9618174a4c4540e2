pub mod artifact;
pub mod forecast;
pub mod metrics;
pub mod network;
pub mod scaler;
pub mod window;

pub use artifact::ModelArtifact;
pub use forecast::{Forecast, ForecastPoint};
pub use metrics::{EpochStats, ModelMetrics, RegressionReport, TrainingHistory};
pub use scaler::MinMaxScaler;
pub use window::{TrainingSet, build_windows, window_count};
