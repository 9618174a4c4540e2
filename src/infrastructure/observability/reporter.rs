//! Push-based metrics reporter for indexcast
//!
//! Emits a structured JSON snapshot to stdout after each command. Nothing listens
//! for incoming requests.

use crate::infrastructure::observability::metrics::Metrics;
use prometheus::CounterVec;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub model: ModelSnapshot,
    pub activity: ActivitySnapshot,
}

#[derive(Serialize)]
pub struct ModelSnapshot {
    pub loaded: bool,
    pub window_len: Option<usize>,
    pub last_validation_mse: Option<f64>,
    pub last_training_epochs: Option<usize>,
}

#[derive(Serialize)]
pub struct ActivitySnapshot {
    pub training_succeeded: u64,
    pub training_failed: u64,
    pub predictions_succeeded: u64,
    pub predictions_failed: u64,
}

pub struct MetricsReporter {
    metrics: Metrics,
    start_time: Instant,
}

impl MetricsReporter {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Log one snapshot as `METRICS_JSON:<json>`
    pub fn report(&self) {
        let snapshot = self.collect_snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                // Use a special prefix so logs can be easily filtered
                println!("METRICS_JSON:{}", json);
                info!(
                    "Model loaded: {} | Trainings: {} | Predictions: {} | Uptime: {}s",
                    snapshot.model.loaded,
                    snapshot.activity.training_succeeded,
                    snapshot.activity.predictions_succeeded,
                    snapshot.uptime_seconds
                );
            }
            Err(e) => warn!("Failed to serialize metrics: {}", e),
        }
    }

    fn collect_snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        self.metrics.uptime_seconds.set(uptime as f64);

        let loaded = self.metrics.model_loaded.get() > 0.0;
        let epochs = self.metrics.last_training_epochs.get();
        let counter = |vec: &CounterVec, label: &str| Metrics::count(vec, label) as u64;

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            model: ModelSnapshot {
                loaded,
                window_len: loaded.then(|| self.metrics.model_window_len.get() as usize),
                last_validation_mse: (epochs > 0.0).then(|| self.metrics.last_validation_mse.get()),
                last_training_epochs: (epochs > 0.0).then_some(epochs as usize),
            },
            activity: ActivitySnapshot {
                training_succeeded: counter(&self.metrics.training_runs_total, "success"),
                training_failed: counter(&self.metrics.training_runs_total, "error"),
                predictions_succeeded: counter(&self.metrics.predictions_total, "success"),
                predictions_failed: counter(&self.metrics.predictions_total, "error"),
            },
        }
    }
}
