//! Prometheus metrics definitions for indexcast
//!
//! All metrics use the `indexcast_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the forecasting service
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Training runs by outcome
    pub training_runs_total: CounterVec,
    /// Forecast requests by outcome
    pub predictions_total: CounterVec,
    /// Price fetches by source and outcome
    pub data_fetches_total: CounterVec,
    /// Wall time of service operations in seconds
    pub operation_seconds: HistogramVec,
    /// Whether a model is installed (0/1)
    pub model_loaded: GenericGauge<AtomicF64>,
    /// Window length of the installed model
    pub model_window_len: GenericGauge<AtomicF64>,
    /// Validation MSE (price units) of the last training run
    pub last_validation_mse: GenericGauge<AtomicF64>,
    /// Epochs of the last training run
    pub last_training_epochs: GenericGauge<AtomicF64>,
    /// Process uptime in seconds
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let training_runs_total = CounterVec::new(
            Opts::new("indexcast_training_runs_total", "Training runs by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(training_runs_total.clone()))?;

        let predictions_total = CounterVec::new(
            Opts::new("indexcast_predictions_total", "Forecast requests by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(predictions_total.clone()))?;

        let data_fetches_total = CounterVec::new(
            Opts::new(
                "indexcast_data_fetches_total",
                "Price history fetches by source and outcome",
            ),
            &["source", "outcome"],
        )?;
        registry.register(Box::new(data_fetches_total.clone()))?;

        let operation_seconds = HistogramVec::new(
            HistogramOpts::new(
                "indexcast_operation_seconds",
                "Service operation latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_seconds.clone()))?;

        let model_loaded = Gauge::with_opts(Opts::new(
            "indexcast_model_loaded",
            "Whether a trained model is installed (0/1)",
        ))?;
        registry.register(Box::new(model_loaded.clone()))?;

        let model_window_len = Gauge::with_opts(Opts::new(
            "indexcast_model_window_len",
            "Input window length of the installed model",
        ))?;
        registry.register(Box::new(model_window_len.clone()))?;

        let last_validation_mse = Gauge::with_opts(Opts::new(
            "indexcast_last_validation_mse",
            "Validation MSE in price units of the last training run",
        ))?;
        registry.register(Box::new(last_validation_mse.clone()))?;

        let last_training_epochs = Gauge::with_opts(Opts::new(
            "indexcast_last_training_epochs",
            "Epochs run by the last training run",
        ))?;
        registry.register(Box::new(last_training_epochs.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "indexcast_uptime_seconds",
            "Process uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            training_runs_total,
            predictions_total,
            data_fetches_total,
            operation_seconds,
            model_loaded,
            model_window_len,
            last_validation_mse,
            last_training_epochs,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_training(&self, outcome: &str) {
        self.training_runs_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_predictions(&self, outcome: &str) {
        self.predictions_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_fetches(&self, source: &str, outcome: &str) {
        self.data_fetches_total
            .with_label_values(&[source, outcome])
            .inc();
    }

    pub fn observe_operation(&self, operation: &str, seconds: f64) {
        self.operation_seconds
            .with_label_values(&[operation])
            .observe(seconds);
    }

    /// Records the installed model; `None` clears it
    pub fn set_model(&self, window_len: Option<usize>) {
        match window_len {
            Some(len) => {
                self.model_loaded.set(1.0);
                self.model_window_len.set(len as f64);
            }
            None => {
                self.model_loaded.set(0.0);
                self.model_window_len.set(0.0);
            }
        }
    }

    pub fn count(counter: &CounterVec, label: &str) -> f64 {
        counter.with_label_values(&[label]).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.model_loaded.set(0.0);
        assert!(metrics.render().contains("indexcast_"));
    }

    #[test]
    fn test_training_counter() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_training("success");
        metrics.inc_training("success");
        metrics.inc_training("error");
        assert_eq!(Metrics::count(&metrics.training_runs_total, "success"), 2.0);
        let output = metrics.render();
        assert!(output.contains("indexcast_training_runs_total{outcome=\"error\"} 1"));
    }

    #[test]
    fn test_model_gauges() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.set_model(Some(100));
        let output = metrics.render();
        assert!(output.contains("indexcast_model_loaded 1"));
        assert!(output.contains("indexcast_model_window_len 100"));
        metrics.set_model(None);
        assert!(metrics.render().contains("indexcast_model_loaded 0"));
    }

    #[test]
    fn test_fetch_counter_labels() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_fetches("yahoo", "error");
        metrics.inc_fetches("csv", "success");
        let output = metrics.render();
        assert!(output.contains("yahoo"));
        assert!(output.contains("csv"));
    }
}
