//! Push-based observability for indexcast
//!
//! Metrics are kept in a Prometheus registry and pushed out as structured JSON
//! logs. No HTTP server, no incoming requests.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
