//! indexcast - daily index price forecasting
//!
//! Each invocation runs one command and prints its JSON response body to stdout.
//! Logs go to stderr; a `METRICS_JSON:` snapshot follows the body unless
//! observability is disabled.
//!
//! # Usage
//! ```sh
//! indexcast train
//! indexcast predict --days 7
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use indexcast::application::{ForecastService, ForecastServiceConfig};
use indexcast::config::Config;
use indexcast::infrastructure::observability::{Metrics, MetricsReporter};
use indexcast::infrastructure::{
    CsvPriceService, FallbackPriceService, FileArtifactStore, YahooPriceService,
};
use indexcast::interfaces::api::DEFAULT_FORECAST_DAYS;
use indexcast::interfaces::{ForecastApi, PredictRequest};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "indexcast", version, about = "Forecast daily index closing prices")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report that the service is up
    Health,
    /// Fetch history, fit a new model and persist it
    Train,
    /// Forecast the next closes with the stored model
    Predict {
        #[arg(long, default_value_t = DEFAULT_FORECAST_DAYS)]
        days: usize,
    },
    /// Describe the stored model
    Info,
    /// Recent closes with technical indicators
    Historical,
    /// External market data pages
    Links,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Stdout carries the response body
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let config = Config::from_env()?;
    let service_config: ForecastServiceConfig = config.forecast.to_service_config();
    info!(
        "indexcast {}: symbol={}, window={}, artifacts={:?}",
        env!("CARGO_PKG_VERSION"),
        service_config.symbol,
        service_config.training.model.window_len,
        config.forecast.artifact_dir
    );

    let prices = FallbackPriceService::new(
        Arc::new(YahooPriceService::new(config.data_source.yahoo_base_url.clone())),
        Arc::new(CsvPriceService::new(config.data_source.fallback_csv_path.clone())),
    );
    let store = FileArtifactStore::new(config.forecast.artifact_dir.clone());
    let metrics = Metrics::new()?;
    let service = Arc::new(ForecastService::new(
        Arc::new(prices),
        Arc::new(store),
        service_config,
        metrics.clone(),
    ));
    let api = ForecastApi::new(service);

    let response = match cli.command {
        Command::Health => api.health(),
        Command::Train => api.train().await,
        Command::Predict { days } => api.predict(PredictRequest { days }).await,
        Command::Info => api.model_info().await,
        Command::Historical => api.historical().await,
        Command::Links => api.market_links(),
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);

    if config.observability.enabled {
        MetricsReporter::new(metrics).report();
    }

    if response.is_error() {
        anyhow::bail!("Request failed with status {}", response.status.code());
    }
    Ok(())
}
