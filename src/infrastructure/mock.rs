use crate::domain::errors::ForecastError;
use crate::domain::market::{PricePoint, PriceSeries};
use crate::domain::ml::ModelArtifact;
use crate::domain::ports::PriceDataService;
use crate::domain::repositories::ArtifactRepository;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Price source serving a fixed series (or a fixed failure), for tests and offline runs
pub struct StaticPriceService {
    name: String,
    outcome: std::result::Result<PriceSeries, String>,
    calls: AtomicUsize,
}

impl StaticPriceService {
    pub fn new(name: &str, series: PriceSeries) -> Self {
        Self {
            name: name.to_string(),
            outcome: Ok(series),
            calls: AtomicUsize::new(0),
        }
    }

    /// `n` consecutive daily closes from 2024-01-01: `start, start + step, ...`
    pub fn linear(name: &str, n: usize, start: f64, step: f64) -> Self {
        Self::new(name, linear_series(n, start, step))
    }

    pub fn empty(name: &str) -> Self {
        Self::new(name, PriceSeries::default())
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: Err("source offline".to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

pub fn linear_series(n: usize, start: f64, step: f64) -> PriceSeries {
    let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    PriceSeries::from_unordered(
        (0..n)
            .map(|i| PricePoint::new(first + Duration::days(i as i64), start + step * i as f64))
            .collect(),
    )
}

#[async_trait]
impl PriceDataService for StaticPriceService {
    async fn fetch_closes(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> std::result::Result<PriceSeries, ForecastError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.outcome
            .clone()
            .map_err(|reason| ForecastError::DataUnavailable {
                source_name: self.name.clone(),
                reason,
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Artifact repository kept in memory
#[derive(Clone, Default)]
pub struct InMemoryArtifactRepository {
    artifact: Arc<RwLock<Option<ModelArtifact>>>,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(artifact: ModelArtifact) -> Self {
        Self {
            artifact: Arc::new(RwLock::new(Some(artifact))),
        }
    }
}

#[async_trait]
impl ArtifactRepository for InMemoryArtifactRepository {
    async fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        *self.artifact.write().await = Some(artifact.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<ModelArtifact>> {
        Ok(self.artifact.read().await.clone())
    }
}
