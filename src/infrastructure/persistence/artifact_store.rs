//! File-backed artifact storage
//!
//! One directory holds the current artifact:
//! - `model.bin`: bincode-encoded weights, topology and training timestamp
//! - `scaler.json`: min/max of the fitted scaler
//! - `metrics.json`: the 13-key metrics mapping (optional on load)
//!
//! Every file is written to a `.tmp` sibling and renamed into place.

use crate::domain::ml::network::ForecastModel;
use crate::domain::ml::{MinMaxScaler, ModelArtifact, ModelMetrics};
use crate::domain::repositories::ArtifactRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MODEL_FILE: &str = "model.bin";
const SCALER_FILE: &str = "scaler.json";
const METRICS_FILE: &str = "metrics.json";

#[derive(Serialize, Deserialize)]
struct PersistedModel {
    model: ForecastModel,
    trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes)
            .with_context(|| format!("Failed to write temp file {:?}", temp_path))?;
        fs::rename(&temp_path, path).with_context(|| format!("Failed to rename into {:?}", path))?;
        Ok(())
    }

    fn save_sync(&self, artifact: &ModelArtifact) -> Result<()> {
        fs::create_dir_all(&self.dir).context("Failed to create artifact directory")?;

        let persisted = PersistedModel {
            model: artifact.model.clone(),
            trained_at: artifact.trained_at,
        };
        let model_bytes = bincode::serialize(&persisted).context("Failed to serialize model")?;
        Self::write_atomic(&self.dir.join(MODEL_FILE), &model_bytes)?;

        let scaler_json =
            serde_json::to_string_pretty(&artifact.scaler).context("Failed to serialize scaler")?;
        Self::write_atomic(&self.dir.join(SCALER_FILE), scaler_json.as_bytes())?;

        let metrics_path = self.dir.join(METRICS_FILE);
        match &artifact.metrics {
            Some(metrics) => {
                let metrics_json =
                    serde_json::to_string_pretty(metrics).context("Failed to serialize metrics")?;
                Self::write_atomic(&metrics_path, metrics_json.as_bytes())?;
            }
            None if metrics_path.exists() => {
                // Stale metrics belong to the replaced model
                fs::remove_file(&metrics_path).context("Failed to remove stale metrics")?;
            }
            None => {}
        }

        info!("Saved model artifact to {:?}", self.dir);
        Ok(())
    }

    fn load_sync(&self) -> Result<Option<ModelArtifact>> {
        let model_path = self.dir.join(MODEL_FILE);
        let scaler_path = self.dir.join(SCALER_FILE);
        if !model_path.exists() || !scaler_path.exists() {
            return Ok(None);
        }

        let model_bytes = fs::read(&model_path).context("Failed to read model file")?;
        let persisted: PersistedModel =
            bincode::deserialize(&model_bytes).context("Failed to decode model file")?;

        let scaler_json = fs::read_to_string(&scaler_path).context("Failed to read scaler file")?;
        let scaler: MinMaxScaler =
            serde_json::from_str(&scaler_json).context("Failed to parse scaler JSON")?;

        let metrics = self.load_metrics();

        info!("Loaded model artifact from {:?}", self.dir);
        Ok(Some(ModelArtifact {
            model: persisted.model,
            scaler,
            metrics,
            trained_at: persisted.trained_at,
        }))
    }

    /// Metrics are informational; a missing or unreadable file leaves them empty
    fn load_metrics(&self) -> Option<ModelMetrics> {
        let path = self.dir.join(METRICS_FILE);
        if !path.exists() {
            return None;
        }
        let parsed = fs::read_to_string(&path)
            .context("Failed to read metrics file")
            .and_then(|json| serde_json::from_str(&json).context("Failed to parse metrics JSON"));
        match parsed {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!("Ignoring metrics file {:?}: {:#}", path, e);
                None
            }
        }
    }
}

#[async_trait]
impl ArtifactRepository for FileArtifactStore {
    async fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let store = self.clone();
        let artifact = artifact.clone();
        tokio::task::spawn_blocking(move || store.save_sync(&artifact))
            .await
            .context("Artifact save task failed")?
    }

    async fn load(&self) -> Result<Option<ModelArtifact>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load_sync())
            .await
            .context("Artifact load task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ml::network::{ConvPadding, ModelConfig};
    use crate::domain::ml::{EpochStats, RegressionReport, TrainingHistory};
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_test_store() -> (FileArtifactStore, PathBuf) {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir().join(format!(
            "indexcast_test_{}_{}_{}_artifacts",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            unique_id
        ));
        (FileArtifactStore::new(temp_dir.join("saved_model")), temp_dir)
    }

    fn cleanup_test_dir(temp_dir: PathBuf) {
        fs::remove_dir_all(temp_dir).ok();
    }

    fn sample_artifact() -> ModelArtifact {
        let mut rng = StdRng::seed_from_u64(9);
        let model = ForecastModel::new(ModelConfig::new(10, ConvPadding::Same), &mut rng).unwrap();
        let mut history = TrainingHistory::default();
        history.push(EpochStats {
            loss: 0.01,
            mae: 0.05,
            rmse: 0.1,
            val_loss: 0.02,
            val_mae: 0.06,
            val_rmse: 0.02f64.sqrt(),
        });
        let report = RegressionReport::evaluate(&[100.0, 110.0], &[101.0, 108.0]);
        ModelArtifact::new(
            model,
            MinMaxScaler {
                min: 100.0,
                max: 300.0,
            },
            ModelMetrics::from_training(&report, &history),
        )
    }

    #[tokio::test]
    async fn test_load_empty_dir_returns_none() {
        let (store, temp_dir) = create_test_store();
        assert!(store.load().await.unwrap().is_none());
        cleanup_test_dir(temp_dir);
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let (store, temp_dir) = create_test_store();
        let artifact = sample_artifact();
        store.save(&artifact).await.unwrap();

        assert!(store.dir().join(MODEL_FILE).exists());
        assert!(!store.dir().join("model.tmp").exists());

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.scaler, artifact.scaler);
        assert_eq!(loaded.metrics, artifact.metrics);
        assert_eq!(loaded.trained_at, artifact.trained_at);
        assert_eq!(loaded.window_len(), 10);

        let input = Array2::from_shape_fn((2, 10), |(i, j)| (i + j) as f64 * 0.01);
        assert_eq!(loaded.model.predict(&input), artifact.model.predict(&input));
        cleanup_test_dir(temp_dir);
    }

    #[tokio::test]
    async fn test_missing_metrics_is_tolerated() {
        let (store, temp_dir) = create_test_store();
        store.save(&sample_artifact()).await.unwrap();
        fs::remove_file(store.dir().join(METRICS_FILE)).unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert!(loaded.metrics.is_none());
        cleanup_test_dir(temp_dir);
    }

    #[tokio::test]
    async fn test_corrupt_metrics_is_ignored_but_corrupt_model_fails() {
        let (store, temp_dir) = create_test_store();
        store.save(&sample_artifact()).await.unwrap();

        fs::write(store.dir().join(METRICS_FILE), "{not json").unwrap();
        assert!(store.load().await.unwrap().unwrap().metrics.is_none());

        fs::write(store.dir().join(MODEL_FILE), b"garbage").unwrap();
        assert!(store.load().await.is_err());
        cleanup_test_dir(temp_dir);
    }
}
