//! Repository abstraction for the trained model artifact.
//!
//! There is a single artifact identity: saving replaces whatever was stored.
//! The file-backed implementation lives in `infrastructure::persistence`; an
//! in-memory one in `infrastructure::mock` serves tests.

use crate::domain::ml::ModelArtifact;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Persist the artifact, replacing any previous one
    async fn save(&self, artifact: &ModelArtifact) -> Result<()>;

    /// Load the stored artifact, `None` when nothing usable has been saved
    async fn load(&self) -> Result<Option<ModelArtifact>>;
}
