use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use super::training::gbdt::GradientBoostedClassifier;
use super::training::preprocess::{FeatureSpec, Preprocessor};
use super::training::BoostingParams;

/// Hold-out accuracy exceeding the cross-validated mean by more than this is treated as luck.
pub const CV_OPTIMISM_MARGIN: f64 = 0.1;

/// Held-out evaluation of one classifier head, plus k-fold accuracy when folds could be built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv_std_accuracy: Option<f64>,
}

impl ModelMetrics {
    /// Hold-out accuracy, or the cross-validated mean when the hold-out beats it by more
    /// than [`CV_OPTIMISM_MARGIN`].
    pub fn conservative_accuracy(&self) -> f64 {
        match self.cv_accuracy {
            Some(cv) if self.accuracy > cv + CV_OPTIMISM_MARGIN => cv,
            _ => self.accuracy,
        }
    }
}

/// Training provenance stored next to the fitted parameters.
///
/// The approval head's metrics sit at the top level; the withdrawal head has its own block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub source: String,
    pub record_count: usize,
    #[serde(flatten)]
    pub approval: ModelMetrics,
    pub withdrawal: ModelMetrics,
    pub feature_list: Vec<FeatureSpec>,
    pub used_fallback_split: bool,
    pub hyperparameters: BoostingParams,
}

impl ArtifactMetadata {
    /// Highest conservative accuracy across both heads.
    pub fn peak_accuracy(&self) -> f64 {
        self.approval
            .conservative_accuracy()
            .max(self.withdrawal.conservative_accuracy())
    }
}

/// Immutable bundle produced by a training run and shared read-only across scoring calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ArtifactMetadata,
    pub preprocessor: Preprocessor,
    pub approval_model: GradientBoostedClassifier,
    pub withdrawal_model: GradientBoostedClassifier,
}

/// Holds the artifact currently served to scoring calls.
///
/// Readers clone the `Arc` and release the lock before scoring; `publish` replaces the
/// reference in one step so a reader sees either the old or the new artifact.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    current: RwLock<Option<Arc<ModelArtifact>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(artifact: ModelArtifact) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(artifact))),
        }
    }

    pub fn current(&self) -> Option<Arc<ModelArtifact>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swaps in a new artifact and returns the one it replaced.
    pub fn publish(&self, artifact: ModelArtifact) -> Option<Arc<ModelArtifact>> {
        let next = Arc::new(artifact);
        let version = next.metadata.version.clone();
        let previous = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(next);

        info!(
            %version,
            replaced = previous.is_some(),
            "model artifact published"
        );
        previous
    }

    pub fn clear(&self) -> Option<Arc<ModelArtifact>> {
        self.current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// JSON file persistence for artifacts. Each write lands in its own temp file in the target
/// directory and is renamed into place, so concurrent saves never share a staging file.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, artifact: &ModelArtifact) -> Result<(), ArtifactError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let staging = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(staging.as_file());
            serde_json::to_writer_pretty(&mut writer, artifact)?;
            writer.flush()?;
        }
        staging.as_file().sync_all()?;
        staging
            .persist(&self.path)
            .map_err(|err| ArtifactError::Io(err.error))?;

        info!(
            path = %self.path.display(),
            version = %artifact.metadata.version,
            "model artifact saved"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<ModelArtifact, ArtifactError> {
        let file = File::open(&self.path)?;
        let artifact: ModelArtifact = serde_json::from_reader(BufReader::new(file))?;
        info!(
            path = %self.path.display(),
            version = %artifact.metadata.version,
            records = artifact.metadata.record_count,
            "model artifact loaded"
        );
        Ok(artifact)
    }

    pub fn load_if_present(&self) -> Result<Option<ModelArtifact>, ArtifactError> {
        if self.path.exists() {
            self.load().map(Some)
        } else {
            Ok(None)
        }
    }
}
