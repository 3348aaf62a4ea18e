use std::sync::{Arc, Mutex};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::artifact::{ArtifactError, ArtifactMetadata, ArtifactStore, ModelRegistry};
use super::completeness::{CompletenessReport, DocumentRequirements};
use super::domain::{ApplicantRecord, InvalidRecordError, TrainingRecord};
use super::features::{EngineeredFeatures, FeatureEngineer, MissingFeatureError};
use super::recommendations::{AssessmentScores, Recommendation, RecommendationEngine};
use super::scoring::{OverfitGuard, ScoreOutcome};
use super::training::{self, TrainingError, TrainingOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub record: ApplicantRecord,
    #[serde(default)]
    pub submitted_documents: Vec<String>,
}

/// Full result of assessing one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub features: EngineeredFeatures,
    pub scores: ScoreOutcome,
    pub completeness: CompletenessReport,
    pub recommendations: Vec<Recommendation>,
    pub model_version: Option<String>,
}

/// Summary of a training run that produced the currently published artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub metadata: ArtifactMetadata,
    pub train_size: usize,
    pub test_size: usize,
    pub elapsed_ms: u64,
    pub persisted_to: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecordError),
    #[error(transparent)]
    MissingFeature(#[from] MissingFeatureError),
}

#[derive(Debug, thiserror::Error)]
pub enum ModelUpdateError {
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Service composing feature engineering, scoring, completeness, and recommendations.
pub struct CreditAssessmentService {
    engineer: FeatureEngineer,
    documents: DocumentRequirements,
    guard: OverfitGuard,
    recommendations: RecommendationEngine,
    registry: Arc<ModelRegistry>,
    store: Option<ArtifactStore>,
    rng_seed: Option<u64>,
    publication: Mutex<()>,
}

impl CreditAssessmentService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            engineer: FeatureEngineer::default(),
            documents: DocumentRequirements::standard(),
            guard: OverfitGuard::default(),
            recommendations: RecommendationEngine::default(),
            registry,
            store: None,
            rng_seed: None,
            publication: Mutex::new(()),
        }
    }

    pub fn with_engineer(mut self, engineer: FeatureEngineer) -> Self {
        self.engineer = engineer;
        self
    }

    pub fn with_guard(mut self, guard: OverfitGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_documents(mut self, documents: DocumentRequirements) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_recommendations(mut self, recommendations: RecommendationEngine) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Every assessment draws from a fresh RNG seeded with `seed`.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    /// Loads the persisted artifact, if any, into the registry.
    pub fn restore(&self) -> Result<bool, ArtifactError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };

        match store.load_if_present()? {
            Some(artifact) => {
                let _publication = self
                    .publication
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                self.registry.publish(artifact);
                Ok(true)
            }
            None => {
                info!(path = %store.path().display(), "no persisted model artifact found");
                Ok(false)
            }
        }
    }

    /// Assess an application using the configured seed, or thread entropy when unseeded.
    pub fn assess_with_entropy(
        &self,
        request: &AssessmentRequest,
    ) -> Result<Assessment, AssessmentError> {
        match self.rng_seed {
            Some(seed) => self.assess(request, &mut StdRng::seed_from_u64(seed)),
            None => self.assess(request, &mut rand::rng()),
        }
    }

    pub fn assess(
        &self,
        request: &AssessmentRequest,
        rng: &mut dyn RngCore,
    ) -> Result<Assessment, AssessmentError> {
        let features = self.engineer.engineer(&request.record, rng)?;

        let artifact = self.registry.current();
        let model_version = artifact
            .as_ref()
            .map(|artifact| artifact.metadata.version.clone());
        let scorer = self.guard.select(artifact);
        let scores = scorer.score(&features, rng)?;

        let completeness = self.documents.evaluate(&request.submitted_documents);
        let recommendations = self.recommendations.recommend(
            &AssessmentScores::new(&scores, completeness.clone()),
            &features,
        );

        if features.low_confidence() {
            warn!(
                guards = features.guards.len(),
                "assessment computed with sentinel ratios"
            );
        }
        info!(
            scorer = ?scores.scorer,
            approval = scores.approval_probability,
            withdrawal = scores.withdrawal_risk,
            completeness = completeness.score,
            recommendations = recommendations.len(),
            "assessment completed"
        );

        Ok(Assessment {
            features,
            scores,
            completeness,
            recommendations,
            model_version,
        })
    }

    pub fn completeness<I, S>(&self, submitted: I) -> CompletenessReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.documents.evaluate(submitted)
    }

    pub fn model_metadata(&self) -> Option<ArtifactMetadata> {
        self.registry
            .current()
            .map(|artifact| artifact.metadata.clone())
    }

    /// Training options pre-filled with this service's feature engineer.
    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            engineer: self.engineer.clone(),
            ..TrainingOptions::default()
        }
    }

    /// Trains on `batch`, persists the artifact when a store is configured, then publishes it.
    ///
    /// Fitting runs unlocked; saving and publishing happen under one lock so the stored file
    /// and the served artifact always come from the same run.
    pub fn train(
        &self,
        batch: &[TrainingRecord],
        options: &TrainingOptions,
    ) -> Result<TrainingReport, ModelUpdateError> {
        let started = Instant::now();
        let outcome = training::train(batch, options)?;

        let _publication = self
            .publication
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let persisted_to = match &self.store {
            Some(store) => {
                store.save(&outcome.artifact)?;
                Some(store.path().display().to_string())
            }
            None => None,
        };

        let metadata = outcome.artifact.metadata.clone();
        self.registry.publish(outcome.artifact);

        Ok(TrainingReport {
            metadata,
            train_size: outcome.train_size,
            test_size: outcome.test_size,
            elapsed_ms: started.elapsed().as_millis() as u64,
            persisted_to,
        })
    }
}
