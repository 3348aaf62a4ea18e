mod rules;

use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::artifact::{ArtifactMetadata, ModelArtifact};
use super::features::EngineeredFeatures;
use super::rates::jitter;

pub use super::features::MissingFeatureError;

pub const DEFAULT_OVERFIT_THRESHOLD: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    Model,
    RuleBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFactor {
    CreditScore,
    DebtToIncome,
    Income,
    EmploymentStability,
    LoanToValue,
    ProcessingDelay,
    Documentation,
    Communication,
    Age,
    Variation,
}

/// Discrete point adjustment made by the rule-based scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: RuleFactor,
    pub points: f64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub approval_probability: f64,
    pub withdrawal_risk: f64,
    pub used_fallback: bool,
    pub scorer: ScorerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approval_factors: Vec<ScoreComponent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub withdrawal_factors: Vec<ScoreComponent>,
}

/// Produces approval and withdrawal probabilities for one feature set.
pub trait Scorer: Send + Sync {
    fn kind(&self) -> ScorerKind;

    fn score(
        &self,
        features: &EngineeredFeatures,
        rng: &mut dyn RngCore,
    ) -> Result<ScoreOutcome, MissingFeatureError>;
}

/// Runs both classifier heads of a trained artifact.
#[derive(Debug, Clone)]
pub struct ModelScorer {
    artifact: Arc<ModelArtifact>,
}

impl ModelScorer {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

impl Scorer for ModelScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::Model
    }

    fn score(
        &self,
        features: &EngineeredFeatures,
        _rng: &mut dyn RngCore,
    ) -> Result<ScoreOutcome, MissingFeatureError> {
        let row = self.artifact.preprocessor.transform(features)?;

        Ok(ScoreOutcome {
            approval_probability: self.artifact.approval_model.predict_proba(&row),
            withdrawal_risk: self.artifact.withdrawal_model.predict_proba(&row),
            used_fallback: false,
            scorer: ScorerKind::Model,
            approval_factors: Vec::new(),
            withdrawal_factors: Vec::new(),
        })
    }
}

/// Point table settings for one rule-based head, in points out of 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHeadConfig {
    pub baseline: f64,
    pub jitter: f64,
    pub floor: f64,
    pub ceiling: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub approval: RuleHeadConfig,
    pub withdrawal: RuleHeadConfig,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            approval: RuleHeadConfig {
                baseline: 50.0,
                jitter: 5.0,
                floor: 5.0,
                ceiling: 95.0,
            },
            withdrawal: RuleHeadConfig {
                baseline: 25.0,
                jitter: 3.0,
                floor: 5.0,
                ceiling: 80.0,
            },
        }
    }
}

/// Heuristic scorer used whenever no trustworthy model is available.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedScorer {
    config: RuleConfig,
}

impl RuleBasedScorer {
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    fn head(
        config: &RuleHeadConfig,
        (mut components, points): (Vec<ScoreComponent>, f64),
        rng: &mut dyn RngCore,
    ) -> (f64, Vec<ScoreComponent>) {
        let variation = jitter(rng, config.jitter);
        if variation != 0.0 {
            components.push(ScoreComponent {
                factor: RuleFactor::Variation,
                points: variation,
                notes: format!("uncertainty within ±{:.0} points", config.jitter),
            });
        }

        let total = (config.baseline + points + variation).clamp(config.floor, config.ceiling);
        (total / 100.0, components)
    }
}

impl Scorer for RuleBasedScorer {
    fn kind(&self) -> ScorerKind {
        ScorerKind::RuleBased
    }

    fn score(
        &self,
        features: &EngineeredFeatures,
        rng: &mut dyn RngCore,
    ) -> Result<ScoreOutcome, MissingFeatureError> {
        let (approval_probability, approval_factors) = Self::head(
            &self.config.approval,
            rules::approval_points(features),
            rng,
        );
        let (withdrawal_risk, withdrawal_factors) = Self::head(
            &self.config.withdrawal,
            rules::withdrawal_points(features),
            rng,
        );

        Ok(ScoreOutcome {
            approval_probability,
            withdrawal_risk,
            used_fallback: true,
            scorer: ScorerKind::RuleBased,
            approval_factors,
            withdrawal_factors,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Conservative accuracy at or above which a model is treated as overfit.
    pub overfit_accuracy_threshold: f64,
    pub rules: RuleConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            overfit_accuracy_threshold: DEFAULT_OVERFIT_THRESHOLD,
            rules: RuleConfig::default(),
        }
    }
}

/// Chooses between the model scorer and the rule-based fallback.
#[derive(Debug, Clone, Default)]
pub struct OverfitGuard {
    config: GuardConfig,
}

impl OverfitGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn is_degenerate(&self, metadata: &ArtifactMetadata) -> bool {
        metadata.peak_accuracy() >= self.config.overfit_accuracy_threshold
    }

    pub fn select(&self, artifact: Option<Arc<ModelArtifact>>) -> Box<dyn Scorer> {
        match artifact {
            Some(artifact) if !self.is_degenerate(&artifact.metadata) => {
                debug!(version = %artifact.metadata.version, "scoring with trained model");
                Box::new(ModelScorer::new(artifact))
            }
            Some(artifact) => {
                warn!(
                    version = %artifact.metadata.version,
                    approval_accuracy = artifact.metadata.approval.conservative_accuracy(),
                    withdrawal_accuracy = artifact.metadata.withdrawal.conservative_accuracy(),
                    threshold = self.config.overfit_accuracy_threshold,
                    "model accuracy suggests overfitting; using rule-based scorer"
                );
                Box::new(RuleBasedScorer::new(self.config.rules.clone()))
            }
            None => {
                debug!("no trained model available; using rule-based scorer");
                Box::new(RuleBasedScorer::new(self.config.rules.clone()))
            }
        }
    }
}

/// Scores with the default guard and a thread-local RNG.
pub fn score(
    features: &EngineeredFeatures,
    artifact: Option<Arc<ModelArtifact>>,
) -> Result<ScoreOutcome, MissingFeatureError> {
    OverfitGuard::default()
        .select(artifact)
        .score(features, &mut rand::rng())
}
