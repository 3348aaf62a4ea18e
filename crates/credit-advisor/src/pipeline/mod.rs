//! Scoring and decision pipeline for credit applications.
//!
//! A request flows through [`FeatureEngineer`], then a [`Scorer`] chosen by [`OverfitGuard`]
//! together with the [`DocumentRequirements`] completeness check, and finally the
//! [`RecommendationEngine`]. Training produces a [`ModelArtifact`] that callers publish
//! through a [`ModelRegistry`].

pub mod artifact;
pub mod completeness;
pub mod domain;
pub mod features;
pub mod import;
pub mod rates;
pub mod recommendations;
pub mod router;
pub mod sample;
pub mod scoring;
pub mod service;
pub mod training;

#[cfg(test)]
mod tests;

pub use artifact::{
    ArtifactError, ArtifactMetadata, ArtifactStore, ModelArtifact, ModelMetrics, ModelRegistry,
};
pub use completeness::{
    evaluate_completeness, CompletenessReport, CompletenessStatus, DocumentPriority,
    DocumentRequirements, MissingDocument,
};
pub use domain::{
    ApplicantRecord, ApplicationOutcome, FieldValue, InvalidRecordError, TrainingRecord,
};
pub use features::{
    engineer_features, monthly_payment, CreditRiskCategory, DivisionGuard, EngineeredFeatures,
    FeatureEngineer, FeatureKind, FeatureValue,
};
pub use import::{ImportError, TrainingBatchImporter};
pub use rates::{InterestRateEstimator, RateConfig};
pub use recommendations::{
    recommend, AssessmentScores, Priority, Recommendation, RecommendationCategory,
    RecommendationEngine, RecommendationThresholds,
};
pub use router::assessment_router;
pub use sample::{generate_batch, SampleGenerator};
pub use scoring::{
    score, GuardConfig, MissingFeatureError, ModelScorer, OverfitGuard, RuleBasedScorer,
    RuleConfig, RuleFactor, ScoreComponent, ScoreOutcome, Scorer, ScorerKind,
};
pub use service::{
    Assessment, AssessmentError, AssessmentRequest, CreditAssessmentService, ModelUpdateError,
    TrainingReport,
};
pub use training::{
    train, BoostingParams, CancellationToken, ClassWeight, InsufficientDataError, TrainingError,
    TrainingOptions, TrainingOutcome,
};
