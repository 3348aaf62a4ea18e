use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use crate::pipeline::artifact::{ArtifactMetadata, ModelArtifact, ModelMetrics, ModelRegistry};
use crate::pipeline::domain::{fields, ApplicantRecord, ApplicationOutcome, TrainingRecord};
use crate::pipeline::features::{EngineeredFeatures, FeatureEngineer, FeatureKind};
use crate::pipeline::sample::generate_batch;
use crate::pipeline::service::{AssessmentRequest, CreditAssessmentService};
use crate::pipeline::training::gbdt::{GradientBoostedClassifier, RegressionTree, TreeNode};
use crate::pipeline::training::preprocess::{FeatureSpec, Preprocessor};
use crate::pipeline::training::BoostingParams;

pub(super) const FIXTURE_VERSION: &str = "20250101_090000";

pub(super) fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Salaried applicant used across the scenarios: 300k loan on a 350k property over 20 years.
pub(super) fn applicant() -> ApplicantRecord {
    ApplicantRecord::new()
        .with_number(fields::CREDIT_SCORE, 720.0)
        .with_number(fields::MONTHLY_INCOME, 45_000.0)
        .with_number(fields::LOAN_AMOUNT, 300_000.0)
        .with_number(fields::PROPERTY_PRICE, 350_000.0)
        .with_number(fields::LOAN_DURATION_MONTHS, 240.0)
        .with_number(fields::INTEREST_RATE, 6.0)
}

/// Same applicant with the optional profile fields filled in.
pub(super) fn detailed_applicant() -> ApplicantRecord {
    applicant()
        .with_number(fields::AGE, 38.0)
        .with_number(fields::EMPLOYMENT_DURATION_MONTHS, 48.0)
        .with_number(fields::DOCUMENTS_SUBMITTED, 5.0)
        .with_number(fields::DAYS_IN_PROCESS, 12.0)
        .with_number(fields::COMMUNICATION_FREQUENCY, 2.0)
        .with_text(fields::EMPLOYMENT_STATUS, "Employed")
        .with_text(fields::PRODUCT_TYPE, "Mortgage")
}

pub(super) fn engineer(record: &ApplicantRecord) -> EngineeredFeatures {
    FeatureEngineer::default()
        .engineer(record, &mut seeded(7))
        .expect("fixture record engineers")
}

fn weaker_applicant() -> ApplicantRecord {
    applicant()
        .with_number(fields::CREDIT_SCORE, 600.0)
        .with_number(fields::MONTHLY_INCOME, 20_000.0)
        .with_number(fields::PROPERTY_PRICE, 310_000.0)
}

fn numeric_spec(name: &str) -> FeatureSpec {
    FeatureSpec {
        name: name.to_string(),
        kind: FeatureKind::Numeric,
    }
}

pub(super) fn metrics(accuracy: f64) -> ModelMetrics {
    ModelMetrics {
        accuracy,
        precision: 0.74,
        recall: 0.69,
        f1: 0.71,
        auc: 0.78,
        cv_accuracy: None,
        cv_std_accuracy: None,
    }
}

/// Artifact whose approval head favours above-average credit scores.
pub(super) fn artifact_with_features(features: &[&str], approval_accuracy: f64) -> ModelArtifact {
    let strong = engineer(&detailed_applicant());
    let weak = engineer(&weaker_applicant().with_number(fields::AGE, 52.0));
    let specs: Vec<FeatureSpec> = features.iter().map(|name| numeric_spec(name)).collect();
    let preprocessor =
        Preprocessor::fit(&specs, &[&strong, &weak]).expect("fixture rows carry every feature");

    let approval_stump = RegressionTree::new(vec![
        TreeNode::Split {
            feature: 0,
            threshold: 0.0,
            left: 1,
            right: 2,
        },
        TreeNode::Leaf { value: -1.5 },
        TreeNode::Leaf { value: 1.5 },
    ]);

    ModelArtifact {
        metadata: ArtifactMetadata {
            version: FIXTURE_VERSION.to_string(),
            trained_at: Utc
                .with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
            source: "fixture".to_string(),
            record_count: 240,
            approval: metrics(approval_accuracy),
            withdrawal: metrics(0.81),
            feature_list: preprocessor.feature_list(),
            used_fallback_split: false,
            hyperparameters: BoostingParams::default(),
        },
        preprocessor,
        approval_model: GradientBoostedClassifier::from_parts(0.0, 1.0, vec![approval_stump]),
        withdrawal_model: GradientBoostedClassifier::from_parts(
            -1.0,
            1.0,
            vec![RegressionTree::leaf(-0.5)],
        ),
    }
}

pub(super) fn artifact(approval_accuracy: f64) -> ModelArtifact {
    artifact_with_features(
        &[fields::CREDIT_SCORE, "dti_ratio", "ltv_ratio"],
        approval_accuracy,
    )
}

pub(super) fn registry_with(artifact: ModelArtifact) -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::with_artifact(artifact))
}

pub(super) fn service_with_model() -> CreditAssessmentService {
    CreditAssessmentService::new(registry_with(artifact(0.82))).with_rng_seed(11)
}

pub(super) fn service_without_model() -> CreditAssessmentService {
    CreditAssessmentService::new(Arc::new(ModelRegistry::new())).with_rng_seed(11)
}

pub(super) fn request(documents: &[&str]) -> AssessmentRequest {
    AssessmentRequest {
        record: detailed_applicant(),
        submitted_documents: documents.iter().map(|doc| doc.to_string()).collect(),
    }
}

pub(super) fn sample_batch(count: usize) -> Vec<TrainingRecord> {
    generate_batch(count, 42)
}

pub(super) fn uniform_batch(count: usize, outcome: ApplicationOutcome) -> Vec<TrainingRecord> {
    generate_batch(count, 5)
        .into_iter()
        .map(|item| TrainingRecord::new(item.record, outcome))
        .collect()
}

/// Fresh directory under the system temp dir; callers remove it when done.
pub(super) fn scratch_dir(label: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("credit-advisor-{label}-"))
        .tempdir()
        .expect("scratch dir created")
}
