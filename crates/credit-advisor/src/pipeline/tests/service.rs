use std::sync::Arc;
use std::thread;

use super::common::*;

use crate::pipeline::artifact::{ArtifactStore, ModelRegistry};
use crate::pipeline::completeness::CompletenessStatus;
use crate::pipeline::domain::{fields, ApplicationOutcome};
use crate::pipeline::recommendations::RecommendationCategory;
use crate::pipeline::scoring::ScorerKind;
use crate::pipeline::service::{
    AssessmentError, AssessmentRequest, CreditAssessmentService, ModelUpdateError,
};
use crate::pipeline::training::{BoostingParams, TrainingError};

#[test]
fn assessment_with_published_model_reports_its_version() {
    let service = service_with_model();
    let assessment = service
        .assess_with_entropy(&request(&["doc_id", "doc_salary"]))
        .expect("assessment succeeds");

    assert_eq!(assessment.model_version.as_deref(), Some(FIXTURE_VERSION));
    assert_eq!(assessment.scores.scorer, ScorerKind::Model);
    assert!(!assessment.scores.used_fallback);
    assert!((assessment.features.ltv_ratio - 0.857).abs() < 1e-3);
    assert_eq!(assessment.completeness.score, 40.0);
    assert_eq!(assessment.completeness.status, CompletenessStatus::Incomplete);
    assert!(assessment
        .recommendations
        .iter()
        .any(|rec| rec.category == RecommendationCategory::DocumentRequest));
}

#[test]
fn assessment_without_model_uses_rules() {
    let service = service_without_model();
    let assessment = service
        .assess_with_entropy(&request(&[]))
        .expect("assessment succeeds");

    assert!(assessment.model_version.is_none());
    assert!(assessment.scores.used_fallback);
    assert!(assessment
        .recommendations
        .iter()
        .any(|rec| rec.message.contains("rule-based")));
}

#[test]
fn seeded_service_repeats_assessments() {
    let service = service_without_model();
    let mut record = request(&["doc_id"]);
    record.record.remove(fields::INTEREST_RATE);

    let first = service.assess_with_entropy(&record).expect("assesses");
    let second = service.assess_with_entropy(&record).expect("assesses");
    assert_eq!(first, second);
    assert!(first.features.interest_rate_estimated);
}

#[test]
fn invalid_record_is_reported_before_scoring() {
    let service = service_with_model();
    let mut bad = request(&[]);
    bad.record.remove(fields::MONTHLY_INCOME);

    let result = service.assess(&bad, &mut seeded(1));
    assert!(matches!(result, Err(AssessmentError::InvalidRecord(_))));
}

#[test]
fn model_expecting_unknown_feature_surfaces_error() {
    let needs_age = artifact_with_features(&[fields::CREDIT_SCORE, fields::AGE], 0.8);
    let service = CreditAssessmentService::new(registry_with(needs_age));
    let bare = AssessmentRequest {
        record: applicant(),
        submitted_documents: Vec::new(),
    };

    let result = service.assess(&bare, &mut seeded(1));
    assert!(matches!(result, Err(AssessmentError::MissingFeature(_))));
}

#[test]
fn training_publishes_and_persists_artifact() {
    let dir = scratch_dir("service");
    let path = dir.path().join("model.json");
    let registry = Arc::new(ModelRegistry::new());
    let service =
        CreditAssessmentService::new(Arc::clone(&registry)).with_store(ArtifactStore::new(&path));

    let mut options = service.training_options().with_source("unit");
    options.params = BoostingParams {
        n_estimators: 20,
        ..BoostingParams::default()
    };
    let report = service
        .train(&sample_batch(120), &options)
        .expect("training succeeds");

    assert_eq!(report.train_size + report.test_size, 120);
    assert_eq!(report.persisted_to, Some(path.display().to_string()));
    assert!(path.exists());
    assert_eq!(
        service.model_metadata().map(|metadata| metadata.version),
        Some(report.metadata.version.clone())
    );

    let reloaded = CreditAssessmentService::new(Arc::new(ModelRegistry::new()))
        .with_store(ArtifactStore::new(&path));
    assert!(reloaded.restore().expect("restore succeeds"));
    assert_eq!(
        reloaded.model_metadata().map(|metadata| metadata.source),
        Some("unit".to_string())
    );
}

#[test]
fn concurrent_training_keeps_disk_and_registry_in_step() {
    let dir = scratch_dir("concurrent");
    let path = dir.path().join("model.json");
    let service = Arc::new(
        CreditAssessmentService::new(Arc::new(ModelRegistry::new()))
            .with_store(ArtifactStore::new(&path)),
    );

    for round in 0..4 {
        let handles: Vec<_> = [(200usize, "first"), (260, "second")]
            .into_iter()
            .map(|(size, source)| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    let mut options = service
                        .training_options()
                        .with_source(format!("{source}-{round}"));
                    options.params = BoostingParams {
                        n_estimators: 10,
                        ..BoostingParams::default()
                    };
                    service.train(&sample_batch(size), &options)
                })
            })
            .collect();

        for handle in handles {
            let report = handle
                .join()
                .expect("training thread completes")
                .expect("concurrent training succeeds");
            assert_eq!(report.persisted_to, Some(path.display().to_string()));
        }

        let on_disk = ArtifactStore::new(&path).load().expect("stored artifact loads");
        let served = service.model_metadata().expect("artifact published");
        assert_eq!(on_disk.metadata.source, served.source);
        assert_eq!(on_disk.metadata.record_count, served.record_count);
    }

    let leftovers = std::fs::read_dir(dir.path())
        .expect("store directory exists")
        .count();
    assert_eq!(leftovers, 1);
}

#[test]
fn failed_training_keeps_previous_model() {
    let service = service_with_model();
    let result = service.train(
        &uniform_batch(4, ApplicationOutcome::Declined),
        &service.training_options(),
    );

    assert!(matches!(
        result,
        Err(ModelUpdateError::Training(TrainingError::InsufficientData(_)))
    ));
    assert_eq!(
        service.model_metadata().map(|metadata| metadata.version),
        Some(FIXTURE_VERSION.to_string())
    );
}

#[test]
fn restore_without_store_is_a_no_op() {
    let service = service_without_model();
    assert!(!service.restore().expect("nothing to restore"));
    assert!(service.model_metadata().is_none());
}

#[test]
fn completeness_ignores_scoring() {
    let report = service_without_model().completeness(["doc_id", "doc_salary", "doc_bank_statement"]);
    assert_eq!(report.status, CompletenessStatus::ReadyForReview);
}
