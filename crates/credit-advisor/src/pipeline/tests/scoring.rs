use std::sync::Arc;

use super::common::*;

use crate::pipeline::domain::{fields, ApplicantRecord};
use crate::pipeline::scoring::{
    GuardConfig, MissingFeatureError, ModelScorer, OverfitGuard, RuleBasedScorer, RuleConfig,
    RuleFactor, Scorer, ScorerKind,
};

#[test]
fn trustworthy_model_scores_without_fallback() {
    let features = engineer(&applicant());
    let scorer = OverfitGuard::default().select(Some(Arc::new(artifact(0.82))));

    let outcome = scorer.score(&features, &mut seeded(1)).expect("model scores");

    assert_eq!(outcome.scorer, ScorerKind::Model);
    assert!(!outcome.used_fallback);
    assert!((outcome.approval_probability - 0.8176).abs() < 1e-3);
    assert!((outcome.withdrawal_risk - 0.1824).abs() < 1e-3);
    assert!(outcome.approval_factors.is_empty());
}

#[test]
fn weaker_credit_lands_on_the_other_branch() {
    let features = engineer(&applicant().with_number(fields::CREDIT_SCORE, 610.0));
    let outcome = ModelScorer::new(Arc::new(artifact(0.82)))
        .score(&features, &mut seeded(1))
        .expect("model scores");
    assert!(outcome.approval_probability < 0.5);
}

#[test]
fn near_perfect_accuracy_falls_back_to_rules() {
    let guard = OverfitGuard::default();
    let suspicious = artifact(0.995);
    assert!(guard.is_degenerate(&suspicious.metadata));

    let outcome = guard
        .select(Some(Arc::new(suspicious)))
        .score(&engineer(&applicant()), &mut seeded(2))
        .expect("rules score");

    assert_eq!(outcome.scorer, ScorerKind::RuleBased);
    assert!(outcome.used_fallback);
}

#[test]
fn degenerate_model_falls_back_for_every_input() {
    let scorer = OverfitGuard::default().select(Some(Arc::new(artifact(0.995))));
    let inputs = [
        applicant(),
        detailed_applicant(),
        applicant()
            .with_number(fields::CREDIT_SCORE, 540.0)
            .with_number(fields::MONTHLY_INCOME, 9_000.0),
        applicant().with_number(fields::PROPERTY_PRICE, 0.0),
        applicant().with_number(fields::MONTHLY_INCOME, 0.0),
        applicant().with_text(fields::EMPLOYMENT_STATUS, "Astronaut"),
        ApplicantRecord::new()
            .with_number(fields::CREDIT_SCORE, 810.0)
            .with_number(fields::MONTHLY_INCOME, 120_000.0)
            .with_number(fields::LOAN_AMOUNT, 150_000.0)
            .with_number(fields::PROPERTY_PRICE, 600_000.0)
            .with_number(fields::LOAN_DURATION_MONTHS, 120.0),
    ];

    for (idx, record) in inputs.iter().enumerate() {
        for seed in 0..3 {
            let outcome = scorer
                .score(&engineer(record), &mut seeded(seed))
                .expect("rules score any engineered record");
            assert!(outcome.used_fallback, "input {idx} seed {seed}");
            assert_eq!(outcome.scorer, ScorerKind::RuleBased);
        }
    }
}

#[test]
fn lucky_holdout_defers_to_cross_validation() {
    let guard = OverfitGuard::default();

    let mut lucky = artifact(0.8);
    lucky.metadata.withdrawal.accuracy = 1.0;
    lucky.metadata.withdrawal.cv_accuracy = Some(0.84);
    assert!(!guard.is_degenerate(&lucky.metadata));
    assert_eq!(
        guard.select(Some(Arc::new(lucky))).kind(),
        ScorerKind::Model
    );

    let mut memorized = artifact(0.8);
    memorized.metadata.withdrawal.accuracy = 1.0;
    memorized.metadata.withdrawal.cv_accuracy = Some(0.995);
    assert!(guard.is_degenerate(&memorized.metadata));

    let mut consistent = artifact(0.8);
    consistent.metadata.approval.accuracy = 0.995;
    consistent.metadata.approval.cv_accuracy = Some(0.93);
    assert!(guard.is_degenerate(&consistent.metadata));
}

#[test]
fn perfect_withdrawal_head_also_trips_guard() {
    let mut suspicious = artifact(0.8);
    suspicious.metadata.withdrawal.accuracy = 1.0;
    assert!(OverfitGuard::default().is_degenerate(&suspicious.metadata));
}

#[test]
fn guard_threshold_is_configurable() {
    let strict = OverfitGuard::new(GuardConfig {
        overfit_accuracy_threshold: 0.9,
        ..GuardConfig::default()
    });
    assert!(strict.is_degenerate(&artifact(0.92).metadata));
    assert_eq!(
        strict.select(Some(Arc::new(artifact(0.85)))).kind(),
        ScorerKind::Model
    );
}

#[test]
fn absent_model_uses_rules() {
    let scorer = OverfitGuard::default().select(None);
    assert_eq!(scorer.kind(), ScorerKind::RuleBased);

    let outcome = scorer
        .score(&engineer(&detailed_applicant()), &mut seeded(3))
        .expect("rules score");
    assert!(outcome.used_fallback);
    assert!(outcome
        .approval_factors
        .iter()
        .any(|component| component.factor == RuleFactor::CreditScore));
}

#[test]
fn rule_scores_stay_within_bounds() {
    let scorer = RuleBasedScorer::default();
    let strong = engineer(
        &detailed_applicant()
            .with_number(fields::CREDIT_SCORE, 820.0)
            .with_number(fields::MONTHLY_INCOME, 150_000.0),
    );
    let weak = engineer(
        &applicant()
            .with_number(fields::CREDIT_SCORE, 420.0)
            .with_number(fields::MONTHLY_INCOME, 2_000.0)
            .with_number(fields::EMPLOYMENT_DURATION_MONTHS, 2.0)
            .with_number(fields::DAYS_IN_PROCESS, 60.0)
            .with_number(fields::DOCUMENTS_SUBMITTED, 1.0)
            .with_number(fields::COMMUNICATION_FREQUENCY, 0.2),
    );

    let mut rng = seeded(4);
    for features in [&strong, &weak] {
        for _ in 0..50 {
            let outcome = scorer.score(features, &mut rng).expect("rules score");
            assert!((0.05..=0.95).contains(&outcome.approval_probability));
            assert!((0.05..=0.80).contains(&outcome.withdrawal_risk));
        }
    }

    let strong_outcome = scorer.score(&strong, &mut rng).expect("rules score");
    let weak_outcome = scorer.score(&weak, &mut rng).expect("rules score");
    assert!(strong_outcome.approval_probability > weak_outcome.approval_probability);
    assert!(strong_outcome.withdrawal_risk < weak_outcome.withdrawal_risk);
}

#[test]
fn rule_scores_repeat_under_same_seed() {
    let scorer = RuleBasedScorer::default();
    let features = engineer(&detailed_applicant());
    let first = scorer.score(&features, &mut seeded(8)).expect("rules score");
    let second = scorer.score(&features, &mut seeded(8)).expect("rules score");
    assert_eq!(first, second);
}

#[test]
fn jitter_free_rules_are_exact() {
    let mut config = RuleConfig::default();
    config.approval.jitter = 0.0;
    config.withdrawal.jitter = 0.0;
    let outcome = RuleBasedScorer::new(config)
        .score(&engineer(&applicant()), &mut seeded(0))
        .expect("rules score");

    // 50 baseline, +10 credit, +10 dti, +1 income, -3 ltv.
    assert!((outcome.approval_probability - 0.68).abs() < 1e-9);
    assert!(outcome
        .approval_factors
        .iter()
        .all(|component| component.factor != RuleFactor::Variation));
}

#[test]
fn unknown_debt_to_income_is_penalised() {
    let mut config = RuleConfig::default();
    config.approval.jitter = 0.0;
    config.withdrawal.jitter = 0.0;
    let scorer = RuleBasedScorer::new(config);

    let known = scorer
        .score(&engineer(&applicant()), &mut seeded(0))
        .expect("rules score");
    let unknown = scorer
        .score(
            &engineer(&applicant().with_number(fields::MONTHLY_INCOME, 0.0)),
            &mut seeded(0),
        )
        .expect("rules score");

    assert!(unknown.approval_probability < known.approval_probability);
    let dti = unknown
        .approval_factors
        .iter()
        .find(|component| component.factor == RuleFactor::DebtToIncome)
        .expect("dti component present");
    assert_eq!(dti.points, -25.0);
}

#[test]
fn model_missing_a_trained_feature_reports_it() {
    let needs_age = artifact_with_features(&[fields::CREDIT_SCORE, fields::AGE], 0.8);
    let result = ModelScorer::new(Arc::new(needs_age)).score(&engineer(&applicant()), &mut seeded(1));

    assert_eq!(
        result,
        Err(MissingFeatureError {
            feature: fields::AGE.to_string()
        })
    );
}
