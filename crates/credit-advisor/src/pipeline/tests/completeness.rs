use crate::pipeline::completeness::{
    evaluate_completeness, CompletenessStatus, DocumentGroup, DocumentPriority,
    DocumentRequirements,
};

#[test]
fn partial_critical_documents_are_incomplete() {
    let report = evaluate_completeness(["doc_id", "doc_salary"]);

    assert_eq!(report.score, 40.0);
    assert_eq!(report.status, CompletenessStatus::Incomplete);
    assert_eq!(report.critical_submitted, 2);
    assert_eq!(report.supplementary_submitted, 0);

    let missing: Vec<(&str, DocumentPriority)> = report
        .missing
        .iter()
        .map(|doc| (doc.document.as_str(), doc.priority))
        .collect();
    assert_eq!(
        missing,
        vec![
            ("doc_bank_statement", DocumentPriority::High),
            ("doc_tax_return", DocumentPriority::Medium),
            ("doc_property_docs", DocumentPriority::Medium),
        ]
    );
}

#[test]
fn critical_set_alone_is_ready_for_review() {
    let report = evaluate_completeness(["doc_id", "doc_salary", "doc_bank_statement"]);
    assert_eq!(report.score, 60.0);
    assert_eq!(report.status, CompletenessStatus::ReadyForReview);
    assert!(report
        .missing
        .iter()
        .all(|doc| doc.group == DocumentGroup::Supplementary));
}

#[test]
fn full_checklist_is_complete() {
    let requirements = DocumentRequirements::standard();
    let report = requirements.evaluate(requirements.all_documents());
    assert_eq!(report.score, 100.0);
    assert_eq!(report.status, CompletenessStatus::Complete);
    assert!(report.missing.is_empty());
}

#[test]
fn duplicates_and_unknown_ids_do_not_inflate_score() {
    let report = evaluate_completeness(["doc_id", "doc_id", " doc_id ", "doc_selfie", ""]);

    assert_eq!(report.critical_submitted, 1);
    assert_eq!(report.score, 20.0);
    assert_eq!(report.unrecognized, vec!["doc_selfie".to_string()]);
}

#[test]
fn nothing_submitted_scores_zero() {
    let report = evaluate_completeness(Vec::<String>::new());
    assert_eq!(report.score, 0.0);
    assert_eq!(report.status, CompletenessStatus::Incomplete);
    assert_eq!(report.missing.len(), 5);
}

#[test]
fn supplementary_only_scores_its_weight() {
    let report = evaluate_completeness(["doc_tax_return"]);
    assert_eq!(report.score, 20.0);
}

#[test]
fn custom_requirements_with_empty_group_contribute_nothing() {
    let requirements = DocumentRequirements {
        critical: vec!["doc_id".to_string()],
        supplementary: Vec::new(),
        ..DocumentRequirements::standard()
    };
    let report = requirements.evaluate(["doc_id"]);
    assert_eq!(report.score, 60.0);
    assert_eq!(report.supplementary_total, 0);
}

#[test]
fn status_thresholds_are_inclusive() {
    assert_eq!(CompletenessStatus::from_score(59.9), CompletenessStatus::Incomplete);
    assert_eq!(CompletenessStatus::from_score(60.0), CompletenessStatus::ReadyForReview);
    assert_eq!(CompletenessStatus::from_score(99.9), CompletenessStatus::ReadyForReview);
    assert_eq!(CompletenessStatus::from_score(100.0), CompletenessStatus::Complete);
}
