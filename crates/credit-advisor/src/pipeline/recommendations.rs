use serde::{Deserialize, Serialize};

use super::completeness::{CompletenessReport, COMPLETE_SCORE, READY_FOR_REVIEW_THRESHOLD};
use super::features::EngineeredFeatures;
use super::scoring::ScoreOutcome;

/// Sort order is significant: risk mitigation first, strengths last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendationCategory {
    RiskMitigation,
    DocumentRequest,
    Underwriting,
    Strength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub message: String,
}

impl Recommendation {
    fn new(category: RecommendationCategory, priority: Priority, message: impl Into<String>) -> Self {
        Self {
            category,
            priority,
            message: message.into(),
        }
    }
}

/// Scores the recommendation rules read, alongside the engineered features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentScores {
    pub approval_probability: f64,
    pub withdrawal_risk: f64,
    pub used_fallback: bool,
    pub completeness: CompletenessReport,
}

impl AssessmentScores {
    pub fn new(outcome: &ScoreOutcome, completeness: CompletenessReport) -> Self {
        Self {
            approval_probability: outcome.approval_probability,
            withdrawal_risk: outcome.withdrawal_risk,
            used_fallback: outcome.used_fallback,
            completeness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationThresholds {
    pub high_dti: f64,
    pub healthy_dti: f64,
    pub critical_ltv: f64,
    pub elevated_ltv: f64,
    pub conservative_ltv: f64,
    pub fast_track_approval: f64,
    pub low_approval: f64,
    pub high_withdrawal: f64,
    pub elevated_withdrawal: f64,
    pub weak_credit_score: f64,
    pub strong_credit_score: f64,
    /// Contacts per week below which a cadence reminder is issued.
    pub min_communication_frequency: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            high_dti: 0.43,
            healthy_dti: 0.36,
            critical_ltv: 0.95,
            elevated_ltv: 0.90,
            conservative_ltv: 0.80,
            fast_track_approval: 0.8,
            low_approval: 0.5,
            high_withdrawal: 0.65,
            elevated_withdrawal: 0.5,
            weak_credit_score: 650.0,
            strong_credit_score: 700.0,
            min_communication_frequency: 1.0,
        }
    }
}

struct RuleContext<'a> {
    scores: &'a AssessmentScores,
    features: &'a EngineeredFeatures,
    limits: &'a RecommendationThresholds,
}

type Rule = fn(&RuleContext<'_>) -> Option<Recommendation>;

const RULES: &[Rule] = &[
    affordability,
    loan_to_value,
    missing_documents,
    fast_track,
    withdrawal_risk,
    weak_credit,
    low_approval,
    processing_delay,
    communication_cadence,
    strengths,
    low_confidence_inputs,
    fallback_scores,
];

fn affordability(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let dti = ctx.features.dti_ratio;
    (dti > ctx.limits.high_dti).then(|| {
        Recommendation::new(
            RecommendationCategory::RiskMitigation,
            Priority::High,
            format!(
                "Debt-to-income ratio of {:.1}% exceeds {:.0}%; review affordability or reduce the loan amount",
                dti * 100.0,
                ctx.limits.high_dti * 100.0
            ),
        )
    })
}

fn loan_to_value(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let ltv = ctx.features.ltv_ratio;
    if ltv > ctx.limits.critical_ltv {
        Some(Recommendation::new(
            RecommendationCategory::RiskMitigation,
            Priority::High,
            format!("Loan-to-value of {:.1}% is very high; request a larger down payment", ltv * 100.0),
        ))
    } else if ltv > ctx.limits.elevated_ltv {
        Some(Recommendation::new(
            RecommendationCategory::RiskMitigation,
            Priority::Medium,
            format!(
                "Loan-to-value of {:.1}% may require additional collateral",
                ltv * 100.0
            ),
        ))
    } else {
        None
    }
}

fn missing_documents(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let report = &ctx.scores.completeness;
    let missing: Vec<&str> = report
        .missing
        .iter()
        .map(|doc| doc.document.as_str())
        .collect();

    if report.score < READY_FOR_REVIEW_THRESHOLD {
        Some(Recommendation::new(
            RecommendationCategory::DocumentRequest,
            Priority::High,
            format!(
                "Document completeness at {:.1}% blocks review; collect {}",
                report.score,
                missing.join(", ")
            ),
        ))
    } else if report.score < COMPLETE_SCORE {
        Some(Recommendation::new(
            RecommendationCategory::DocumentRequest,
            Priority::Medium,
            format!("Collect remaining documents: {}", missing.join(", ")),
        ))
    } else {
        None
    }
}

fn fast_track(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    (ctx.scores.approval_probability > ctx.limits.fast_track_approval
        && ctx.scores.completeness.score >= COMPLETE_SCORE)
        .then(|| {
            Recommendation::new(
                RecommendationCategory::Strength,
                Priority::Medium,
                "Fast-track application for underwriting review",
            )
        })
}

fn withdrawal_risk(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let risk = ctx.scores.withdrawal_risk;
    if risk > ctx.limits.high_withdrawal {
        Some(Recommendation::new(
            RecommendationCategory::RiskMitigation,
            Priority::High,
            format!(
                "Withdrawal risk at {:.0}%; contact the applicant within 24 hours and assign a relationship manager",
                risk * 100.0
            ),
        ))
    } else if risk > ctx.limits.elevated_withdrawal {
        Some(Recommendation::new(
            RecommendationCategory::RiskMitigation,
            Priority::Medium,
            format!(
                "Elevated withdrawal risk at {:.0}%; schedule a follow-up with the applicant",
                risk * 100.0
            ),
        ))
    } else {
        None
    }
}

fn weak_credit(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let score = ctx.features.credit_score;
    (score < ctx.limits.weak_credit_score).then(|| {
        Recommendation::new(
            RecommendationCategory::Underwriting,
            Priority::High,
            format!("Credit score of {score:.0} may impact approval; verify credit history"),
        )
    })
}

fn low_approval(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    (ctx.scores.approval_probability < ctx.limits.low_approval).then(|| {
        Recommendation::new(
            RecommendationCategory::Underwriting,
            Priority::Medium,
            "Review financial requirements with the applicant and consider alternative financing",
        )
    })
}

fn processing_delay(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    ctx.features.long_processing.then(|| {
        let days = ctx.features.days_in_process.unwrap_or_default();
        Recommendation::new(
            RecommendationCategory::RiskMitigation,
            Priority::Medium,
            format!("Processing time of {days:.0} days increases withdrawal risk; expedite review"),
        )
    })
}

fn communication_cadence(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    ctx.features
        .communication_frequency
        .filter(|frequency| *frequency < ctx.limits.min_communication_frequency)
        .map(|_| {
            Recommendation::new(
                RecommendationCategory::RiskMitigation,
                Priority::Low,
                "Schedule weekly progress updates with the applicant",
            )
        })
}

fn strengths(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    let features = ctx.features;
    (!features.low_confidence()
        && features.credit_score >= ctx.limits.strong_credit_score
        && features.dti_ratio < ctx.limits.healthy_dti
        && features.ltv_ratio < ctx.limits.conservative_ltv)
        .then(|| {
            Recommendation::new(
                RecommendationCategory::Strength,
                Priority::Low,
                format!(
                    "Strong profile: credit score {:.0}, debt-to-income {:.1}%, loan-to-value {:.1}%",
                    features.credit_score,
                    features.dti_ratio * 100.0,
                    features.ltv_ratio * 100.0
                ),
            )
        })
}

fn low_confidence_inputs(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    ctx.features.low_confidence().then(|| {
        let fields: Vec<&str> = ctx
            .features
            .guards
            .iter()
            .map(|guard| guard.field.as_str())
            .collect();
        Recommendation::new(
            RecommendationCategory::Underwriting,
            Priority::High,
            format!(
                "Ratios could not be computed ({}); verify income and property value manually",
                fields.join(", ")
            ),
        )
    })
}

fn fallback_scores(ctx: &RuleContext<'_>) -> Option<Recommendation> {
    ctx.scores.used_fallback.then(|| {
        Recommendation::new(
            RecommendationCategory::Underwriting,
            Priority::Low,
            "Scores come from rule-based estimates rather than a trained model",
        )
    })
}

/// Applies every rule independently and orders the results by priority, then category.
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    thresholds: RecommendationThresholds,
}

impl RecommendationEngine {
    pub fn new(thresholds: RecommendationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RecommendationThresholds {
        &self.thresholds
    }

    pub fn recommend(
        &self,
        scores: &AssessmentScores,
        features: &EngineeredFeatures,
    ) -> Vec<Recommendation> {
        let ctx = RuleContext {
            scores,
            features,
            limits: &self.thresholds,
        };

        let mut recommendations: Vec<Recommendation> =
            RULES.iter().filter_map(|rule| rule(&ctx)).collect();
        recommendations.sort_by_key(|rec| (rec.priority, rec.category));
        recommendations
    }
}

pub fn recommend(scores: &AssessmentScores, features: &EngineeredFeatures) -> Vec<Recommendation> {
    RecommendationEngine::default().recommend(scores, features)
}
