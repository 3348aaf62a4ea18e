use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const CRITICAL_WEIGHT: f64 = 0.6;
pub const SUPPLEMENTARY_WEIGHT: f64 = 0.4;
pub const READY_FOR_REVIEW_THRESHOLD: f64 = 60.0;
pub const COMPLETE_SCORE: f64 = 100.0;

/// Lifecycle label derived from a completeness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessStatus {
    Incomplete,
    ReadyForReview,
    Complete,
}

impl CompletenessStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= COMPLETE_SCORE {
            CompletenessStatus::Complete
        } else if score >= READY_FOR_REVIEW_THRESHOLD {
            CompletenessStatus::ReadyForReview
        } else {
            CompletenessStatus::Incomplete
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            CompletenessStatus::Incomplete => "Incomplete",
            CompletenessStatus::ReadyForReview => "Ready for review",
            CompletenessStatus::Complete => "Complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPriority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentGroup {
    Critical,
    Supplementary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDocument {
    pub document: String,
    pub group: DocumentGroup,
    pub priority: DocumentPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub score: f64,
    pub status: CompletenessStatus,
    pub critical_submitted: usize,
    pub critical_total: usize,
    pub supplementary_submitted: usize,
    pub supplementary_total: usize,
    pub missing: Vec<MissingDocument>,
    /// Submitted identifiers that belong to neither group.
    pub unrecognized: Vec<String>,
}

/// Static document checklist split into weighted critical and supplementary groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequirements {
    pub critical: Vec<String>,
    pub supplementary: Vec<String>,
    pub critical_weight: f64,
    pub supplementary_weight: f64,
}

impl Default for DocumentRequirements {
    fn default() -> Self {
        Self::standard()
    }
}

impl DocumentRequirements {
    pub fn standard() -> Self {
        Self {
            critical: ["doc_id", "doc_salary", "doc_bank_statement"]
                .into_iter()
                .map(String::from)
                .collect(),
            supplementary: ["doc_tax_return", "doc_property_docs"]
                .into_iter()
                .map(String::from)
                .collect(),
            critical_weight: CRITICAL_WEIGHT,
            supplementary_weight: SUPPLEMENTARY_WEIGHT,
        }
    }

    pub fn all_documents(&self) -> impl Iterator<Item = &str> {
        self.critical
            .iter()
            .chain(self.supplementary.iter())
            .map(String::as_str)
    }

    pub fn evaluate<I, S>(&self, submitted: I) -> CompletenessReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let submitted: BTreeSet<String> = submitted
            .into_iter()
            .map(|doc| doc.as_ref().trim().to_string())
            .filter(|doc| !doc.is_empty())
            .collect();

        let critical_submitted = count_present(&self.critical, &submitted);
        let supplementary_submitted = count_present(&self.supplementary, &submitted);

        let weighted = group_fraction(critical_submitted, self.critical.len())
            * self.critical_weight
            + group_fraction(supplementary_submitted, self.supplementary.len())
                * self.supplementary_weight;
        let score = round_one_decimal(weighted * 100.0);

        let missing = self
            .critical
            .iter()
            .filter(|doc| !submitted.contains(doc.as_str()))
            .map(|doc| MissingDocument {
                document: doc.clone(),
                group: DocumentGroup::Critical,
                priority: DocumentPriority::High,
            })
            .chain(
                self.supplementary
                    .iter()
                    .filter(|doc| !submitted.contains(doc.as_str()))
                    .map(|doc| MissingDocument {
                        document: doc.clone(),
                        group: DocumentGroup::Supplementary,
                        priority: DocumentPriority::Medium,
                    }),
            )
            .collect();

        let unrecognized = submitted
            .iter()
            .filter(|doc| !self.all_documents().any(|known| known == doc.as_str()))
            .cloned()
            .collect();

        CompletenessReport {
            score,
            status: CompletenessStatus::from_score(score),
            critical_submitted,
            critical_total: self.critical.len(),
            supplementary_submitted,
            supplementary_total: self.supplementary.len(),
            missing,
            unrecognized,
        }
    }
}

fn count_present(required: &[String], submitted: &BTreeSet<String>) -> usize {
    required
        .iter()
        .filter(|doc| submitted.contains(doc.as_str()))
        .count()
}

fn group_fraction(present: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        present as f64 / total as f64
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Scores submitted documents against the standard checklist.
pub fn evaluate_completeness<I, S>(submitted: I) -> CompletenessReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DocumentRequirements::standard().evaluate(submitted)
}
