use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical field names understood by the pipeline.
pub mod fields {
    pub const CREDIT_SCORE: &str = "credit_score";
    pub const MONTHLY_INCOME: &str = "monthly_income";
    pub const AGE: &str = "age";
    pub const LOAN_AMOUNT: &str = "loan_amount";
    pub const PROPERTY_PRICE: &str = "property_price";
    pub const DOWN_PAYMENT: &str = "down_payment";
    pub const INTEREST_RATE: &str = "interest_rate";
    pub const LOAN_DURATION_MONTHS: &str = "loan_duration_months";
    pub const EMPLOYMENT_DURATION_MONTHS: &str = "employment_duration_months";
    pub const DOCUMENTS_SUBMITTED: &str = "documents_submitted";
    pub const DAYS_IN_PROCESS: &str = "days_in_process";
    pub const COMMUNICATION_FREQUENCY: &str = "communication_frequency";
    pub const EMPLOYMENT_STATUS: &str = "employment_status";
    pub const GENDER: &str = "gender";
    pub const MARITAL_STATUS: &str = "marital_status";
    pub const PRODUCT_TYPE: &str = "product_type";
}

/// Raw value supplied for an applicant field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Applicant data as handed over by a collaborator: a mapping of named fields to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl ApplicantRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_number(mut self, field: &str, value: f64) -> Self {
        self.insert(field, FieldValue::Number(value));
        self
    }

    pub fn with_text(mut self, field: &str, value: &str) -> Self {
        self.insert(field, FieldValue::Text(value.to_string()));
        self
    }

    pub fn insert(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_string(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reads an optional numeric field. Numeric text is accepted; anything else is rejected.
    pub fn number(&self, field: &str) -> Result<Option<f64>, InvalidRecordError> {
        let value = match self.fields.get(field) {
            None => return Ok(None),
            Some(FieldValue::Number(value)) => *value,
            Some(FieldValue::Text(raw)) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| InvalidRecordError::InvalidValue {
                        field: field.to_string(),
                        reason: format!("expected a number, found '{raw}'"),
                    })?
            }
        };

        if !value.is_finite() {
            return Err(InvalidRecordError::InvalidValue {
                field: field.to_string(),
                reason: "value must be finite".to_string(),
            });
        }

        Ok(Some(value))
    }

    pub fn require_number(&self, field: &str) -> Result<f64, InvalidRecordError> {
        self.number(field)?
            .ok_or_else(|| InvalidRecordError::MissingField {
                field: field.to_string(),
            })
    }

    /// Reads a categorical field; numbers are rendered as text.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            FieldValue::Text(value) => {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            FieldValue::Number(value) => Some(value.to_string()),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for ApplicantRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Raised when raw applicant input is malformed or lacks a required field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidRecordError {
    #[error("applicant record is missing required field '{field}'")]
    MissingField { field: String },
    #[error("applicant field '{field}' is invalid: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Historical decision recorded against an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationOutcome {
    Approved,
    Declined,
    Withdrawn,
    #[serde(rename = "In-Process")]
    InProcess,
}

impl ApplicationOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationOutcome::Approved => "Approved",
            ApplicationOutcome::Declined => "Declined",
            ApplicationOutcome::Withdrawn => "Withdrawn",
            ApplicationOutcome::InProcess => "In-Process",
        }
    }

    pub fn is_approved(self) -> bool {
        self == ApplicationOutcome::Approved
    }

    pub fn is_withdrawn(self) -> bool {
        self == ApplicationOutcome::Withdrawn
    }
}

impl fmt::Display for ApplicationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationOutcome {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "approved" => Ok(ApplicationOutcome::Approved),
            "declined" | "denied" | "rejected" => Ok(ApplicationOutcome::Declined),
            "withdrawn" => Ok(ApplicationOutcome::Withdrawn),
            "inprocess" | "pending" => Ok(ApplicationOutcome::InProcess),
            _ => Err(format!("unknown application status '{value}'")),
        }
    }
}

/// Labelled historical application used for training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    #[serde(rename = "status")]
    pub outcome: ApplicationOutcome,
    pub record: ApplicantRecord,
}

impl TrainingRecord {
    pub fn new(record: ApplicantRecord, outcome: ApplicationOutcome) -> Self {
        Self { outcome, record }
    }
}
