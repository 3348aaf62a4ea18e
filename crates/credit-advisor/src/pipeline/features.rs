use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::domain::{fields, ApplicantRecord, InvalidRecordError};
use super::rates::InterestRateEstimator;

pub const LONG_PROCESSING_DAYS: f64 = 30.0;
pub const LOW_DOCUMENTATION_COUNT: f64 = 3.0;
const RATIO_SENTINEL: f64 = 0.0;

/// Credit score bucket with fixed boundaries over the clamped [0, 850] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CreditRiskCategory {
    VeryPoor,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl CreditRiskCategory {
    pub fn from_score(score: f64) -> Self {
        let clamped = if score.is_nan() { 0.0 } else { score.clamp(0.0, 850.0) };
        if clamped < 580.0 {
            CreditRiskCategory::VeryPoor
        } else if clamped < 620.0 {
            CreditRiskCategory::Poor
        } else if clamped < 680.0 {
            CreditRiskCategory::Fair
        } else if clamped < 740.0 {
            CreditRiskCategory::Good
        } else {
            CreditRiskCategory::Excellent
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            CreditRiskCategory::VeryPoor => "Very_Poor",
            CreditRiskCategory::Poor => "Poor",
            CreditRiskCategory::Fair => "Fair",
            CreditRiskCategory::Good => "Good",
            CreditRiskCategory::Excellent => "Excellent",
        }
    }
}

/// Records a derived value that could not be computed (a zero or negative denominator, or a
/// non-finite payment) and was replaced by a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivisionGuard {
    pub field: String,
    pub sentinel: f64,
}

/// Whether a catalog feature is fed to the model as a number or as a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// Single model input resolved from an engineered feature set.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

/// Every feature a model may be trained on, in column order.
pub const FEATURE_CATALOG: &[(&str, FeatureKind)] = &[
    (fields::CREDIT_SCORE, FeatureKind::Numeric),
    (fields::MONTHLY_INCOME, FeatureKind::Numeric),
    (fields::AGE, FeatureKind::Numeric),
    (fields::LOAN_AMOUNT, FeatureKind::Numeric),
    (fields::PROPERTY_PRICE, FeatureKind::Numeric),
    (fields::DOWN_PAYMENT, FeatureKind::Numeric),
    (fields::INTEREST_RATE, FeatureKind::Numeric),
    (fields::LOAN_DURATION_MONTHS, FeatureKind::Numeric),
    (fields::EMPLOYMENT_DURATION_MONTHS, FeatureKind::Numeric),
    (fields::DOCUMENTS_SUBMITTED, FeatureKind::Numeric),
    (fields::DAYS_IN_PROCESS, FeatureKind::Numeric),
    (fields::COMMUNICATION_FREQUENCY, FeatureKind::Numeric),
    ("ltv_ratio", FeatureKind::Numeric),
    ("down_payment_ratio", FeatureKind::Numeric),
    ("monthly_payment", FeatureKind::Numeric),
    ("dti_ratio", FeatureKind::Numeric),
    ("long_processing", FeatureKind::Numeric),
    ("low_documentation", FeatureKind::Numeric),
    (fields::EMPLOYMENT_STATUS, FeatureKind::Categorical),
    (fields::GENDER, FeatureKind::Categorical),
    (fields::MARITAL_STATUS, FeatureKind::Categorical),
    (fields::PRODUCT_TYPE, FeatureKind::Categorical),
    ("credit_risk_category", FeatureKind::Categorical),
];

/// Raised when a model input required by a trained artifact is absent from a feature set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("feature '{feature}' required by the model is missing")]
pub struct MissingFeatureError {
    pub feature: String,
}

impl MissingFeatureError {
    /// True when the feature is an applicant input the record left out, as opposed to a name
    /// the engineer never produces.
    pub fn is_omitted_input(&self) -> bool {
        FEATURE_CATALOG
            .iter()
            .any(|(name, _)| *name == self.feature)
    }
}

/// Derived view of an applicant record. Computed per invocation and never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatures {
    pub credit_score: f64,
    pub monthly_income: f64,
    pub loan_amount: f64,
    pub property_price: f64,
    pub down_payment: f64,
    pub interest_rate: f64,
    pub interest_rate_estimated: bool,
    pub loan_duration_months: f64,
    pub age: Option<f64>,
    pub employment_duration_months: Option<f64>,
    pub documents_submitted: Option<f64>,
    pub days_in_process: Option<f64>,
    pub communication_frequency: Option<f64>,
    pub employment_status: Option<String>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub product_type: Option<String>,
    pub ltv_ratio: f64,
    pub down_payment_ratio: f64,
    pub monthly_payment: f64,
    pub dti_ratio: f64,
    pub credit_risk_category: CreditRiskCategory,
    pub long_processing: bool,
    pub low_documentation: bool,
    #[serde(default)]
    pub guards: Vec<DivisionGuard>,
}

impl EngineeredFeatures {
    /// True when at least one ratio fell back to its sentinel.
    pub fn low_confidence(&self) -> bool {
        !self.guards.is_empty()
    }

    /// Resolves a catalog feature by name; `None` when the value was never supplied.
    pub fn lookup(&self, name: &str) -> Option<FeatureValue> {
        let numeric = |value: f64| Some(FeatureValue::Numeric(value));
        let flag = |value: bool| Some(FeatureValue::Numeric(if value { 1.0 } else { 0.0 }));
        let category = |value: &Option<String>| value.clone().map(FeatureValue::Categorical);

        match name {
            fields::CREDIT_SCORE => numeric(self.credit_score),
            fields::MONTHLY_INCOME => numeric(self.monthly_income),
            fields::AGE => self.age.and_then(numeric),
            fields::LOAN_AMOUNT => numeric(self.loan_amount),
            fields::PROPERTY_PRICE => numeric(self.property_price),
            fields::DOWN_PAYMENT => numeric(self.down_payment),
            fields::INTEREST_RATE => numeric(self.interest_rate),
            fields::LOAN_DURATION_MONTHS => numeric(self.loan_duration_months),
            fields::EMPLOYMENT_DURATION_MONTHS => self.employment_duration_months.and_then(numeric),
            fields::DOCUMENTS_SUBMITTED => self.documents_submitted.and_then(numeric),
            fields::DAYS_IN_PROCESS => self.days_in_process.and_then(numeric),
            fields::COMMUNICATION_FREQUENCY => self.communication_frequency.and_then(numeric),
            "ltv_ratio" => numeric(self.ltv_ratio),
            "down_payment_ratio" => numeric(self.down_payment_ratio),
            "monthly_payment" => numeric(self.monthly_payment),
            "dti_ratio" => numeric(self.dti_ratio),
            "long_processing" => flag(self.long_processing),
            "low_documentation" => flag(self.low_documentation),
            fields::EMPLOYMENT_STATUS => category(&self.employment_status),
            fields::GENDER => category(&self.gender),
            fields::MARITAL_STATUS => category(&self.marital_status),
            fields::PRODUCT_TYPE => category(&self.product_type),
            "credit_risk_category" => Some(FeatureValue::Categorical(
                self.credit_risk_category.label().to_string(),
            )),
            _ => None,
        }
    }

    /// Resolves a feature and checks it has the kind the model was trained with.
    pub fn require(
        &self,
        name: &str,
        kind: FeatureKind,
    ) -> Result<FeatureValue, MissingFeatureError> {
        match (self.lookup(name), kind) {
            (Some(value @ FeatureValue::Numeric(_)), FeatureKind::Numeric)
            | (Some(value @ FeatureValue::Categorical(_)), FeatureKind::Categorical) => Ok(value),
            _ => Err(MissingFeatureError {
                feature: name.to_string(),
            }),
        }
    }
}

/// Standard amortized payment; a zero rate degrades to straight-line repayment.
///
/// `annual_rate_percent` is the yearly rate in percent and `term_months` the number of
/// monthly installments. A non-positive term yields `0.0`. Evaluated in the discounted form
/// `P·r / (1 − (1+r)^−n)` so long terms converge to `P·r` instead of overflowing; the result is
/// still non-finite for rates too large to represent.
pub fn monthly_payment(principal: f64, annual_rate_percent: f64, term_months: f64) -> f64 {
    if term_months <= 0.0 {
        return 0.0;
    }

    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    let discount = 1.0 - (1.0 + monthly_rate).powf(-term_months);
    if monthly_rate == 0.0 || discount == 0.0 {
        return principal / term_months;
    }

    principal * monthly_rate / discount
}

fn guarded_ratio(
    numerator: f64,
    denominator: f64,
    field: &str,
    guards: &mut Vec<DivisionGuard>,
) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        guards.push(DivisionGuard {
            field: field.to_string(),
            sentinel: RATIO_SENTINEL,
        });
        RATIO_SENTINEL
    }
}

/// Derives ratios, payments and risk indicators from raw applicant attributes.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    rates: InterestRateEstimator,
}

impl FeatureEngineer {
    pub fn new(rates: InterestRateEstimator) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &InterestRateEstimator {
        &self.rates
    }

    /// The RNG is only consulted when the record omits an interest rate.
    pub fn engineer(
        &self,
        record: &ApplicantRecord,
        rng: &mut dyn RngCore,
    ) -> Result<EngineeredFeatures, InvalidRecordError> {
        let credit_score = record.require_number(fields::CREDIT_SCORE)?;
        let monthly_income = record.require_number(fields::MONTHLY_INCOME)?;
        let loan_amount = record.require_number(fields::LOAN_AMOUNT)?;
        let property_price = record.require_number(fields::PROPERTY_PRICE)?;
        let loan_duration_months = record.require_number(fields::LOAN_DURATION_MONTHS)?;

        if loan_duration_months <= 0.0 {
            return Err(InvalidRecordError::InvalidValue {
                field: fields::LOAN_DURATION_MONTHS.to_string(),
                reason: format!("loan term must be positive, found {loan_duration_months}"),
            });
        }

        let (interest_rate, interest_rate_estimated) = match record.number(fields::INTEREST_RATE)? {
            Some(rate) => (rate, false),
            None => (
                self.rates.estimate(credit_score, loan_duration_months, rng),
                true,
            ),
        };

        let down_payment = record
            .number(fields::DOWN_PAYMENT)?
            .unwrap_or_else(|| (property_price - loan_amount).max(0.0));

        let documents_submitted = record.number(fields::DOCUMENTS_SUBMITTED)?;
        let days_in_process = record.number(fields::DAYS_IN_PROCESS)?;

        let mut guards = Vec::new();
        let ltv_ratio = guarded_ratio(loan_amount, property_price, "ltv_ratio", &mut guards);
        let down_payment_ratio =
            guarded_ratio(down_payment, property_price, "down_payment_ratio", &mut guards);
        let payment = monthly_payment(loan_amount, interest_rate, loan_duration_months);
        let (payment, dti_ratio) = if payment.is_finite() {
            let dti = guarded_ratio(payment, monthly_income, "dti_ratio", &mut guards);
            (payment, dti)
        } else {
            // DTI is meaningless without a payment, so both fall back together.
            for field in ["monthly_payment", "dti_ratio"] {
                guards.push(DivisionGuard {
                    field: field.to_string(),
                    sentinel: RATIO_SENTINEL,
                });
            }
            (RATIO_SENTINEL, RATIO_SENTINEL)
        };

        Ok(EngineeredFeatures {
            credit_score,
            monthly_income,
            loan_amount,
            property_price,
            down_payment,
            interest_rate,
            interest_rate_estimated,
            loan_duration_months,
            age: record.number(fields::AGE)?,
            employment_duration_months: record.number(fields::EMPLOYMENT_DURATION_MONTHS)?,
            documents_submitted,
            days_in_process,
            communication_frequency: record.number(fields::COMMUNICATION_FREQUENCY)?,
            employment_status: record.text(fields::EMPLOYMENT_STATUS),
            gender: record.text(fields::GENDER),
            marital_status: record.text(fields::MARITAL_STATUS),
            product_type: record.text(fields::PRODUCT_TYPE),
            ltv_ratio,
            down_payment_ratio,
            monthly_payment: payment,
            dti_ratio,
            credit_risk_category: CreditRiskCategory::from_score(credit_score),
            long_processing: days_in_process.is_some_and(|days| days > LONG_PROCESSING_DAYS),
            low_documentation: documents_submitted
                .is_some_and(|count| count < LOW_DOCUMENTATION_COUNT),
            guards,
        })
    }
}

/// Engineers features with the default market settings and a thread-local RNG.
pub fn engineer_features(
    record: &ApplicantRecord,
) -> Result<EngineeredFeatures, InvalidRecordError> {
    FeatureEngineer::default().engineer(record, &mut rand::rng())
}
