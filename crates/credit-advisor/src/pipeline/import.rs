use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use super::domain::{fields, ApplicantRecord, ApplicationOutcome, FieldValue, TrainingRecord};

const STATUS_COLUMNS: &[&str] = &["status", "loan_status", "application_status"];

/// How a CSV column maps onto an applicant field.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnTarget {
    Field(&'static str),
    /// Value is multiplied by the factor before storing, e.g. years to months.
    Scaled(&'static str, f64),
    Status,
    Ignored,
}

const KNOWN_FIELDS: &[&str] = &[
    fields::CREDIT_SCORE,
    fields::MONTHLY_INCOME,
    fields::AGE,
    fields::LOAN_AMOUNT,
    fields::PROPERTY_PRICE,
    fields::DOWN_PAYMENT,
    fields::INTEREST_RATE,
    fields::LOAN_DURATION_MONTHS,
    fields::EMPLOYMENT_DURATION_MONTHS,
    fields::DOCUMENTS_SUBMITTED,
    fields::DAYS_IN_PROCESS,
    fields::COMMUNICATION_FREQUENCY,
    fields::EMPLOYMENT_STATUS,
    fields::GENDER,
    fields::MARITAL_STATUS,
    fields::PRODUCT_TYPE,
];

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

fn column_target(header: &str) -> ColumnTarget {
    let normalized = normalize_header(header);
    if STATUS_COLUMNS.contains(&normalized.as_str()) {
        return ColumnTarget::Status;
    }

    match normalized.as_str() {
        "loan_duration" | "loan_duration_years" => {
            ColumnTarget::Scaled(fields::LOAN_DURATION_MONTHS, 12.0)
        }
        "processing_time_days" => ColumnTarget::Field(fields::DAYS_IN_PROCESS),
        name => KNOWN_FIELDS
            .iter()
            .find(|known| **known == name)
            .map(|known| ColumnTarget::Field(*known))
            .unwrap_or(ColumnTarget::Ignored),
    }
}

/// Reads labelled historical applications from CSV exports.
#[derive(Debug, Clone, Default)]
pub struct TrainingBatchImporter {
    skip_in_process: bool,
}

impl TrainingBatchImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop rows whose outcome is still pending.
    pub fn skip_in_process(mut self, skip: bool) -> Self {
        self.skip_in_process = skip;
        self
    }

    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<TrainingRecord>, ImportError> {
        let file = File::open(path.as_ref()).map_err(ImportError::Io)?;
        let records = self.read(file)?;
        info!(
            path = %path.as_ref().display(),
            records = records.len(),
            "training batch imported"
        );
        Ok(records)
    }

    pub fn read<R: Read>(&self, reader: R) -> Result<Vec<TrainingRecord>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let targets: Vec<ColumnTarget> = csv_reader
            .headers()
            .map_err(ImportError::Csv)?
            .iter()
            .map(column_target)
            .collect();

        if !targets.contains(&ColumnTarget::Status) {
            return Err(ImportError::MissingStatusColumn);
        }

        let mut batch = Vec::new();
        for (offset, row) in csv_reader.records().enumerate() {
            let row = row.map_err(ImportError::Csv)?;
            let line = offset + 2;
            let mut record = ApplicantRecord::new();
            let mut outcome = None;

            for (target, raw) in targets.iter().zip(row.iter()) {
                if raw.is_empty() {
                    continue;
                }
                match *target {
                    ColumnTarget::Status => {
                        outcome = Some(raw.parse::<ApplicationOutcome>().map_err(|_| {
                            ImportError::InvalidStatus {
                                line,
                                value: raw.to_string(),
                            }
                        })?);
                    }
                    ColumnTarget::Field(field) => record.insert(field, parse_value(raw)),
                    ColumnTarget::Scaled(field, factor) => {
                        let value = match raw.parse::<f64>() {
                            Ok(number) => FieldValue::Number(number * factor),
                            Err(_) => FieldValue::Text(raw.to_string()),
                        };
                        record.insert(field, value);
                    }
                    ColumnTarget::Ignored => {}
                }
            }

            let outcome = outcome.ok_or(ImportError::MissingStatus { line })?;
            if self.skip_in_process && outcome == ApplicationOutcome::InProcess {
                debug!(line, "skipping in-process application");
                continue;
            }
            batch.push(TrainingRecord::new(record, outcome));
        }

        Ok(batch)
    }
}

fn parse_value(raw: &str) -> FieldValue {
    raw.parse::<f64>()
        .map(FieldValue::Number)
        .unwrap_or_else(|_| FieldValue::Text(raw.to_string()))
}

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingStatusColumn,
    MissingStatus { line: usize },
    InvalidStatus { line: usize, value: String },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to open training batch: {err}"),
            ImportError::Csv(err) => write!(f, "malformed training CSV: {err}"),
            ImportError::MissingStatusColumn => {
                write!(f, "training CSV has no status column")
            }
            ImportError::MissingStatus { line } => {
                write!(f, "line {line} has no application status")
            }
            ImportError::InvalidStatus { line, value } => {
                write!(f, "line {line} has unknown application status '{value}'")
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Credit_Score,Monthly_Income,Loan_Amount,Property_Price,Loan_Duration,Interest_Rate,Employment_Status,Processing_Time_Days,Status,Client_Name
720,45000,300000,350000,20,6.0,Employed,12,Approved,Ana Lopez
610,28000,250000,260000,25,,Self-Employed,40,Withdrawn,Luis Perez
";

    #[test]
    fn maps_legacy_headers_onto_fields() {
        let batch = TrainingBatchImporter::new()
            .read(EXPORT.as_bytes())
            .expect("export parses");

        assert_eq!(batch.len(), 2);
        let first = &batch[0];
        assert_eq!(first.outcome, ApplicationOutcome::Approved);
        assert_eq!(
            first.record.number(fields::LOAN_DURATION_MONTHS),
            Ok(Some(240.0))
        );
        assert_eq!(first.record.number(fields::DAYS_IN_PROCESS), Ok(Some(12.0)));
        assert_eq!(
            first.record.text(fields::EMPLOYMENT_STATUS).as_deref(),
            Some("Employed")
        );
        assert!(first.record.get("client_name").is_none());

        let second = &batch[1];
        assert_eq!(second.outcome, ApplicationOutcome::Withdrawn);
        assert_eq!(second.record.number(fields::INTEREST_RATE), Ok(None));
    }

    #[test]
    fn rejects_export_without_status_column() {
        let csv = "credit_score,monthly_income\n700,40000\n";
        let result = TrainingBatchImporter::new().read(csv.as_bytes());
        assert!(matches!(result, Err(ImportError::MissingStatusColumn)));
    }

    #[test]
    fn reports_line_of_unknown_status() {
        let csv = "credit_score,status\n700,Approved\n650,Lost\n";
        match TrainingBatchImporter::new().read(csv.as_bytes()) {
            Err(ImportError::InvalidStatus { line, value }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "Lost");
            }
            other => panic!("expected invalid status, got {other:?}"),
        }
    }

    #[test]
    fn can_skip_pending_applications() {
        let csv = "credit_score,status\n700,Approved\n650,In-Process\n";
        let batch = TrainingBatchImporter::new()
            .skip_in_process(true)
            .read(csv.as_bytes())
            .expect("parses");
        assert_eq!(batch.len(), 1);
    }
}
