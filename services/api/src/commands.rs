use crate::infra::{assessment_service, command_config, persistent_service};
use chrono::{DateTime, Utc};
use clap::Args;
use credit_advisor::error::AppError;
use credit_advisor::pipeline::{
    evaluate_completeness, generate_batch, ApplicantRecord, ArtifactMetadata, ArtifactStore,
    Assessment, AssessmentRequest, TrainingBatchImporter, TrainingRecord,
};
use credit_advisor::pipeline::sample::DEFAULT_SAMPLE_SEED;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_SAMPLE_SIZE: usize = 500;

#[derive(Args, Debug)]
pub(crate) struct AssessArgs {
    /// JSON file holding the applicant record (a flat object of field names to values)
    #[arg(long)]
    pub(crate) record: PathBuf,
    /// Comma-separated document ids submitted with the application
    #[arg(long, value_delimiter = ',')]
    pub(crate) documents: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct TrainArgs {
    /// CSV export of historical applications with a status column
    #[arg(long, conflicts_with = "sample")]
    pub(crate) csv: Option<PathBuf>,
    /// Train on this many generated applications instead of a CSV export
    #[arg(long)]
    pub(crate) sample: Option<usize>,
    /// Where to write the artifact (defaults to the configured model path)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Seed for the sample generator and the boosting run
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Abort training after this many seconds
    #[arg(long)]
    pub(crate) timeout_secs: Option<u64>,
    /// Drop rows whose status is still in process
    #[arg(long)]
    pub(crate) skip_in_process: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CompletenessArgs {
    /// Comma-separated document ids
    #[arg(long, value_delimiter = ',')]
    pub(crate) documents: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of generated historical applications to train on
    #[arg(long, default_value_t = 400)]
    pub(crate) records: usize,
    /// Number of fresh applicants to assess after training
    #[arg(long, default_value_t = 3)]
    pub(crate) applicants: usize,
    /// Seed for generation and training
    #[arg(long, default_value_t = 42)]
    pub(crate) seed: u64,
}

#[derive(Debug, Serialize)]
struct ModelInfoView<'a> {
    path: String,
    age_days: i64,
    #[serde(flatten)]
    metadata: &'a ArtifactMetadata,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn run_assess(args: AssessArgs) -> Result<(), AppError> {
    let config = command_config()?;
    let raw = fs::read_to_string(&args.record)?;
    let record: ApplicantRecord = serde_json::from_str(&raw)?;

    let service = persistent_service(&config.model)?;
    let assessment = service.assess_with_entropy(&AssessmentRequest {
        record,
        submitted_documents: args.documents,
    })?;

    print_json(&assessment)
}

pub(crate) fn run_train(args: TrainArgs) -> Result<(), AppError> {
    let mut config = command_config()?;
    if let Some(output) = args.output {
        config.model.artifact_path = output;
    }

    let (batch, source): (Vec<TrainingRecord>, String) = match &args.csv {
        Some(path) => (
            TrainingBatchImporter::new()
                .skip_in_process(args.skip_in_process)
                .from_path(path)?,
            path.display().to_string(),
        ),
        None => {
            let count = args.sample.unwrap_or(DEFAULT_SAMPLE_SIZE);
            let seed = args.seed.unwrap_or(DEFAULT_SAMPLE_SEED);
            info!(count, seed, "generating sample training batch");
            (generate_batch(count, seed), format!("sample:{count}"))
        }
    };

    let service = assessment_service(&config.model)
        .with_store(ArtifactStore::new(config.model.artifact_path.clone()));
    let mut options = service.training_options().with_source(source);
    if let Some(seed) = args.seed {
        options.params.random_state = seed;
    }
    if let Some(secs) = args.timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let report = service.train(&batch, &options)?;
    print_json(&report)
}

pub(crate) fn run_completeness(args: CompletenessArgs) -> Result<(), AppError> {
    print_json(&evaluate_completeness(&args.documents))
}

pub(crate) fn run_model_info() -> Result<(), AppError> {
    let config = command_config()?;
    let store = ArtifactStore::new(config.model.artifact_path.clone());

    match store.load_if_present()? {
        Some(artifact) => print_json(&ModelInfoView {
            path: store.path().display().to_string(),
            age_days: age_in_days(artifact.metadata.trained_at, Utc::now()),
            metadata: &artifact.metadata,
        }),
        None => {
            println!(
                "No model artifact at {}; assessments use rule-based scoring.",
                store.path().display()
            );
            Ok(())
        }
    }
}

fn age_in_days(trained_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - trained_at).num_days().max(0)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        records,
        applicants,
        seed,
    } = args;

    let config = command_config()?;
    let service = assessment_service(&config.model);

    println!("Credit advisor demo");
    println!("Training on {records} generated applications (seed {seed})");
    let mut options = service.training_options().with_source("demo");
    options.params.random_state = seed;
    let report = service.train(&generate_batch(records, seed), &options)?;
    let metadata = &report.metadata;
    println!(
        "  model {} | approval accuracy {:.3} auc {:.3} | withdrawal accuracy {:.3} auc {:.3}",
        metadata.version,
        metadata.approval.accuracy,
        metadata.approval.auc,
        metadata.withdrawal.accuracy,
        metadata.withdrawal.auc
    );
    if metadata.used_fallback_split {
        println!("  note: classes were too small to stratify the hold-out split");
    }

    let documents = [
        vec!["doc_id", "doc_salary", "doc_bank_statement", "doc_tax_return", "doc_property_docs"],
        vec!["doc_id", "doc_salary", "doc_bank_statement"],
        vec!["doc_id"],
    ];

    for (idx, item) in generate_batch(applicants, seed.wrapping_add(1))
        .into_iter()
        .enumerate()
    {
        let submitted = documents[idx % documents.len()]
            .iter()
            .map(|doc| doc.to_string())
            .collect();
        let assessment = service.assess_with_entropy(&AssessmentRequest {
            record: item.record,
            submitted_documents: submitted,
        })?;
        render_assessment(idx + 1, &assessment);
    }

    Ok(())
}

fn render_assessment(position: usize, assessment: &Assessment) {
    let features = &assessment.features;
    let scores = &assessment.scores;

    println!("\nApplicant {position}");
    println!(
        "  credit {:.0} ({}) | LTV {:.1}% | DTI {:.1}% | payment {:.2}",
        features.credit_score,
        features.credit_risk_category.label(),
        features.ltv_ratio * 100.0,
        features.dti_ratio * 100.0,
        features.monthly_payment
    );
    println!(
        "  approval {:.1}% | withdrawal risk {:.1}% | {}",
        scores.approval_probability * 100.0,
        scores.withdrawal_risk * 100.0,
        if scores.used_fallback {
            "rule-based estimate"
        } else {
            "trained model"
        }
    );
    println!(
        "  documents {:.1}% ({})",
        assessment.completeness.score,
        assessment.completeness.status.label()
    );
    for rec in &assessment.recommendations {
        println!("  - [{:?}/{:?}] {}", rec.priority, rec.category, rec.message);
    }
}
