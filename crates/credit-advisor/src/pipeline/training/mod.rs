//! Offline training of the approval and withdrawal classifiers.

pub mod gbdt;
pub mod metrics;
pub mod preprocess;
pub mod split;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::artifact::{ArtifactMetadata, ModelArtifact};
use super::domain::{InvalidRecordError, TrainingRecord};
use super::features::{EngineeredFeatures, FeatureEngineer, MissingFeatureError};
use gbdt::GradientBoostedClassifier;
use preprocess::{select_features, FeatureSpec, Preprocessor};

pub const MIN_TRAINING_RECORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    Balanced,
    Uniform,
}

/// Boosting hyperparameters, recorded verbatim in the artifact metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_samples: usize,
    pub class_weight: ClassWeight,
    pub random_state: u64,
    pub reg_lambda: f64,
    pub min_sum_hessian: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.05,
            max_depth: 6,
            min_child_samples: 20,
            class_weight: ClassWeight::Balanced,
            random_state: 42,
            reg_lambda: 1.0,
            min_sum_hessian: 1e-3,
        }
    }
}

/// Shared flag a caller flips to abort a running training job.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancellation and deadline checked between boosting rounds.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunControl {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunControl {
    pub(crate) fn new(token: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { token, deadline }
    }

    #[cfg(test)]
    pub(crate) fn unbounded() -> Self {
        Self::default()
    }

    pub(crate) fn check(&self) -> Result<(), TrainingError> {
        if self.token.is_cancelled() {
            return Err(TrainingError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(TrainingError::TimedOut);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    /// Free-form provenance label stored in the artifact metadata.
    pub source: String,
    pub params: BoostingParams,
    pub cancellation: CancellationToken,
    pub deadline: Option<Instant>,
    pub engineer: FeatureEngineer,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            source: "batch".to_string(),
            params: BoostingParams::default(),
            cancellation: CancellationToken::new(),
            deadline: None,
            engineer: FeatureEngineer::default(),
        }
    }
}

impl TrainingOptions {
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("training requires at least {required} records, found {found}")]
pub struct InsufficientDataError {
    pub required: usize,
    pub found: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    InsufficientData(#[from] InsufficientDataError),
    #[error("training record {index} is invalid: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: InvalidRecordError,
    },
    #[error(transparent)]
    MissingFeature(#[from] MissingFeatureError),
    #[error("training was cancelled")]
    Cancelled,
    #[error("training exceeded its deadline")]
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub train_size: usize,
    pub test_size: usize,
    pub elapsed: Duration,
}

/// Fits both classifier heads on a labelled batch and evaluates them on a held-out split.
pub fn train(
    batch: &[TrainingRecord],
    options: &TrainingOptions,
) -> Result<TrainingOutcome, TrainingError> {
    let started = Instant::now();
    if batch.len() < MIN_TRAINING_RECORDS {
        return Err(InsufficientDataError {
            required: MIN_TRAINING_RECORDS,
            found: batch.len(),
        }
        .into());
    }

    let params = &options.params;
    let control = RunControl::new(options.cancellation.clone(), options.deadline);
    let mut rng = StdRng::seed_from_u64(params.random_state);

    let rows = batch
        .iter()
        .enumerate()
        .map(|(index, item)| {
            options
                .engineer
                .engineer(&item.record, &mut rng)
                .map_err(|source| TrainingError::InvalidRecord { index, source })
        })
        .collect::<Result<Vec<EngineeredFeatures>, _>>()?;

    let approval: Vec<bool> = batch.iter().map(|item| item.outcome.is_approved()).collect();
    let withdrawal: Vec<bool> = batch.iter().map(|item| item.outcome.is_withdrawn()).collect();

    let feature_list = select_features(&rows);
    let plan = split::stratified_split(&approval, params.random_state);
    if plan.used_fallback {
        warn!(
            records = batch.len(),
            approved = approval.iter().filter(|label| **label).count(),
            "approval classes too small to stratify; using random split"
        );
    }

    let train_rows: Vec<&EngineeredFeatures> = plan.train.iter().map(|&idx| &rows[idx]).collect();
    let preprocessor = Preprocessor::fit(&feature_list, &train_rows)?;
    let matrix = rows
        .iter()
        .map(|row| preprocessor.transform(row))
        .collect::<Result<Vec<_>, _>>()?;

    let pick_rows = |indices: &[usize]| -> Vec<Vec<f64>> {
        indices.iter().map(|&idx| matrix[idx].clone()).collect()
    };
    let pick_labels =
        |labels: &[bool], indices: &[usize]| indices.iter().map(|&idx| labels[idx]).collect::<Vec<_>>();

    let train_matrix = pick_rows(&plan.train);
    let test_matrix = pick_rows(&plan.test);

    let approval_model = GradientBoostedClassifier::fit(
        &train_matrix,
        &pick_labels(&approval, &plan.train),
        params,
        &control,
    )?;
    let withdrawal_model = GradientBoostedClassifier::fit(
        &train_matrix,
        &pick_labels(&withdrawal, &plan.train),
        params,
        &control,
    )?;

    let mut approval_metrics = metrics::evaluate(
        &pick_labels(&approval, &plan.test),
        &test_matrix
            .iter()
            .map(|row| approval_model.predict_proba(row))
            .collect::<Vec<_>>(),
    );
    let mut withdrawal_metrics = metrics::evaluate(
        &pick_labels(&withdrawal, &plan.test),
        &test_matrix
            .iter()
            .map(|row| withdrawal_model.predict_proba(row))
            .collect::<Vec<_>>(),
    );

    for (head, labels, head_metrics) in [
        ("approval", &approval, &mut approval_metrics),
        ("withdrawal", &withdrawal, &mut withdrawal_metrics),
    ] {
        match cross_validate(&rows, &feature_list, labels, params, &control)? {
            Some((mean, std_dev)) => {
                head_metrics.cv_accuracy = Some(mean);
                head_metrics.cv_std_accuracy = Some(std_dev);
                if head_metrics.conservative_accuracy() < head_metrics.accuracy {
                    warn!(
                        head,
                        holdout_accuracy = head_metrics.accuracy,
                        cv_accuracy = mean,
                        "hold-out accuracy well above cross-validation; guard uses the cv estimate"
                    );
                }
            }
            None => warn!(head, "classes too small for k-fold cross-validation"),
        }
    }

    let trained_at = Utc::now();
    let metadata = ArtifactMetadata {
        version: trained_at.format("%Y%m%d_%H%M%S").to_string(),
        trained_at,
        source: options.source.clone(),
        record_count: batch.len(),
        approval: approval_metrics,
        withdrawal: withdrawal_metrics,
        feature_list: preprocessor.feature_list(),
        used_fallback_split: plan.used_fallback,
        hyperparameters: params.clone(),
    };

    let elapsed = started.elapsed();
    info!(
        version = %metadata.version,
        records = batch.len(),
        features = metadata.feature_list.len(),
        approval_accuracy = approval_metrics.accuracy,
        approval_auc = approval_metrics.auc,
        withdrawal_accuracy = withdrawal_metrics.accuracy,
        approval_cv_accuracy = approval_metrics.cv_accuracy,
        withdrawal_cv_accuracy = withdrawal_metrics.cv_accuracy,
        elapsed_ms = elapsed.as_millis() as u64,
        "training completed"
    );

    Ok(TrainingOutcome {
        artifact: ModelArtifact {
            metadata,
            preprocessor,
            approval_model,
            withdrawal_model,
        },
        train_size: plan.train.len(),
        test_size: plan.test.len(),
        elapsed,
    })
}

/// Mean and population standard deviation of stratified k-fold accuracy for one head.
///
/// Each fold refits the preprocessor on its own training rows. `None` when a class is too
/// small to appear in every fold.
fn cross_validate(
    rows: &[EngineeredFeatures],
    feature_list: &[FeatureSpec],
    labels: &[bool],
    params: &BoostingParams,
    control: &RunControl,
) -> Result<Option<(f64, f64)>, TrainingError> {
    let n_folds = split::fold_count(rows.len());
    let Some(folds) = split::stratified_folds(labels, n_folds, params.random_state) else {
        return Ok(None);
    };

    let mut scores = Vec::with_capacity(folds.len());
    for (held_out, fold) in folds.iter().enumerate() {
        control.check()?;
        let train_idx: Vec<usize> = folds
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != held_out)
            .flat_map(|(_, indices)| indices.iter().copied())
            .collect();

        let train_rows: Vec<&EngineeredFeatures> =
            train_idx.iter().map(|&idx| &rows[idx]).collect();
        let preprocessor = Preprocessor::fit(feature_list, &train_rows)?;
        let encode = |indices: &[usize]| {
            indices
                .iter()
                .map(|&idx| preprocessor.transform(&rows[idx]))
                .collect::<Result<Vec<_>, _>>()
        };

        let train_labels: Vec<bool> = train_idx.iter().map(|&idx| labels[idx]).collect();
        let train_matrix = encode(&train_idx[..])?;
        let model = GradientBoostedClassifier::fit(&train_matrix, &train_labels, params, control)?;

        let fold_labels: Vec<bool> = fold.iter().map(|&idx| labels[idx]).collect();
        let probabilities: Vec<f64> = encode(fold.as_slice())?
            .iter()
            .map(|row| model.predict_proba(row))
            .collect();
        scores.push(metrics::evaluate(&fold_labels, &probabilities).accuracy);
    }

    let count = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / count;
    let variance = scores.iter().map(|score| (score - mean).powi(2)).sum::<f64>() / count;
    Ok(Some((mean, variance.sqrt())))
}
