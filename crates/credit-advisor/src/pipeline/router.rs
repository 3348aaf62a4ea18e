use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::TrainingRecord;
use super::service::{
    AssessmentError, AssessmentRequest, CreditAssessmentService, ModelUpdateError,
};
use super::training::TrainingError;

#[derive(Debug, Deserialize)]
pub struct CompletenessRequest {
    #[serde(default)]
    pub submitted_documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub records: Vec<TrainingRecord>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Router builder exposing assessment, completeness, and model endpoints.
pub fn assessment_router(service: Arc<CreditAssessmentService>) -> Router {
    Router::new()
        .route("/api/v1/assessments", post(assess_handler))
        .route("/api/v1/completeness", post(completeness_handler))
        .route("/api/v1/model", get(model_handler))
        .route("/api/v1/model/train", post(train_handler))
        .with_state(service)
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    let payload = json!({
        "error": message.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn assess_handler(
    State(service): State<Arc<CreditAssessmentService>>,
    axum::Json(request): axum::Json<AssessmentRequest>,
) -> Response {
    match service.assess_with_entropy(&request) {
        Ok(assessment) => (StatusCode::OK, axum::Json(assessment)).into_response(),
        Err(AssessmentError::InvalidRecord(err)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, err)
        }
        Err(AssessmentError::MissingFeature(err)) if err.is_omitted_input() => {
            let required: Vec<String> = service
                .model_metadata()
                .map(|metadata| {
                    metadata
                        .feature_list
                        .into_iter()
                        .map(|feature| feature.name)
                        .collect()
                })
                .unwrap_or_default();
            let payload = json!({
                "error": err.to_string(),
                "required_features": required,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(AssessmentError::MissingFeature(err)) => {
            error!(
                feature = %err.feature,
                "published model expects a feature the engineer does not produce"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}

pub(crate) async fn completeness_handler(
    State(service): State<Arc<CreditAssessmentService>>,
    axum::Json(request): axum::Json<CompletenessRequest>,
) -> Response {
    let report = service.completeness(&request.submitted_documents);
    (StatusCode::OK, axum::Json(report)).into_response()
}

pub(crate) async fn model_handler(
    State(service): State<Arc<CreditAssessmentService>>,
) -> Response {
    match service.model_metadata() {
        Some(metadata) => {
            let payload = json!({
                "loaded": true,
                "metadata": metadata,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        None => (StatusCode::OK, axum::Json(json!({ "loaded": false }))).into_response(),
    }
}

pub(crate) async fn train_handler(
    State(service): State<Arc<CreditAssessmentService>>,
    axum::Json(request): axum::Json<TrainRequest>,
) -> Response {
    let mut options = service.training_options();
    options.source = request.source.unwrap_or_else(|| "api".to_string());
    if let Some(secs) = request.timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let worker = Arc::clone(&service);
    let records = request.records;
    let result = tokio::task::spawn_blocking(move || worker.train(&records, &options)).await;

    match result {
        Ok(Ok(report)) => (StatusCode::CREATED, axum::Json(report)).into_response(),
        Ok(Err(ModelUpdateError::Training(err))) => {
            let status = match err {
                TrainingError::InsufficientData(_) | TrainingError::InvalidRecord { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                TrainingError::Cancelled | TrainingError::TimedOut => StatusCode::REQUEST_TIMEOUT,
                TrainingError::MissingFeature(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, err)
        }
        Ok(Err(ModelUpdateError::Artifact(err))) => {
            error!(error = %err, "failed to persist trained artifact");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
        Err(join) => {
            error!(error = %join, "training task aborted");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "training task aborted")
        }
    }
}
