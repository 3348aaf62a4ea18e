use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::pipeline::{
    ArtifactError, AssessmentError, ImportError, ModelUpdateError, TrainingError,
};
use crate::telemetry::TelemetryError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Input(serde_json::Error),
    Import(ImportError),
    Assessment(AssessmentError),
    Training(TrainingError),
    Artifact(ArtifactError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Input(err) => write!(f, "invalid input: {}", err),
            AppError::Import(err) => write!(f, "import error: {}", err),
            AppError::Assessment(err) => write!(f, "assessment error: {}", err),
            AppError::Training(err) => write!(f, "training error: {}", err),
            AppError::Artifact(err) => write!(f, "model artifact error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Input(err) => Some(err),
            AppError::Import(err) => Some(err),
            AppError::Assessment(err) => Some(err),
            AppError::Training(err) => Some(err),
            AppError::Artifact(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Assessment(AssessmentError::MissingFeature(err))
                if err.is_omitted_input() =>
            {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Input(_)
            | AppError::Import(_)
            | AppError::Assessment(AssessmentError::InvalidRecord(_))
            | AppError::Training(TrainingError::InsufficientData(_))
            | AppError::Training(TrainingError::InvalidRecord { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Training(TrainingError::Cancelled)
            | AppError::Training(TrainingError::TimedOut) => StatusCode::REQUEST_TIMEOUT,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Assessment(_)
            | AppError::Training(_)
            | AppError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Input(value)
    }
}

impl From<ImportError> for AppError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

impl From<AssessmentError> for AppError {
    fn from(value: AssessmentError) -> Self {
        Self::Assessment(value)
    }
}

impl From<TrainingError> for AppError {
    fn from(value: TrainingError) -> Self {
        Self::Training(value)
    }
}

impl From<ArtifactError> for AppError {
    fn from(value: ArtifactError) -> Self {
        Self::Artifact(value)
    }
}

impl From<ModelUpdateError> for AppError {
    fn from(value: ModelUpdateError) -> Self {
        match value {
            ModelUpdateError::Training(err) => Self::Training(err),
            ModelUpdateError::Artifact(err) => Self::Artifact(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::features::MissingFeatureError;
    use crate::pipeline::InsufficientDataError;

    #[test]
    fn insufficient_data_maps_to_unprocessable() {
        let error = AppError::from(TrainingError::from(InsufficientDataError {
            required: 10,
            found: 3,
        }));
        assert_eq!(
            error.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn omitted_applicant_field_is_a_client_error() {
        let omitted = AppError::from(AssessmentError::from(MissingFeatureError {
            feature: "gender".to_string(),
        }));
        assert_eq!(
            omitted.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let mismatch = AppError::from(AssessmentError::from(MissingFeatureError {
            feature: "retired_signal".to_string(),
        }));
        assert_eq!(
            mismatch.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn config_errors_are_internal() {
        let error = AppError::from(ConfigError::InvalidPort);
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
