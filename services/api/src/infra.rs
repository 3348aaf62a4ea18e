use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use credit_advisor::config::{AppConfig, ModelConfig};
use credit_advisor::error::AppError;
use credit_advisor::pipeline::{
    ArtifactStore, CreditAssessmentService, FeatureEngineer, InterestRateEstimator, ModelRegistry,
    OverfitGuard,
};
use credit_advisor::telemetry;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Service wired from model settings, without persistence.
pub(crate) fn assessment_service(model: &ModelConfig) -> CreditAssessmentService {
    let service = CreditAssessmentService::new(Arc::new(ModelRegistry::new()))
        .with_engineer(FeatureEngineer::new(InterestRateEstimator::new(
            model.rate_config(),
        )))
        .with_guard(OverfitGuard::new(model.guard_config()));

    match model.rng_seed {
        Some(seed) => service.with_rng_seed(seed),
        None => service,
    }
}

/// Service backed by the configured artifact file, restored if one exists.
pub(crate) fn persistent_service(model: &ModelConfig) -> Result<CreditAssessmentService, AppError> {
    let service =
        assessment_service(model).with_store(ArtifactStore::new(model.artifact_path.clone()));
    service.restore()?;
    Ok(service)
}

/// Loads configuration for one-shot commands and routes logs to stderr.
pub(crate) fn command_config() -> Result<AppConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init_stderr(&config.telemetry)?;
    Ok(config)
}
