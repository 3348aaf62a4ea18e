use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::pipeline::rates::{RateConfig, DEFAULT_MARKET_BASE_RATE};
use crate::pipeline::scoring::{GuardConfig, DEFAULT_OVERFIT_THRESHOLD};

pub const DEFAULT_MODEL_PATH: &str = "weights/model_artifact.json";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub model: ModelConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            model: ModelConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Model persistence and scoring knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub artifact_path: PathBuf,
    pub market_base_rate: f64,
    pub overfit_threshold: f64,
    pub rng_seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_MODEL_PATH),
            market_base_rate: DEFAULT_MARKET_BASE_RATE,
            overfit_threshold: DEFAULT_OVERFIT_THRESHOLD,
            rng_seed: None,
        }
    }
}

impl ModelConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let artifact_path = env::var("CREDIT_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.artifact_path);

        let market_base_rate = match env::var("CREDIT_MARKET_BASE_RATE") {
            Ok(raw) => parse_positive("CREDIT_MARKET_BASE_RATE", &raw)?,
            Err(_) => defaults.market_base_rate,
        };

        let overfit_threshold = match env::var("CREDIT_OVERFIT_THRESHOLD") {
            Ok(raw) => {
                let value = parse_positive("CREDIT_OVERFIT_THRESHOLD", &raw)?;
                if value > 1.0 {
                    return Err(ConfigError::InvalidNumber {
                        key: "CREDIT_OVERFIT_THRESHOLD",
                        value: raw,
                    });
                }
                value
            }
            Err(_) => defaults.overfit_threshold,
        };

        let rng_seed = match env::var("CREDIT_RNG_SEED") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidNumber {
                    key: "CREDIT_RNG_SEED",
                    value: raw.clone(),
                }
            })?),
            _ => None,
        };

        Ok(Self {
            artifact_path,
            market_base_rate,
            overfit_threshold,
            rng_seed,
        })
    }

    pub fn rate_config(&self) -> RateConfig {
        RateConfig {
            market_base_rate: self.market_base_rate,
            ..RateConfig::default()
        }
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            overfit_accuracy_threshold: self.overfit_threshold,
            ..GuardConfig::default()
        }
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
        }
    }
}
