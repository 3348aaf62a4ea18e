//! Credit application assessment: feature engineering, approval and withdrawal scoring,
//! document completeness, and recommendation generation.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
