use std::io;

use ingestion_sanitization::ValidationError;
use thiserror::Error;
use transform_expression::LimitsError;

/// Failures while loading configuration or building a [`crate::FieldMapper`].
/// Per-product problems never surface here; they become warnings or batch
/// errors instead.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("failed to read mapping source: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse mapping json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse mapping yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse transform config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported mapping file extension: {extension:?}")]
    UnsupportedFormat { extension: String },
    #[error(transparent)]
    EvaluatorLimits(#[from] LimitsError),
    #[error("sanitization policy rejected: {0}")]
    Sanitization(#[from] ValidationError),
    #[error("field {field} has an invalid validation pattern: {detail}")]
    InvalidPattern { field: String, detail: String },
    #[error("field {field} references unknown transformation {name:?}")]
    UnknownTransformation { field: String, name: String },
}
