//! Limits for one transformer instance, loadable from TOML.

use std::fs;
use std::path::Path;

use ingestion_sanitization::SanitizationLimits;
use serde::{Deserialize, Serialize};
use transform_expression::EvaluatorLimits;

use crate::MappingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub evaluator: EvaluatorLimits,
    pub sanitization: SanitizationLimits,
    /// Batch results keep at most this many error lines; the full count is
    /// still reported.
    pub max_reported_errors: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorLimits::default(),
            sanitization: SanitizationLimits::default(),
            max_reported_errors: 10,
        }
    }
}

impl TransformConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, MappingError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), MappingError> {
        self.evaluator.validate()?;
        self.sanitization.validate()?;
        Ok(())
    }
}
