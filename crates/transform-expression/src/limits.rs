//! Resource bounds applied to every evaluation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid evaluator limits: {0}")]
pub struct LimitsError(String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorLimits {
    /// Longest expression text accepted before parsing, in characters.
    pub max_expression_length: usize,
    /// Ceiling on the number of AST nodes.
    pub max_nodes: usize,
    /// Ceiling on AST nesting, enforced at parse, validation and interpretation.
    pub max_depth: usize,
    /// Longest string literal (and string function result), in characters.
    pub max_string_length: usize,
    pub max_call_args: usize,
    /// `|base|` above this rejects `**`.
    pub max_power_base: u32,
    /// `|exponent|` above this rejects `**`.
    pub max_power_exponent: u32,
    pub timeout_ms: u64,
}

impl Default for EvaluatorLimits {
    fn default() -> Self {
        Self {
            max_expression_length: 1_000,
            max_nodes: 100,
            max_depth: 50,
            max_string_length: 1_000,
            max_call_args: 10,
            max_power_base: 1_000,
            max_power_exponent: 100,
            timeout_ms: 1_000,
        }
    }
}

impl EvaluatorLimits {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Rejects limit sets that would disable a guard entirely.
    pub fn validate(&self) -> Result<(), LimitsError> {
        let zeroed = [
            ("max_expression_length", self.max_expression_length == 0),
            ("max_nodes", self.max_nodes == 0),
            ("max_depth", self.max_depth == 0),
            ("max_string_length", self.max_string_length == 0),
            ("timeout_ms", self.timeout_ms == 0),
        ];
        if let Some((name, _)) = zeroed.iter().find(|(_, is_zero)| *is_zero) {
            return Err(LimitsError(format!("{name} must be non-zero")));
        }
        Ok(())
    }
}
