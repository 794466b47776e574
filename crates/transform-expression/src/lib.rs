//! Sandboxed evaluation of tenant-supplied transformation expressions.
//!
//! Text goes through a length check, the Python expression grammar, a single
//! validation walk that rejects escape vectors (attribute access, subscripts,
//! comprehensions, lambdas, container literals, non-whitelisted calls), and
//! finally a bounded interpreter running under a wall-clock timeout.

mod ast;
mod builtins;
mod error;
mod interpret;
mod limits;
mod parser;
mod sandbox;
mod validate;
mod value;

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

pub use crate::ast::{BinaryOp, BoolOp, CompareOp, Expr, Literal, UnaryOp};
pub use crate::builtins::Builtin;
pub use crate::error::{EvaluationError, EvaluationErrorKind};
pub use crate::limits::{EvaluatorLimits, LimitsError};
pub use crate::validate::TreeStats;
pub use crate::value::is_truthy;

use crate::interpret::Interpreter;

/// Characters of expression text echoed into logs.
const LOG_PREVIEW_CHARS: usize = 80;

/// A parsed expression that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
    stats: TreeStats,
}

impl Expression {
    pub fn parse(text: &str, limits: &EvaluatorLimits) -> Result<Self, EvaluationError> {
        let length = text.chars().count();
        if length > limits.max_expression_length {
            return Err(EvaluationError::TooComplex {
                detail: format!(
                    "expression of {length} characters exceeds maximum of {}",
                    limits.max_expression_length
                ),
            });
        }
        let tree = parser::parse(text)?;
        let stats = validate::validate(&tree, limits)?;
        let root = parser::lower(&tree)?;
        Ok(Self { root, stats })
    }

    #[must_use]
    pub const fn root(&self) -> &Expr {
        &self.root
    }

    #[must_use]
    pub const fn stats(&self) -> TreeStats {
        self.stats
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    limits: EvaluatorLimits,
}

impl Evaluator {
    #[must_use]
    pub const fn new(limits: EvaluatorLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &EvaluatorLimits {
        &self.limits
    }

    /// Parses, validates and interprets `text` against `variables`.
    ///
    /// Interpretation runs on a worker thread bounded by
    /// [`EvaluatorLimits::timeout_ms`]; nothing computed by a timed-out
    /// worker is observable afterwards.
    pub fn evaluate(
        &self,
        text: &str,
        variables: &HashMap<String, Value>,
    ) -> Result<Value, EvaluationError> {
        let expression = Expression::parse(text, &self.limits)?;
        let limits = self.limits.clone();
        let variables = variables.clone();
        let timeout = limits.timeout();
        sandbox::run_bounded(timeout, move || {
            Interpreter::new(&variables, &limits)
                .with_deadline(Instant::now() + timeout)
                .run(&expression.root)
        })
    }

    /// Same pipeline as [`Evaluator::evaluate`], with interpretation on the
    /// tokio blocking pool under `tokio::time::timeout`.
    pub async fn evaluate_async(
        &self,
        text: &str,
        variables: &HashMap<String, Value>,
    ) -> Result<Value, EvaluationError> {
        let expression = Expression::parse(text, &self.limits)?;
        let limits = self.limits.clone();
        let variables = variables.clone();
        let timeout = limits.timeout();
        let timeout_ms = limits.timeout_ms;
        let worker = tokio::task::spawn_blocking(move || {
            Interpreter::new(&variables, &limits)
                .with_deadline(Instant::now() + timeout)
                .run(&expression.root)
        });
        match tokio::time::timeout(timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(EvaluationError::FunctionFailed {
                function: "evaluate".into(),
                detail: format!("evaluation worker failed: {join_error}"),
            }),
            Err(_) => Err(EvaluationError::Timeout { timeout_ms }),
        }
    }

    /// Evaluates `text` with `value` bound to the variable `value`. Any
    /// failure is logged and the input is returned unchanged.
    #[must_use]
    pub fn apply_transform(&self, value: &Value, text: &str) -> Value {
        match self.evaluate(text, &value_scope(value)) {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    kind = %err.kind(),
                    expression = ?preview(text),
                    "transformation skipped; keeping original value"
                );
                debug!(error = %err, "transformation failure detail");
                value.clone()
            }
        }
    }

    /// Truthiness of `text` evaluated with `value` bound; `false` on any failure.
    #[must_use]
    pub fn evaluate_condition(&self, value: &Value, text: &str) -> bool {
        match self.evaluate(text, &value_scope(value)) {
            Ok(result) => is_truthy(&result),
            Err(err) => {
                warn!(
                    kind = %err.kind(),
                    expression = ?preview(text),
                    "condition evaluation failed; treating as false"
                );
                debug!(error = %err, "condition failure detail");
                false
            }
        }
    }
}

fn value_scope(value: &Value) -> HashMap<String, Value> {
    HashMap::from([("value".to_string(), value.clone())])
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}

/// [`Evaluator::evaluate`] with default limits.
pub fn evaluate(text: &str, variables: &HashMap<String, Value>) -> Result<Value, EvaluationError> {
    Evaluator::default().evaluate(text, variables)
}

/// [`Evaluator::apply_transform`] with default limits.
#[must_use]
pub fn apply_transform(value: &Value, text: &str) -> Value {
    Evaluator::default().apply_transform(value, text)
}

/// [`Evaluator::evaluate_condition`] with default limits.
#[must_use]
pub fn evaluate_condition(value: &Value, text: &str) -> bool {
    Evaluator::default().evaluate_condition(value, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_checked_before_parsing() {
        let text = "(".repeat(1_001);
        assert!(matches!(
            Expression::parse(&text, &EvaluatorLimits::default()),
            Err(EvaluationError::TooComplex { .. })
        ));
    }

    #[test]
    fn escape_attempts_beat_every_other_failure() {
        let limits = EvaluatorLimits::default();
        let nested = format!("{}value.__class__{}", "(".repeat(51), ")".repeat(51));
        for text in [
            "value.__class__ if value else 0",
            nested.as_str(),
            "f'{value.__class__}'",
        ] {
            assert!(
                matches!(
                    Expression::parse(text, &limits),
                    Err(EvaluationError::ForbiddenConstruct { .. })
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn parsed_expression_reports_tree_shape() {
        let expression =
            Expression::parse("round(value, 2)", &EvaluatorLimits::default()).expect("valid");
        assert_eq!(expression.stats(), TreeStats { nodes: 4, depth: 2 });
        assert!(matches!(
            expression.root(),
            Expr::Call {
                function: Builtin::Round,
                ..
            }
        ));
    }
}
