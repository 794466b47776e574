use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by [`crate::evaluate`] and friends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("invalid syntax: {detail}")]
    InvalidSyntax { detail: String },
    #[error("forbidden construct: {detail}")]
    ForbiddenConstruct { detail: String },
    #[error("expression too complex: {detail}")]
    TooComplex { detail: String },
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },
    #[error("unsupported operator: {detail}")]
    UnsupportedOperator { detail: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("numeric overflow: {detail}")]
    NumericOverflow { detail: String },
    #[error("function {function} failed: {detail}")]
    FunctionFailed { function: String, detail: String },
    #[error("evaluation exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Fieldless discriminant of [`EvaluationError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationErrorKind {
    InvalidSyntax,
    ForbiddenConstruct,
    TooComplex,
    UndefinedVariable,
    UnsupportedOperator,
    DivisionByZero,
    NumericOverflow,
    FunctionFailed,
    Timeout,
}

impl EvaluationError {
    #[must_use]
    pub const fn kind(&self) -> EvaluationErrorKind {
        match self {
            Self::InvalidSyntax { .. } => EvaluationErrorKind::InvalidSyntax,
            Self::ForbiddenConstruct { .. } => EvaluationErrorKind::ForbiddenConstruct,
            Self::TooComplex { .. } => EvaluationErrorKind::TooComplex,
            Self::UndefinedVariable { .. } => EvaluationErrorKind::UndefinedVariable,
            Self::UnsupportedOperator { .. } => EvaluationErrorKind::UnsupportedOperator,
            Self::DivisionByZero => EvaluationErrorKind::DivisionByZero,
            Self::NumericOverflow { .. } => EvaluationErrorKind::NumericOverflow,
            Self::FunctionFailed { .. } => EvaluationErrorKind::FunctionFailed,
            Self::Timeout { .. } => EvaluationErrorKind::Timeout,
        }
    }

    pub(crate) fn syntax(detail: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            detail: detail.into(),
        }
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::ForbiddenConstruct {
            detail: detail.into(),
        }
    }

    pub(crate) fn too_complex(detail: impl Into<String>) -> Self {
        Self::TooComplex {
            detail: detail.into(),
        }
    }

    pub(crate) fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedOperator {
            detail: detail.into(),
        }
    }

    pub(crate) fn overflow(detail: impl Into<String>) -> Self {
        Self::NumericOverflow {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for EvaluationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidSyntax => "invalid_syntax",
            Self::ForbiddenConstruct => "forbidden_construct",
            Self::TooComplex => "too_complex",
            Self::UndefinedVariable => "undefined_variable",
            Self::UnsupportedOperator => "unsupported_operator",
            Self::DivisionByZero => "division_by_zero",
            Self::NumericOverflow => "numeric_overflow",
            Self::FunctionFailed => "function_failed",
            Self::Timeout => "timeout",
        };
        f.write_str(label)
    }
}
