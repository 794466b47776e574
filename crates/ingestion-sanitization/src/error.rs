use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::string::sanitize_log_message;

/// Distinct rejection reasons a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    WrongType,
    TooLong,
    TooDeep,
    SqlInjection,
    XssAttempt,
    PathTraversal,
    CommandInjection,
    NoSqlInjection,
    InvalidCharacters,
    EmptyAfterSanitization,
    /// A domain validator (email, datetime, filter, number, url, product) rejected the shape.
    InvalidFormat,
    /// The policy itself could not be built.
    Configuration,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::WrongType => "wrong_type",
            Self::TooLong => "too_long",
            Self::TooDeep => "too_deep",
            Self::SqlInjection => "sql_injection",
            Self::XssAttempt => "xss_attempt",
            Self::PathTraversal => "path_traversal",
            Self::CommandInjection => "command_injection",
            Self::NoSqlInjection => "nosql_injection",
            Self::InvalidCharacters => "invalid_characters",
            Self::EmptyAfterSanitization => "empty_after_sanitization",
            Self::InvalidFormat => "invalid_format",
            Self::Configuration => "configuration",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub detail: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(kind: ValidationErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ValidationErrorKind {
        self.kind
    }

    /// HTTP status a service boundary should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind {
            ValidationErrorKind::Configuration => 500,
            _ => 400,
        }
    }

    /// Client-facing message. The detail is log-sanitized so nothing raw is echoed.
    #[must_use]
    pub fn client_detail(&self) -> String {
        format!("{}: {}", self.kind, sanitize_log_message(&self.detail, CLIENT_DETAIL_CHARS))
    }
}

const CLIENT_DETAIL_CHARS: usize = 200;
