//! Limits and compiled signatures shared by every sanitizer entry point.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::patterns;
use crate::{ValidationError, ValidationErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizationLimits {
    /// Default ceiling for string values inside structures.
    pub max_string_length: usize,
    /// Ceiling for mapping keys inside structures.
    pub max_key_length: usize,
    pub max_log_length: usize,
    pub max_depth: usize,
    /// Sequences longer than this are truncated before recursing.
    pub max_sequence_length: usize,
    pub max_datastore_key_length: usize,
    /// Numbers whose magnitude exceeds this are clamped.
    pub numeric_ceiling: f64,
}

impl Default for SanitizationLimits {
    fn default() -> Self {
        Self {
            max_string_length: 1_000,
            max_key_length: 100,
            max_log_length: 500,
            max_depth: 20,
            max_sequence_length: 10_000,
            max_datastore_key_length: 255,
            numeric_ceiling: 1e15,
        }
    }
}

impl SanitizationLimits {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let zeroed = [
            ("max_string_length", self.max_string_length == 0),
            ("max_key_length", self.max_key_length == 0),
            ("max_log_length", self.max_log_length < 4),
            ("max_depth", self.max_depth == 0),
            ("max_sequence_length", self.max_sequence_length == 0),
            ("max_datastore_key_length", self.max_datastore_key_length == 0),
        ];
        if let Some((name, _)) = zeroed.iter().find(|(_, invalid)| *invalid) {
            return Err(ValidationError::new(
                ValidationErrorKind::Configuration,
                format!("{name} is too small"),
            ));
        }
        if !(self.numeric_ceiling.is_finite() && self.numeric_ceiling > 0.0) {
            return Err(ValidationError::new(
                ValidationErrorKind::Configuration,
                "numeric_ceiling must be a positive finite number",
            ));
        }
        Ok(())
    }
}

/// Immutable set of compiled signatures plus limits. Build once and share by
/// reference; every method takes `&self`.
#[derive(Debug, Clone)]
pub struct SanitizationPolicy {
    limits: SanitizationLimits,
    pub(crate) sql: Regex,
    pub(crate) path: Regex,
    pub(crate) markup: Regex,
    pub(crate) shell: Regex,
    pub(crate) strict: Regex,
    pub(crate) nosql: Regex,
    pub(crate) email: Regex,
    pub(crate) filter: Regex,
}

impl SanitizationPolicy {
    pub fn new(limits: SanitizationLimits) -> Result<Self, ValidationError> {
        limits.validate()?;
        let markup = patterns::markup();
        let policy = Self {
            sql: compile_any("sql", patterns::SQL_INJECTION.iter().copied())?,
            path: compile_any("path", patterns::PATH_TRAVERSAL.iter().copied())?,
            markup: compile_any("markup", markup.iter().map(String::as_str))?,
            shell: compile("shell", patterns::SHELL_METACHARACTERS)?,
            strict: compile("strict", patterns::STRICT_WHITELIST)?,
            nosql: compile("nosql", patterns::NOSQL_INJECTION)?,
            email: compile("email", patterns::EMAIL)?,
            filter: compile("filter", &patterns::filter_expression())?,
            limits,
        };
        debug!(limits = ?policy.limits, "sanitization policy compiled");
        Ok(policy)
    }

    /// Policy with [`SanitizationLimits::default`].
    pub fn standard() -> Result<Self, ValidationError> {
        Self::new(SanitizationLimits::default())
    }

    #[must_use]
    pub const fn limits(&self) -> &SanitizationLimits {
        &self.limits
    }
}

fn compile(name: &str, source: &str) -> Result<Regex, ValidationError> {
    Regex::new(source).map_err(|err| {
        ValidationError::new(
            ValidationErrorKind::Configuration,
            format!("{name} pattern failed to compile: {err}"),
        )
    })
}

/// Case-insensitive alternation of every source.
fn compile_any<'a>(
    name: &str,
    sources: impl Iterator<Item = &'a str>,
) -> Result<Regex, ValidationError> {
    let joined = sources
        .map(|source| format!("(?:{source})"))
        .collect::<Vec<_>>()
        .join("|");
    compile(name, &format!("(?i){joined}"))
}
