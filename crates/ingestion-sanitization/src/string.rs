use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{SanitizationPolicy, ValidationError, ValidationErrorKind};

const TRUNCATION_MARKER: &str = "...";

/// Switches for [`SanitizationPolicy::sanitize_string`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringOptions {
    /// HTML-escape markup instead of rejecting it.
    pub allow_markup_escaped: bool,
    /// Accept only ASCII letters, digits, whitespace and `- _ . , @`.
    pub strict_whitelist: bool,
}

impl StringOptions {
    #[must_use]
    pub const fn escape_markup() -> Self {
        Self {
            allow_markup_escaped: true,
            strict_whitelist: false,
        }
    }

    #[must_use]
    pub const fn strict() -> Self {
        Self {
            allow_markup_escaped: false,
            strict_whitelist: true,
        }
    }
}

impl SanitizationPolicy {
    /// Cleans one untrusted string.
    ///
    /// NUL characters are removed, then the length is checked. Signatures run
    /// in a fixed order: SQL, path traversal, markup, shell metacharacters.
    /// Markup either fails [`ValidationErrorKind::XssAttempt`] or, with
    /// [`StringOptions::allow_markup_escaped`], is HTML-escaped; the shell
    /// check then ignores the `&` and `;` the escaping introduced. Surrounding
    /// whitespace is trimmed last, and escaped output is held to `max_length`
    /// as well. Strict mode replaces the signature checks with the character
    /// whitelist and returns the value untrimmed.
    pub fn sanitize_string(
        &self,
        value: &str,
        max_length: usize,
        options: StringOptions,
    ) -> Result<String, ValidationError> {
        let value = value.replace('\0', "");
        let length = value.chars().count();
        if length > max_length {
            return Err(reject(
                ValidationErrorKind::TooLong,
                format!("string of {length} characters exceeds maximum of {max_length}"),
            ));
        }

        if options.strict_whitelist {
            if !self.strict.is_match(&value) {
                return Err(reject(
                    ValidationErrorKind::InvalidCharacters,
                    "string contains characters outside the allowed set",
                ));
            }
            return Ok(value);
        }

        if self.sql.is_match(&value) {
            return Err(reject(
                ValidationErrorKind::SqlInjection,
                "input matches an SQL injection signature",
            ));
        }
        if self.path.is_match(&value) {
            return Err(reject(
                ValidationErrorKind::PathTraversal,
                "input matches a path traversal signature",
            ));
        }

        let escaped = self.markup.is_match(&value);
        let value = if escaped {
            if !options.allow_markup_escaped {
                return Err(reject(
                    ValidationErrorKind::XssAttempt,
                    "input matches a script or markup signature",
                ));
            }
            html_escape(&value)
        } else {
            value
        };

        let shell_hit = self
            .shell
            .find_iter(&value)
            .any(|found| !(escaped && matches!(found.as_str(), "&" | ";")));
        if shell_hit {
            return Err(reject(
                ValidationErrorKind::CommandInjection,
                "input contains shell metacharacters",
            ));
        }

        let value = value.trim().to_string();
        if escaped {
            let length = value.chars().count();
            if length > max_length {
                return Err(reject(
                    ValidationErrorKind::TooLong,
                    format!(
                        "escaped string of {length} characters exceeds maximum of {max_length}"
                    ),
                ));
            }
        }
        Ok(value)
    }

    /// [`SanitizationPolicy::sanitize_string`] over a [`Value`]; anything but a
    /// string fails [`ValidationErrorKind::WrongType`].
    pub fn sanitize_string_value(
        &self,
        value: &Value,
        max_length: usize,
        options: StringOptions,
    ) -> Result<String, ValidationError> {
        match value {
            Value::String(text) => self.sanitize_string(text, max_length, options),
            other => Err(reject(
                ValidationErrorKind::WrongType,
                format!("expected string, got {}", type_name(other)),
            )),
        }
    }

    /// [`sanitize_log_message`] with this policy's log length.
    #[must_use]
    pub fn sanitize_log_message(&self, message: &str) -> String {
        sanitize_log_message(message, self.limits().max_log_length)
    }

    /// Datastore primary keys: operator-like fragments are rejected, then
    /// everything outside `[A-Za-z0-9-]` is stripped.
    pub fn sanitize_key(&self, value: &str, max_length: usize) -> Result<String, ValidationError> {
        if self.nosql.is_match(value) {
            return Err(reject(
                ValidationErrorKind::NoSqlInjection,
                "key contains an operator or document fragment",
            ));
        }
        let cleaned: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        if cleaned.is_empty() {
            return Err(reject(
                ValidationErrorKind::EmptyAfterSanitization,
                "key is empty after sanitization",
            ));
        }
        if cleaned.len() > max_length {
            return Err(reject(
                ValidationErrorKind::TooLong,
                format!("key of {} characters exceeds maximum of {max_length}", cleaned.len()),
            ));
        }
        Ok(cleaned)
    }
}

/// Removes ANSI escape sequences and every control character (C0, DEL, C1),
/// then truncates to `max_chars` with a `...` marker. Below the marker's own
/// length the text is cut without one. Never fails.
#[must_use]
pub fn sanitize_log_message(message: &str, max_chars: usize) -> String {
    let mut cleaned = String::with_capacity(message.len());
    let mut chars = message.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // parameters and intermediates, then one final byte
                for next in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if !ch.is_control() {
            cleaned.push(ch);
        }
    }
    if cleaned.chars().count() > max_chars {
        if max_chars < TRUNCATION_MARKER.len() {
            return cleaned.chars().take(max_chars).collect();
        }
        let keep = max_chars - TRUNCATION_MARKER.len();
        let mut truncated: String = cleaned.chars().take(keep).collect();
        truncated.push_str(TRUNCATION_MARKER);
        return truncated;
    }
    cleaned
}

#[must_use]
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

pub(crate) fn reject(kind: ValidationErrorKind, detail: impl Into<String>) -> ValidationError {
    warn!(kind = %kind, "input rejected");
    ValidationError::new(kind, detail)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
