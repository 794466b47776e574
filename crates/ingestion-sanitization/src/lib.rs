//! Sanitization filters and validation logic for untrusted ERP payloads.
//!
//! A [`SanitizationPolicy`] compiles every signature once; all entry points
//! borrow it. Rejections are [`ValidationError`]s carrying a
//! [`ValidationErrorKind`] and are logged at `warn` without the raw input.

mod error;
mod patterns;
mod policy;
mod redact;
mod string;
mod structure;
mod validators;

pub use error::{ValidationError, ValidationErrorKind};
pub use patterns::DEFAULT_URL_SCHEMES;
pub use policy::{SanitizationLimits, SanitizationPolicy};
pub use redact::{Redacted, RedactionRecord, RedactionRule, Redactor, REDACTED};
pub use string::{html_escape, sanitize_log_message, StringOptions};
pub use validators::validate_ean13;
