//! Domain validators layered on the string and structure primitives.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use tracing::warn;

use crate::patterns::DANGEROUS_SCHEMES;
use crate::string::{reject, type_name};
use crate::{SanitizationPolicy, StringOptions, ValidationError, ValidationErrorKind};

const MAX_EMAIL_LENGTH: usize = 255;
const MAX_DATETIME_LENGTH: usize = 50;
const MAX_PRODUCT_ID_LENGTH: usize = 100;
const MAX_PRODUCT_NAME_LENGTH: usize = 255;
const SAFE_FLOAT_RANGE: f64 = 1e308;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Exactly thirteen ASCII digits. Anything else is treated as absent.
#[must_use]
pub fn validate_ean13(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (trimmed.len() == 13 && trimmed.bytes().all(|b| b.is_ascii_digit()))
        .then(|| trimmed.to_string())
}

impl SanitizationPolicy {
    /// Trimmed, lowercased address checked against a light RFC 5322 shape.
    pub fn validate_email(&self, email: &str) -> Result<String, ValidationError> {
        let email = email.trim().to_lowercase();
        if email.len() > MAX_EMAIL_LENGTH {
            return Err(reject(
                ValidationErrorKind::TooLong,
                format!("email exceeds {MAX_EMAIL_LENGTH} characters"),
            ));
        }
        if !self.email.is_match(&email) {
            return Err(reject(ValidationErrorKind::InvalidFormat, "invalid email format"));
        }
        if self.sql.is_match(&email) {
            return Err(reject(
                ValidationErrorKind::SqlInjection,
                "email matches an SQL injection signature",
            ));
        }
        Ok(email)
    }

    /// Sanitizes, then requires an ISO 8601 date or datetime (offset optional).
    pub fn validate_iso_datetime(&self, value: &str) -> Result<String, ValidationError> {
        let value = self.sanitize_string(value, MAX_DATETIME_LENGTH, StringOptions::default())?;
        if parses_as_iso8601(&value) {
            Ok(value)
        } else {
            Err(reject(
                ValidationErrorKind::InvalidFormat,
                "invalid ISO 8601 datetime",
            ))
        }
    }

    /// `field OP value ((AND|OR) field OP value)*`. The SQL signature is
    /// checked first because some payloads satisfy the grammar.
    pub fn validate_filter_expression(&self, expression: &str) -> Result<String, ValidationError> {
        if self.sql.is_match(expression) {
            return Err(reject(
                ValidationErrorKind::SqlInjection,
                "filter expression matches an SQL injection signature",
            ));
        }
        if !self.filter.is_match(expression) {
            return Err(reject(
                ValidationErrorKind::InvalidFormat,
                "invalid filter expression format",
            ));
        }
        Ok(expression.to_string())
    }

    /// Numbers and numeric strings; integers unless `allow_float`.
    pub fn sanitize_number(&self, value: &Value, allow_float: bool) -> Result<Value, ValidationError> {
        let number = match value {
            Value::String(text) => {
                let text = text.trim();
                if self.sql.is_match(text) {
                    return Err(reject(
                        ValidationErrorKind::SqlInjection,
                        "numeric string matches an SQL injection signature",
                    ));
                }
                let parsed = if allow_float && text.contains(['.', 'e', 'E']) {
                    text.parse::<f64>().ok().map(Parsed::Float)
                } else {
                    text.parse::<i64>()
                        .ok()
                        .map(Parsed::Int)
                        .or_else(|| text.parse::<f64>().ok().map(Parsed::Float))
                };
                parsed.ok_or_else(|| reject(ValidationErrorKind::InvalidFormat, "not a number"))?
            }
            Value::Bool(flag) => Parsed::Int(i64::from(*flag)),
            Value::Number(number) => match number.as_i64() {
                Some(int) => Parsed::Int(int),
                None => Parsed::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            other => {
                return Err(reject(
                    ValidationErrorKind::WrongType,
                    format!("cannot convert {} to number", type_name(other)),
                ))
            }
        };
        match number {
            Parsed::Int(int) if allow_float => finite(int as f64),
            Parsed::Int(int) => Ok(Value::from(int)),
            Parsed::Float(float) if allow_float => finite(float),
            Parsed::Float(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => {
                Ok(Value::from(float as i64))
            }
            Parsed::Float(_) => Err(reject(
                ValidationErrorKind::InvalidFormat,
                "float not allowed, expected integer",
            )),
        }
    }

    /// Booleans, numbers, and the usual yes/no spellings.
    pub fn sanitize_boolean(&self, value: &Value) -> Result<bool, ValidationError> {
        match value {
            Value::Bool(flag) => Ok(*flag),
            Value::Number(number) => Ok(number.as_f64().is_some_and(|n| n != 0.0)),
            Value::String(text) => match text.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" | "on" => Ok(true),
                "false" | "0" | "no" | "n" | "off" | "" => Ok(false),
                _ => Err(reject(
                    ValidationErrorKind::InvalidFormat,
                    "unrecognised boolean spelling",
                )),
            },
            other => Err(reject(
                ValidationErrorKind::WrongType,
                format!("cannot convert {} to boolean", type_name(other)),
            )),
        }
    }

    /// Relative paths only, no traversal, no shell metacharacters.
    pub fn validate_path(&self, path: &str) -> Result<String, ValidationError> {
        if self.path.is_match(path) {
            return Err(reject(ValidationErrorKind::PathTraversal, "path traversal detected"));
        }
        if path.starts_with(['/', '\\']) {
            return Err(reject(
                ValidationErrorKind::PathTraversal,
                "absolute paths are not allowed",
            ));
        }
        if self.shell.is_match(path) {
            return Err(reject(
                ValidationErrorKind::CommandInjection,
                "path contains shell metacharacters",
            ));
        }
        self.sanitize_string(path, self.limits().max_string_length, StringOptions::default())
    }

    /// Requires one of `allowed_schemes` (see [`crate::DEFAULT_URL_SCHEMES`]).
    pub fn validate_url(&self, url: &str, allowed_schemes: &[&str]) -> Result<String, ValidationError> {
        let url = url.trim();
        let lowered = url.to_lowercase();
        if let Some(scheme) = DANGEROUS_SCHEMES.iter().find(|s| lowered.starts_with(*s)) {
            return Err(reject(
                ValidationErrorKind::XssAttempt,
                format!("dangerous scheme {scheme}"),
            ));
        }
        let allowed = allowed_schemes
            .iter()
            .any(|scheme| lowered.starts_with(&format!("{}://", scheme.to_lowercase())));
        if !allowed {
            return Err(reject(
                ValidationErrorKind::InvalidFormat,
                format!("url must use one of: {}", allowed_schemes.join(", ")),
            ));
        }
        if self.markup.is_match(url) {
            return Err(reject(ValidationErrorKind::XssAttempt, "markup in url"));
        }
        Ok(url.to_string())
    }

    /// Product payloads: `id` and `name` are required before and after
    /// sanitization; an invalid `ean` is dropped rather than failing.
    pub fn validate_product_data(&self, product: &Value) -> Result<Value, ValidationError> {
        let Value::Object(raw) = product else {
            return Err(reject(
                ValidationErrorKind::WrongType,
                format!("expected product mapping, got {}", type_name(product)),
            ));
        };
        for field in ["id", "name"] {
            if !raw.contains_key(field) {
                return Err(reject(
                    ValidationErrorKind::InvalidFormat,
                    format!("missing required field: {field}"),
                ));
            }
        }

        let Value::Object(mut sanitized) =
            self.sanitize_structure(product, self.limits().max_depth)?
        else {
            return Err(reject(ValidationErrorKind::WrongType, "product is not a mapping"));
        };

        match sanitized.get("id") {
            Some(Value::String(id)) => {
                let id = self.sanitize_string(id, MAX_PRODUCT_ID_LENGTH, StringOptions::default())?;
                sanitized.insert("id".into(), Value::String(id));
            }
            Some(Value::Number(_)) => {}
            Some(other) => {
                return Err(reject(
                    ValidationErrorKind::WrongType,
                    format!("invalid product id type: {}", type_name(other)),
                ))
            }
            None => {
                return Err(reject(
                    ValidationErrorKind::InvalidFormat,
                    "product id was rejected during sanitization",
                ))
            }
        }

        match sanitized.get("name") {
            Some(Value::String(name)) if !name.is_empty() => {
                if name.chars().count() > MAX_PRODUCT_NAME_LENGTH {
                    return Err(reject(
                        ValidationErrorKind::TooLong,
                        format!("product name exceeds {MAX_PRODUCT_NAME_LENGTH} characters"),
                    ));
                }
            }
            _ => {
                return Err(reject(
                    ValidationErrorKind::InvalidFormat,
                    "product name must be a non-empty string",
                ))
            }
        }

        let ean_invalid = match sanitized.get("ean") {
            Some(Value::String(ean)) => !ean.is_empty() && validate_ean13(ean).is_none(),
            Some(Value::Number(ean)) => validate_ean13(&ean.to_string()).is_none(),
            Some(Value::Null | Value::Bool(false)) | None => false,
            Some(_) => true,
        };
        if ean_invalid {
            warn!("dropping invalid EAN");
            sanitized.remove("ean");
        }

        Ok(Value::Object(sanitized))
    }
}

enum Parsed {
    Int(i64),
    Float(f64),
}

fn finite(value: f64) -> Result<Value, ValidationError> {
    if !(value.abs() < SAFE_FLOAT_RANGE) {
        return Err(reject(
            ValidationErrorKind::InvalidFormat,
            "number out of safe range",
        ));
    }
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| reject(ValidationErrorKind::InvalidFormat, "number is not finite"))
}

fn parses_as_iso8601(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NAIVE_DATETIME_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
        || DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy() -> SanitizationPolicy {
        SanitizationPolicy::standard().expect("policy compiles")
    }

    #[test]
    fn ean13_is_optional_not_fatal() {
        assert_eq!(validate_ean13("7701234567890"), Some("7701234567890".into()));
        assert_eq!(validate_ean13(" 7701234567890 "), Some("7701234567890".into()));
        assert_eq!(validate_ean13("770123456789"), None);
        assert_eq!(validate_ean13("77012345678A0"), None);
    }

    #[test]
    fn emails_are_normalised_and_checked() {
        let policy = policy();
        assert_eq!(policy.validate_email(" Ana.Gomez@Example.COM "), Ok("ana.gomez@example.com".into()));
        for bad in ["no-at-sign", "a@b", "a b@c.com", "x@y.c"] {
            assert_eq!(
                policy.validate_email(bad).expect_err("invalid").kind,
                ValidationErrorKind::InvalidFormat,
                "{bad}"
            );
        }
        assert_eq!(
            policy.validate_email("a--b@example.com").expect_err("sql").kind,
            ValidationErrorKind::SqlInjection
        );
    }

    #[test]
    fn iso_datetimes_parse() {
        let policy = policy();
        for good in [
            "2024-01-15T10:30:00Z",
            "2024-01-15T10:30:00+05:00",
            "2024-01-15T10:30:00.123",
            "2024-01-15 10:30:00",
            "2024-01-15",
        ] {
            assert_eq!(policy.validate_iso_datetime(good), Ok(good.to_string()), "{good}");
        }
        assert_eq!(
            policy.validate_iso_datetime("15/01/2024").expect_err("format").kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            policy.validate_iso_datetime("2024-13-45").expect_err("range").kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            policy.validate_iso_datetime("2024-01-15; DROP").expect_err("sql").kind,
            ValidationErrorKind::SqlInjection
        );
    }

    #[test]
    fn filter_expressions_check_injection_before_grammar() {
        let policy = policy();
        for good in [
            "price>=100",
            "price >= 100 AND quantity <= 50",
            "modified_date>=2024-01-01T00:00:00",
            "status = active or category != tools",
        ] {
            assert_eq!(policy.validate_filter_expression(good), Ok(good.to_string()), "{good}");
        }
        assert_eq!(
            policy.validate_filter_expression("id=1 OR 1=1").expect_err("sql").kind,
            ValidationErrorKind::SqlInjection
        );
        assert_eq!(
            policy.validate_filter_expression("price => 100").expect_err("grammar").kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            policy.validate_filter_expression("price>=100 XOR stock<1").expect_err("grammar").kind,
            ValidationErrorKind::InvalidFormat
        );
    }

    #[test]
    fn numbers_and_booleans_convert() {
        let policy = policy();
        assert_eq!(policy.sanitize_number(&json!(" 42 "), false), Ok(json!(42)));
        assert_eq!(policy.sanitize_number(&json!("3.5"), true), Ok(json!(3.5)));
        assert_eq!(policy.sanitize_number(&json!(7), true), Ok(json!(7.0)));
        assert_eq!(policy.sanitize_number(&json!(4.0), false), Ok(json!(4)));
        assert_eq!(
            policy.sanitize_number(&json!(4.5), false).expect_err("float").kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            policy.sanitize_number(&json!("1; DROP"), true).expect_err("sql").kind,
            ValidationErrorKind::SqlInjection
        );
        assert_eq!(
            policy.sanitize_number(&json!("inf"), true).expect_err("range").kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            policy.sanitize_number(&json!([1]), true).expect_err("type").kind,
            ValidationErrorKind::WrongType
        );

        assert_eq!(policy.sanitize_boolean(&json!(" Yes ")), Ok(true));
        assert_eq!(policy.sanitize_boolean(&json!("")), Ok(false));
        assert_eq!(policy.sanitize_boolean(&json!(0)), Ok(false));
        assert!(policy.sanitize_boolean(&json!("maybe")).is_err());
        assert!(policy.sanitize_boolean(&json!(null)).is_err());
    }

    #[test]
    fn paths_must_be_relative_and_clean() {
        let policy = policy();
        assert_eq!(policy.validate_path("exports/products.csv"), Ok("exports/products.csv".into()));
        assert_eq!(
            policy.validate_path("../secrets").expect_err("traversal").kind,
            ValidationErrorKind::PathTraversal
        );
        assert_eq!(
            policy.validate_path("/etc/passwd").expect_err("absolute").kind,
            ValidationErrorKind::PathTraversal
        );
        assert_eq!(
            policy.validate_path("file$(id)").expect_err("shell").kind,
            ValidationErrorKind::CommandInjection
        );
    }

    #[test]
    fn urls_require_allowed_schemes() {
        let policy = policy();
        let schemes = crate::DEFAULT_URL_SCHEMES;
        assert_eq!(
            policy.validate_url(" https://shop.example.com/p/1 ", schemes),
            Ok("https://shop.example.com/p/1".into())
        );
        for (url, kind) in [
            ("javascript:alert(1)", ValidationErrorKind::XssAttempt),
            ("data:text/html,hi", ValidationErrorKind::XssAttempt),
            ("ftp://files.example.com", ValidationErrorKind::InvalidFormat),
            ("https://x.example.com/?q=<script>", ValidationErrorKind::XssAttempt),
        ] {
            assert_eq!(policy.validate_url(url, schemes).expect_err("rejected").kind, kind, "{url}");
        }
        assert!(policy.validate_url("ftp://files.example.com", &["ftp"]).is_ok());
    }

    #[test]
    fn product_data_requires_id_and_name() {
        let policy = policy();
        let product = json!({
            "id": " SKU-1 ",
            "name": "Taladro percutor",
            "ean": "12345",
            "description": "<script>x</script>",
        });
        let clean = policy.validate_product_data(&product).expect("valid product");
        assert_eq!(clean, json!({ "id": "SKU-1", "name": "Taladro percutor" }));

        let with_ean = json!({ "id": 7, "name": "Martillo", "ean": "7701234567890" });
        assert_eq!(policy.validate_product_data(&with_ean), Ok(with_ean.clone()));

        assert_eq!(
            policy.validate_product_data(&json!({ "name": "x" })).expect_err("id").kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            policy.validate_product_data(&json!({ "id": 1, "name": "" })).expect_err("name").kind,
            ValidationErrorKind::InvalidFormat
        );
        assert_eq!(
            policy.validate_product_data(&json!({ "id": true, "name": "x" })).expect_err("id type").kind,
            ValidationErrorKind::WrongType
        );
        assert_eq!(
            policy.validate_product_data(&json!([1])).expect_err("shape").kind,
            ValidationErrorKind::WrongType
        );
    }
}
