//! Source value → declared field type.
//!
//! A sanitizer rejection is a hard failure for every type, as is JSON decoding
//! for `object`/`array` fields. Numeric text that is clean but unparseable
//! keeps the original value and logs.

use ingestion_sanitization::{SanitizationPolicy, StringOptions};
use serde_json::{Number, Value};
use tracing::warn;

use crate::FieldType;

const MAX_TEXT_LENGTH: usize = 1_000;
const MAX_NUMERIC_TEXT_LENGTH: usize = 50;
const TRUE_SPELLINGS: &[&str] = &["true", "1", "yes", "si", "s"];

pub(crate) fn convert(
    policy: &SanitizationPolicy,
    value: &Value,
    field_type: FieldType,
) -> Result<Value, String> {
    match field_type {
        FieldType::String => to_text(policy, value).map(Value::String),
        FieldType::Number | FieldType::Integer => to_number(policy, value, true),
        FieldType::Float => to_number(policy, value, false),
        FieldType::Boolean => Ok(Value::Bool(to_boolean(value))),
        FieldType::Object => match value {
            Value::String(text) => decode(text),
            other => Ok(other.clone()),
        },
        FieldType::Array => match value {
            Value::String(text) => decode(text),
            Value::Array(_) => Ok(value.clone()),
            other => Ok(Value::Array(vec![other.clone()])),
        },
        FieldType::Passthrough => Ok(value.clone()),
    }
}

/// String form of any value, sanitized.
fn to_text(policy: &SanitizationPolicy, value: &Value) -> Result<String, String> {
    let raw = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    sanitize(policy, &raw, MAX_TEXT_LENGTH)
}

fn to_number(policy: &SanitizationPolicy, value: &Value, integral: bool) -> Result<Value, String> {
    let parsed = match value {
        Value::String(text) => {
            let clean = sanitize(policy, &text.replace(',', "."), MAX_NUMERIC_TEXT_LENGTH)?;
            clean.parse::<f64>().map_err(|err| err.to_string())
        }
        Value::Number(number) => number.as_f64().ok_or_else(|| "not representable".to_string()),
        Value::Bool(flag) => Ok(if *flag { 1.0 } else { 0.0 }),
        _ => Err("not a number".to_string()),
    };
    let converted = parsed.and_then(|float| {
        if !float.is_finite() {
            return Err("not finite".to_string());
        }
        if integral {
            let rounded = round_half_even(float);
            if rounded.abs() >= i64::MAX as f64 {
                return Err("out of integer range".to_string());
            }
            Ok(Value::from(rounded as i64))
        } else {
            Number::from_f64(float)
                .map(Value::Number)
                .ok_or_else(|| "not finite".to_string())
        }
    });
    Ok(converted.unwrap_or_else(|reason| {
        let target_type = if integral { "integer" } else { "float" };
        warn!(target_type, reason = %reason, "numeric conversion kept original value");
        value.clone()
    }))
}

/// Rejections surface as the error kind alone so no raw input is echoed.
fn sanitize(policy: &SanitizationPolicy, text: &str, max_length: usize) -> Result<String, String> {
    policy
        .sanitize_string(text, max_length, StringOptions::default())
        .map_err(|err| err.kind.to_string())
}

fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => TRUE_SPELLINGS.contains(&text.to_lowercase().as_str()),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn decode(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|err| format!("invalid JSON: {err}"))
}

fn round_half_even(value: f64) -> f64 {
    if (value - value.trunc()).abs() == 0.5 {
        2.0 * (value / 2.0).round()
    } else {
        value.round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(value: Value, field_type: FieldType) -> Result<Value, String> {
        let policy = SanitizationPolicy::standard().expect("policy compiles");
        convert(&policy, &value, field_type)
    }

    #[test]
    fn strings_are_sanitized() {
        assert_eq!(run(json!("  Martillo  "), FieldType::String), Ok(json!("Martillo")));
        assert_eq!(run(json!(42), FieldType::String), Ok(json!("42")));
        assert_eq!(
            run(json!("<script>alert(1)</script>"), FieldType::String),
            Err("xss_attempt".to_string())
        );
        assert_eq!(run(json!("a; b"), FieldType::String), Err("sql_injection".to_string()));
    }

    #[test]
    fn hostile_numeric_text_is_rejected_not_kept() {
        assert_eq!(
            run(json!("1; DROP TABLE products"), FieldType::Float),
            Err("sql_injection".to_string())
        );
        assert_eq!(
            run(json!("$(reboot)"), FieldType::Integer),
            Err("command_injection".to_string())
        );
        assert_eq!(run(json!("9".repeat(60)), FieldType::Float), Err("too_long".to_string()));
    }

    #[test]
    fn integers_round_half_to_even() {
        assert_eq!(run(json!("12,5"), FieldType::Integer), Ok(json!(12)));
        assert_eq!(run(json!("13,5"), FieldType::Number), Ok(json!(14)));
        assert_eq!(run(json!(7.6), FieldType::Integer), Ok(json!(8)));
        assert_eq!(run(json!(true), FieldType::Integer), Ok(json!(1)));
        assert_eq!(run(json!("n/a"), FieldType::Integer), Ok(json!("n/a")));
        assert_eq!(run(json!([1]), FieldType::Integer), Ok(json!([1])));
    }

    #[test]
    fn floats_accept_comma_separator() {
        assert_eq!(run(json!("1234,56"), FieldType::Float), Ok(json!(1234.56)));
        assert_eq!(run(json!(3), FieldType::Float), Ok(json!(3.0)));
        assert_eq!(run(json!("inf"), FieldType::Float), Ok(json!("inf")));
    }

    #[test]
    fn booleans_accept_spanish_spellings() {
        for yes in ["true", "SI", "s", "1", "Yes"] {
            assert_eq!(run(json!(yes), FieldType::Boolean), Ok(json!(true)), "{yes}");
        }
        for no in ["false", "no", "N", ""] {
            assert_eq!(run(json!(no), FieldType::Boolean), Ok(json!(false)), "{no}");
        }
        assert_eq!(run(json!(0), FieldType::Boolean), Ok(json!(false)));
    }

    #[test]
    fn containers_decode_json_strings() {
        assert_eq!(run(json!("{\"a\":1}"), FieldType::Object), Ok(json!({ "a": 1 })));
        assert_eq!(run(json!("[1,2]"), FieldType::Array), Ok(json!([1, 2])));
        assert_eq!(run(json!(5), FieldType::Array), Ok(json!([5])));
        assert!(run(json!("{oops"), FieldType::Object).is_err());
        assert_eq!(run(json!(2.5), FieldType::Passthrough), Ok(json!(2.5)));
    }
}
