//! Recursive sanitization of mapping/sequence trees.
//!
//! Failures on individual keys, values and elements drop that entry and the
//! walk continues. [`ValidationErrorKind::TooDeep`] is the exception: it
//! aborts the whole call wherever it is raised.

use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::string::{reject, type_name};
use crate::{SanitizationPolicy, StringOptions, ValidationError, ValidationErrorKind};

impl SanitizationPolicy {
    /// Sanitizes a top-level mapping or sequence. Scalars fail
    /// [`ValidationErrorKind::WrongType`].
    pub fn sanitize_structure(
        &self,
        value: &Value,
        max_depth: usize,
    ) -> Result<Value, ValidationError> {
        match value {
            Value::Object(_) | Value::Array(_) => self.sanitize_node(value, 0, max_depth),
            other => Err(reject(
                ValidationErrorKind::WrongType,
                format!("expected mapping or sequence, got {}", type_name(other)),
            )),
        }
    }

    /// Sanitizes any value with the same dispatch used for container entries,
    /// at depth zero and the policy's depth limit.
    pub fn sanitize_value(&self, value: &Value) -> Result<Value, ValidationError> {
        self.sanitize_node(value, 0, self.limits().max_depth)
    }

    fn sanitize_node(
        &self,
        value: &Value,
        depth: usize,
        max_depth: usize,
    ) -> Result<Value, ValidationError> {
        if depth > max_depth {
            return Err(reject(
                ValidationErrorKind::TooDeep,
                format!("nesting exceeds maximum depth of {max_depth}"),
            ));
        }
        match value {
            Value::Null | Value::Bool(_) => Ok(value.clone()),
            Value::Number(number) => Ok(self.clamp(number)),
            Value::String(text) => self
                .sanitize_string(text, self.limits().max_string_length, StringOptions::default())
                .map(Value::String),
            Value::Object(map) => self.sanitize_map(map, depth, max_depth).map(Value::Object),
            Value::Array(items) => self.sanitize_sequence(items, depth, max_depth).map(Value::Array),
        }
    }

    fn sanitize_map(
        &self,
        map: &Map<String, Value>,
        depth: usize,
        max_depth: usize,
    ) -> Result<Map<String, Value>, ValidationError> {
        let mut sanitized = Map::new();
        for (key, value) in map {
            let Ok(clean_key) =
                self.sanitize_string(key, self.limits().max_key_length, StringOptions::default())
            else {
                warn!(key_len = key.len(), "dropping entry with rejected key");
                continue;
            };
            match self.sanitize_node(value, depth + 1, max_depth) {
                Ok(clean) => {
                    sanitized.insert(clean_key, clean);
                }
                Err(err) if err.kind == ValidationErrorKind::TooDeep => return Err(err),
                Err(err) => {
                    warn!(
                        key = %self.sanitize_log_message(&clean_key),
                        kind = %err.kind,
                        "dropping entry with rejected value"
                    );
                }
            }
        }
        Ok(sanitized)
    }

    fn sanitize_sequence(
        &self,
        items: &[Value],
        depth: usize,
        max_depth: usize,
    ) -> Result<Vec<Value>, ValidationError> {
        let max = self.limits().max_sequence_length;
        if items.len() > max {
            warn!(len = items.len(), max, "truncating sequence");
        }
        let mut sanitized = Vec::with_capacity(items.len().min(max));
        for (index, item) in items.iter().take(max).enumerate() {
            match self.sanitize_node(item, depth + 1, max_depth) {
                Ok(clean) => sanitized.push(clean),
                Err(err) if err.kind == ValidationErrorKind::TooDeep => return Err(err),
                Err(err) => warn!(index, kind = %err.kind, "dropping rejected element"),
            }
        }
        Ok(sanitized)
    }

    /// Clamps magnitudes beyond the numeric ceiling, keeping integers integral.
    fn clamp(&self, number: &Number) -> Value {
        let ceiling = self.limits().numeric_ceiling;
        let magnitude = number.as_f64().map_or(f64::INFINITY, f64::abs);
        if magnitude <= ceiling {
            return Value::Number(number.clone());
        }
        let negative = number.as_f64().is_some_and(|value| value < 0.0);
        warn!(negative, "clamping out-of-range number");
        let bound = if negative { -ceiling } else { ceiling };
        if number.is_f64() {
            Number::from_f64(bound).map_or(Value::Null, Value::Number)
        } else {
            Value::from(bound as i64)
        }
    }
}
