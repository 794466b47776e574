use chrono::NaiveDate;
use serde_json::Value;
use transform_expression::Evaluator;

use crate::Transformation;

const SOURCE_DATE_FORMAT: &str = "YYYY-MM-DD";
const TARGET_DATE_FORMAT: &str = "ISO8601";

impl Transformation {
    /// Never fails: expression errors are absorbed by the evaluator's
    /// fallback wrappers and unknown formats leave the value untouched.
    pub fn apply(&self, value: &Value, evaluator: &Evaluator) -> Value {
        match self {
            Self::Format { from, to } => {
                if from == SOURCE_DATE_FORMAT && to == TARGET_DATE_FORMAT {
                    reformat_date(value).unwrap_or_else(|| value.clone())
                } else {
                    value.clone()
                }
            }
            Self::Calculation { logic } => evaluator.apply_transform(value, logic),
            Self::Lookup { table } => table
                .get(&lookup_key(value))
                .cloned()
                .unwrap_or_else(|| value.clone()),
            Self::Conditional {
                condition,
                true_value,
                false_value,
            } => {
                if evaluator.evaluate_condition(value, condition) {
                    true_value.clone()
                } else {
                    false_value.clone()
                }
            }
        }
    }
}

/// `2024-03-01` → `2024-03-01T00:00:00Z`.
fn reformat_date(value: &Value) -> Option<Value> {
    let text = value.as_str()?;
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Value::String(
        midnight.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    ))
}

fn lookup_key(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
