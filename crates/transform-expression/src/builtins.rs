//! The closed table of functions an expression may call.
//!
//! Type coercions (`str`, `int`, `float`) and `min`/`max` are deliberately
//! absent. The table cannot be extended at runtime.

use serde_json::Value;

use crate::value::{round_half_even, type_name, Num};
use crate::EvaluatorLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Abs,
    Round,
    Upper,
    Lower,
    Strip,
    Ceil,
    Floor,
    Sqrt,
}

impl Builtin {
    pub const ALL: [Self; 9] = [
        Self::Len,
        Self::Abs,
        Self::Round,
        Self::Upper,
        Self::Lower,
        Self::Strip,
        Self::Ceil,
        Self::Floor,
        Self::Sqrt,
    ];

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Upper => "upper",
            Self::Lower => "lower",
            Self::Strip => "strip",
            Self::Ceil => "ceil",
            Self::Floor => "floor",
            Self::Sqrt => "sqrt",
        }
    }

    const fn arity(self) -> (usize, usize) {
        match self {
            Self::Round => (1, 2),
            _ => (1, 1),
        }
    }

    /// Applies the function. Errors carry a detail message only; the caller
    /// wraps them into [`crate::EvaluationError::FunctionFailed`].
    pub(crate) fn call(self, args: &[Value], limits: &EvaluatorLimits) -> Result<Value, String> {
        let (min, max) = self.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("exactly {min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(format!(
                "{}() takes {expected} argument(s) ({} given)",
                self.name(),
                args.len()
            ));
        }
        let first = &args[0];
        match self {
            Self::Len => length(first),
            Self::Abs => match numeric(self, first)? {
                Num::Int(value) => value
                    .checked_abs()
                    .map(Value::from)
                    .ok_or_else(|| "integer overflow".to_string()),
                Num::Float(value) => finite(value.abs()),
            },
            Self::Round => round(first, args.get(1)),
            Self::Upper => text(self, first, limits).map(|s| Value::from(s.to_uppercase())),
            Self::Lower => text(self, first, limits).map(|s| Value::from(s.to_lowercase())),
            Self::Strip => text(self, first, limits).map(|s| Value::from(s.trim())),
            Self::Ceil => to_int(numeric(self, first)?, f64::ceil),
            Self::Floor => to_int(numeric(self, first)?, f64::floor),
            Self::Sqrt => {
                let value = numeric(self, first)?.as_f64();
                if value < 0.0 {
                    return Err("math domain error".into());
                }
                finite(value.sqrt())
            }
        }
    }
}

fn numeric(builtin: Builtin, value: &Value) -> Result<Num, String> {
    Num::from_value(value).ok_or_else(|| {
        format!(
            "{}() requires a number, got {}",
            builtin.name(),
            type_name(value)
        )
    })
}

/// String argument truncated to the configured ceiling before use.
fn text(builtin: Builtin, value: &Value, limits: &EvaluatorLimits) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.chars().take(limits.max_string_length).collect()),
        other => Err(format!(
            "{}() requires a string, got {}",
            builtin.name(),
            type_name(other)
        )),
    }
}

fn length(value: &Value) -> Result<Value, String> {
    let len = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => return Err(format!("object of type {} has no len()", type_name(other))),
    };
    Ok(Value::from(len))
}

fn round(value: &Value, digits: Option<&Value>) -> Result<Value, String> {
    let number = numeric(Builtin::Round, value)?;
    let Some(digits) = digits else {
        return match number {
            Num::Int(_) => number.into_value().map_err(|err| err.to_string()),
            Num::Float(value) => to_int(Num::Float(value), round_half_even),
        };
    };
    let digits = match digits {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| "round() digits must be an integer".to_string())?,
        Value::Null => return round(value, None),
        other => {
            return Err(format!(
                "round() digits must be an integer, got {}",
                type_name(other)
            ))
        }
    };
    if digits.abs() > 15 {
        return Err("round() digits must be between -15 and 15".into());
    }
    let scale = 10f64.powi(digits as i32);
    let rounded = round_half_even(number.as_f64() * scale) / scale;
    match number {
        Num::Int(_) => to_int(Num::Float(rounded), |v| v),
        Num::Float(_) => finite(rounded),
    }
}

fn to_int(number: Num, op: fn(f64) -> f64) -> Result<Value, String> {
    match number {
        Num::Int(value) => Ok(Value::from(value)),
        Num::Float(value) => {
            let result = op(value);
            if !result.is_finite() || result < i64::MIN as f64 || result >= i64::MAX as f64 {
                return Err("result does not fit in an integer".into());
            }
            Ok(Value::from(result as i64))
        }
    }
}

fn finite(value: f64) -> Result<Value, String> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| "result is not a finite number".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(builtin: Builtin, args: &[Value]) -> Result<Value, String> {
        builtin.call(args, &EvaluatorLimits::default())
    }

    #[test]
    fn lookup_is_closed() {
        assert_eq!(Builtin::from_name("len"), Some(Builtin::Len));
        for excluded in ["str", "int", "float", "min", "max", "eval", "__import__", "pow"] {
            assert_eq!(Builtin::from_name(excluded), None, "{excluded} must not resolve");
        }
    }

    #[test]
    fn round_matches_banker_rounding() {
        assert_eq!(call(Builtin::Round, &[json!(2.5)]), Ok(json!(2)));
        assert_eq!(call(Builtin::Round, &[json!(3.14159), json!(2)]), Ok(json!(3.14)));
        assert_eq!(call(Builtin::Round, &[json!(1234), json!(-2)]), Ok(json!(1200)));
        assert_eq!(call(Builtin::Round, &[json!(7)]), Ok(json!(7)));
    }

    #[test]
    fn string_functions_require_strings_and_truncate() {
        assert_eq!(call(Builtin::Upper, &[json!("abc")]), Ok(json!("ABC")));
        assert_eq!(call(Builtin::Strip, &[json!("  x  ")]), Ok(json!("x")));
        assert!(call(Builtin::Lower, &[json!(12)]).is_err());
        let long = "a".repeat(5_000);
        let upper = call(Builtin::Upper, &[json!(long)]).expect("upper works");
        assert_eq!(upper.as_str().map(str::len), Some(1_000));
    }

    #[test]
    fn numeric_functions_reject_bad_input() {
        assert_eq!(call(Builtin::Abs, &[json!(-5)]), Ok(json!(5)));
        assert_eq!(call(Builtin::Ceil, &[json!(1.2)]), Ok(json!(2)));
        assert_eq!(call(Builtin::Floor, &[json!(-1.2)]), Ok(json!(-2)));
        assert_eq!(call(Builtin::Sqrt, &[json!(9)]), Ok(json!(3.0)));
        assert!(call(Builtin::Sqrt, &[json!(-1)]).is_err());
        assert!(call(Builtin::Abs, &[json!(i64::MIN)]).is_err());
        assert!(call(Builtin::Len, &[json!(5)]).is_err());
        assert!(call(Builtin::Len, &[json!("a"), json!("b")]).is_err());
    }
}
