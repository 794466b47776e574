//! Tree-walking interpreter over validated expressions.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, BoolOp, CompareOp, Expr, Literal, UnaryOp};
use crate::builtins::Builtin;
use crate::value::{is_truthy, type_name, values_equal, Num};
use crate::{EvaluationError, EvaluatorLimits};

/// Result of evaluating a node. A bare builtin name resolves to a function
/// operand, which has no value of its own.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Value(Value),
    Function(Builtin),
}

pub(crate) struct Interpreter<'a> {
    variables: &'a HashMap<String, Value>,
    limits: &'a EvaluatorLimits,
    deadline: Option<Instant>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(variables: &'a HashMap<String, Value>, limits: &'a EvaluatorLimits) -> Self {
        Self {
            variables,
            limits,
            deadline: None,
            depth: 0,
        }
    }

    /// Work past `deadline` stops at the next node with [`EvaluationError::Timeout`].
    pub(crate) fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn run(mut self, expr: &Expr) -> Result<Value, EvaluationError> {
        self.value(expr)
    }

    fn value(&mut self, expr: &Expr) -> Result<Value, EvaluationError> {
        match self.eval(expr)? {
            Operand::Value(value) => Ok(value),
            Operand::Function(builtin) => Err(EvaluationError::unsupported(format!(
                "function {} cannot be used as a value",
                builtin.name()
            ))),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Operand, EvaluationError> {
        self.depth += 1;
        let result = self.check_budget().and_then(|()| self.eval_node(expr));
        self.depth -= 1;
        result
    }

    fn check_budget(&self) -> Result<(), EvaluationError> {
        if self.depth > self.limits.max_depth {
            return Err(EvaluationError::too_complex(format!(
                "evaluation depth exceeds maximum of {}",
                self.limits.max_depth
            )));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(EvaluationError::Timeout {
                timeout_ms: self.limits.timeout_ms,
            });
        }
        Ok(())
    }

    fn eval_node(&mut self, expr: &Expr) -> Result<Operand, EvaluationError> {
        let value = match expr {
            Expr::Literal(literal) => self.literal(literal)?,
            Expr::Name(name) => return self.resolve(name),
            Expr::Unary { op, operand } => {
                let operand = self.value(operand)?;
                unary(*op, &operand)?
            }
            Expr::Binary { op, left, right } => {
                let left = self.value(left)?;
                let right = self.value(right)?;
                binary(*op, &left, &right, self.limits)?
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => self.compare(left, ops, comparators)?,
            Expr::Bool { op, values } => self.boolean(*op, values)?,
            Expr::Call { function, args } => self.call(*function, args)?,
        };
        Ok(Operand::Value(value))
    }

    fn literal(&self, literal: &Literal) -> Result<Value, EvaluationError> {
        match literal {
            Literal::Int(value) => Ok(Value::from(*value)),
            Literal::Float(value) => Num::Float(*value).into_value(),
            Literal::Bool(flag) => Ok(Value::Bool(*flag)),
            Literal::None => Ok(Value::Null),
            Literal::Str(text) => {
                let len = text.chars().count();
                if len > self.limits.max_string_length {
                    return Err(EvaluationError::too_complex(format!(
                        "string literal of {len} characters exceeds maximum of {}",
                        self.limits.max_string_length
                    )));
                }
                Ok(Value::String(text.clone()))
            }
        }
    }

    fn resolve(&self, name: &str) -> Result<Operand, EvaluationError> {
        if let Some(value) = self.variables.get(name) {
            return Ok(Operand::Value(value.clone()));
        }
        Builtin::from_name(name)
            .map(Operand::Function)
            .ok_or_else(|| EvaluationError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn compare(
        &mut self,
        left: &Expr,
        ops: &[CompareOp],
        comparators: &[Expr],
    ) -> Result<Value, EvaluationError> {
        let mut current = self.value(left)?;
        for (op, comparator) in ops.iter().zip(comparators) {
            let next = self.value(comparator)?;
            if !compare(*op, &current, &next)? {
                return Ok(Value::Bool(false));
            }
            current = next;
        }
        Ok(Value::Bool(true))
    }

    fn boolean(&mut self, op: BoolOp, values: &[Expr]) -> Result<Value, EvaluationError> {
        let stop_on = matches!(op, BoolOp::Or);
        for operand in values {
            let value = self.value(operand)?;
            if is_truthy(&value) == stop_on {
                return Ok(Value::Bool(stop_on));
            }
        }
        Ok(Value::Bool(!stop_on))
    }

    fn call(&mut self, builtin: Builtin, args: &[Expr]) -> Result<Value, EvaluationError> {
        if args.len() > self.limits.max_call_args {
            return Err(EvaluationError::too_complex(format!(
                "{}() called with {} arguments, maximum is {}",
                builtin.name(),
                args.len(),
                self.limits.max_call_args
            )));
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match self.eval(arg)? {
                Operand::Value(value) => values.push(value),
                Operand::Function(inner) => {
                    return Err(EvaluationError::FunctionFailed {
                        function: builtin.name().to_string(),
                        detail: format!("function {} is not a valid argument", inner.name()),
                    })
                }
            }
        }
        builtin
            .call(&values, self.limits)
            .map_err(|detail| EvaluationError::FunctionFailed {
                function: builtin.name().to_string(),
                detail,
            })
    }
}

fn unary(op: UnaryOp, operand: &Value) -> Result<Value, EvaluationError> {
    let symbol = match op {
        UnaryOp::Not => return Ok(Value::Bool(!is_truthy(operand))),
        UnaryOp::Invert => return Err(EvaluationError::unsupported("unary ~ is not allowed")),
        UnaryOp::Plus => "+",
        UnaryOp::Minus => "-",
    };
    let Some(number) = Num::from_value(operand) else {
        return Err(EvaluationError::unsupported(format!(
            "bad operand type for unary {symbol}: {}",
            type_name(operand)
        )));
    };
    match (op, number) {
        (UnaryOp::Minus, Num::Int(value)) => value
            .checked_neg()
            .map(Value::from)
            .ok_or_else(|| EvaluationError::overflow("integer negation overflowed")),
        (UnaryOp::Minus, Num::Float(value)) => Num::Float(-value).into_value(),
        _ => number.into_value(),
    }
}

fn binary(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    limits: &EvaluatorLimits,
) -> Result<Value, EvaluationError> {
    if let (BinaryOp::Add, Value::String(a), Value::String(b)) = (op, left, right) {
        let len = a.chars().count() + b.chars().count();
        if len > limits.max_string_length {
            return Err(EvaluationError::too_complex(format!(
                "concatenated string of {len} characters exceeds maximum of {}",
                limits.max_string_length
            )));
        }
        return Ok(Value::String(format!("{a}{b}")));
    }
    let (Some(a), Some(b)) = (Num::from_value(left), Num::from_value(right)) else {
        return Err(EvaluationError::unsupported(format!(
            "unsupported operand types for {op}: {} and {}",
            type_name(left),
            type_name(right)
        )));
    };
    let result = match op {
        BinaryOp::Add => checked(a, b, i64::checked_add, |x, y| x + y)?,
        BinaryOp::Sub => checked(a, b, i64::checked_sub, |x, y| x - y)?,
        BinaryOp::Mul => checked(a, b, i64::checked_mul, |x, y| x * y)?,
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(EvaluationError::DivisionByZero);
            }
            Num::Float(a.as_f64() / b.as_f64())
        }
        BinaryOp::FloorDiv => {
            if b.is_zero() {
                return Err(EvaluationError::DivisionByZero);
            }
            floor_div(a, b)?
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                return Err(EvaluationError::DivisionByZero);
            }
            modulo(a, b)?
        }
        BinaryOp::Pow => power(a, b, limits)?,
        BinaryOp::MatMul
        | BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::LShift
        | BinaryOp::RShift => {
            return Err(EvaluationError::unsupported(format!(
                "operator {op} is not allowed"
            )))
        }
    };
    result.into_value()
}

fn checked(
    a: Num,
    b: Num,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Num, EvaluationError> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_op(x, y)
            .map(Num::Int)
            .ok_or_else(|| EvaluationError::overflow("integer arithmetic overflowed")),
        _ => Ok(Num::Float(float_op(a.as_f64(), b.as_f64()))),
    }
}

fn floor_div(a: Num, b: Num) -> Result<Num, EvaluationError> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => {
            let quotient = x
                .checked_div(y)
                .ok_or_else(|| EvaluationError::overflow("integer division overflowed"))?;
            let adjust = x % y != 0 && ((x < 0) != (y < 0));
            Ok(Num::Int(if adjust { quotient - 1 } else { quotient }))
        }
        _ => Ok(Num::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

/// Remainder taking the sign of the divisor.
fn modulo(a: Num, b: Num) -> Result<Num, EvaluationError> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => {
            let rem = x
                .checked_rem(y)
                .ok_or_else(|| EvaluationError::overflow("integer remainder overflowed"))?;
            Ok(Num::Int(if rem != 0 && ((rem < 0) != (y < 0)) {
                rem + y
            } else {
                rem
            }))
        }
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let rem = x % y;
            Ok(Num::Float(if rem != 0.0 && ((rem < 0.0) != (y < 0.0)) {
                rem + y
            } else {
                rem
            }))
        }
    }
}

fn power(base: Num, exponent: Num, limits: &EvaluatorLimits) -> Result<Num, EvaluationError> {
    if base.as_f64().abs() > f64::from(limits.max_power_base) {
        return Err(EvaluationError::overflow(format!(
            "exponent base exceeds {}",
            limits.max_power_base
        )));
    }
    if exponent.as_f64().abs() > f64::from(limits.max_power_exponent) {
        return Err(EvaluationError::overflow(format!(
            "exponent exceeds {}",
            limits.max_power_exponent
        )));
    }
    let negative_exponent = exponent.as_f64() < 0.0;
    if base.is_zero() && negative_exponent {
        return Err(EvaluationError::DivisionByZero);
    }
    match (base, exponent) {
        (Num::Int(b), Num::Int(e)) if !negative_exponent => {
            let e = u32::try_from(e)
                .map_err(|_| EvaluationError::overflow("exponent out of range"))?;
            b.checked_pow(e)
                .map(Num::Int)
                .ok_or_else(|| EvaluationError::overflow("integer power overflowed"))
        }
        _ => {
            let (b, e) = (base.as_f64(), exponent.as_f64());
            if b < 0.0 && e.fract() != 0.0 {
                return Err(EvaluationError::unsupported(
                    "negative base with fractional exponent",
                ));
            }
            Ok(Num::Float(b.powf(e)))
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, EvaluationError> {
    let wanted: fn(Ordering) -> bool = match op {
        CompareOp::Eq => return Ok(values_equal(left, right)),
        CompareOp::NotEq => return Ok(!values_equal(left, right)),
        CompareOp::Lt => Ordering::is_lt,
        CompareOp::LtE => Ordering::is_le,
        CompareOp::Gt => Ordering::is_gt,
        CompareOp::GtE => Ordering::is_ge,
        CompareOp::In | CompareOp::NotIn | CompareOp::Is | CompareOp::IsNot => {
            return Err(EvaluationError::unsupported(format!(
                "comparison {op} is not allowed"
            )))
        }
    };
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (Num::from_value(left), Num::from_value(right)) {
            (Some(a), Some(b)) => a.compare(b),
            _ => {
                return Err(EvaluationError::unsupported(format!(
                    "'{op}' not supported between {} and {}",
                    type_name(left),
                    type_name(right)
                )))
            }
        },
    };
    Ok(ordering.is_some_and(wanted))
}
