//! Python expression grammar in, closed [`Expr`] out.
//!
//! Parsing is delegated to `rustpython-parser` in expression mode, so
//! statements never parse. [`permitted_children`] is the one exhaustive match
//! deciding which parse-tree nodes may appear; [`lower`] converts a tree that
//! already passed validation.
//!
//! The lowercase spellings `true`, `false` and `null` are read as literals.

use rustpython_parser::{ast as py, Parse};

use crate::ast::{BinaryOp, BoolOp, CompareOp, Expr, Literal, UnaryOp};
use crate::builtins::Builtin;
use crate::EvaluationError;

const SOURCE_PATH: &str = "<expr>";

pub(crate) fn parse(source: &str) -> Result<py::Expr, EvaluationError> {
    py::Expr::parse(source.trim_start(), SOURCE_PATH)
        .map_err(|err| EvaluationError::syntax(err.to_string()))
}

/// Children of a node the interpreter can run. Every other node kind is a
/// [`EvaluationError::ForbiddenConstruct`].
pub(crate) fn permitted_children(node: &py::Expr) -> Result<Vec<&py::Expr>, EvaluationError> {
    let construct = match node {
        py::Expr::Constant(constant) => {
            if let Err(err @ EvaluationError::ForbiddenConstruct { .. }) = literal(&constant.value)
            {
                return Err(err);
            }
            return Ok(Vec::new());
        }
        py::Expr::Name(_) => return Ok(Vec::new()),
        py::Expr::UnaryOp(unary) => return Ok(vec![unary.operand.as_ref()]),
        py::Expr::BinOp(binary) => return Ok(vec![binary.left.as_ref(), binary.right.as_ref()]),
        py::Expr::BoolOp(chain) => return Ok(chain.values.iter().collect()),
        py::Expr::Compare(compare) => {
            return Ok(std::iter::once(compare.left.as_ref())
                .chain(&compare.comparators)
                .collect())
        }
        py::Expr::Call(call) => {
            callee(call)?;
            return Ok(std::iter::once(call.func.as_ref())
                .chain(&call.args)
                .collect());
        }
        py::Expr::Attribute(attribute) => {
            return Err(EvaluationError::forbidden(format!(
                "attribute access (.{}) is not allowed",
                attribute.attr.as_str()
            )))
        }
        py::Expr::Subscript(_) | py::Expr::Slice(_) => "subscript access",
        py::Expr::ListComp(_) => "list comprehension",
        py::Expr::SetComp(_) => "set comprehension",
        py::Expr::DictComp(_) => "dict comprehension",
        py::Expr::GeneratorExp(_) => "generator expression",
        py::Expr::Lambda(_) => "lambda",
        py::Expr::IfExp(_) => "conditional expression",
        py::Expr::JoinedStr(_) | py::Expr::FormattedValue(_) => "f-string",
        py::Expr::NamedExpr(_) => "assignment expression",
        py::Expr::List(_) => "list literal",
        py::Expr::Tuple(_) => "tuple literal",
        py::Expr::Set(_) => "set literal",
        py::Expr::Dict(_) => "dict literal",
        py::Expr::Starred(_) => "argument unpacking",
        py::Expr::Await(_) | py::Expr::Yield(_) | py::Expr::YieldFrom(_) => "await or yield",
    };
    Err(EvaluationError::forbidden(format!(
        "{construct} is not allowed"
    )))
}

/// Converts a validated parse tree.
pub(crate) fn lower(node: &py::Expr) -> Result<Expr, EvaluationError> {
    let expr = match node {
        py::Expr::Constant(constant) => Expr::Literal(literal(&constant.value)?),
        py::Expr::Name(name) => match name.id.as_str() {
            "true" => Expr::Literal(Literal::Bool(true)),
            "false" => Expr::Literal(Literal::Bool(false)),
            "null" => Expr::Literal(Literal::None),
            other => Expr::Name(other.to_string()),
        },
        py::Expr::UnaryOp(unary) => Expr::Unary {
            op: unary_op(&unary.op),
            operand: Box::new(lower(&unary.operand)?),
        },
        py::Expr::BinOp(binary) => Expr::Binary {
            op: binary_op(&binary.op),
            left: Box::new(lower(&binary.left)?),
            right: Box::new(lower(&binary.right)?),
        },
        py::Expr::BoolOp(chain) => Expr::Bool {
            op: match chain.op {
                py::BoolOp::And => BoolOp::And,
                py::BoolOp::Or => BoolOp::Or,
            },
            values: lower_all(&chain.values)?,
        },
        py::Expr::Compare(compare) => Expr::Compare {
            left: Box::new(lower(&compare.left)?),
            ops: compare.ops.iter().map(compare_op).collect(),
            comparators: lower_all(&compare.comparators)?,
        },
        py::Expr::Call(call) => Expr::Call {
            function: callee(call)?,
            args: lower_all(&call.args)?,
        },
        _ => {
            permitted_children(node)?;
            return Err(EvaluationError::forbidden(
                "construct outside the expression language",
            ));
        }
    };
    Ok(expr)
}

fn lower_all(nodes: &[py::Expr]) -> Result<Vec<Expr>, EvaluationError> {
    nodes.iter().map(lower).collect()
}

/// Only whitelisted functions, called by bare name with positional arguments.
fn callee(call: &py::ExprCall) -> Result<Builtin, EvaluationError> {
    let py::Expr::Name(name) = call.func.as_ref() else {
        permitted_children(&call.func)?;
        return Err(EvaluationError::forbidden(
            "only named functions can be called",
        ));
    };
    let builtin = Builtin::from_name(name.id.as_str()).ok_or_else(|| {
        EvaluationError::forbidden(format!(
            "function {:?} is not allowed",
            name.id.as_str()
        ))
    })?;
    if !call.keywords.is_empty() {
        return Err(EvaluationError::forbidden(format!(
            "keyword arguments to {}() are not allowed",
            builtin.name()
        )));
    }
    Ok(builtin)
}

fn literal(constant: &py::Constant) -> Result<Literal, EvaluationError> {
    match constant {
        py::Constant::None => Ok(Literal::None),
        py::Constant::Bool(flag) => Ok(Literal::Bool(*flag)),
        py::Constant::Str(text) => Ok(Literal::Str(text.clone())),
        py::Constant::Float(value) => Ok(Literal::Float(*value)),
        py::Constant::Int(value) => value
            .to_string()
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|_| EvaluationError::overflow("integer literal exceeds 64 bits")),
        py::Constant::Bytes(_) => Err(EvaluationError::forbidden(
            "bytes literals are not allowed",
        )),
        py::Constant::Complex { .. } => Err(EvaluationError::forbidden(
            "complex literals are not allowed",
        )),
        py::Constant::Tuple(_) => Err(EvaluationError::forbidden(
            "tuple literals are not allowed",
        )),
        py::Constant::Ellipsis => Err(EvaluationError::forbidden("ellipsis is not allowed")),
    }
}

fn unary_op(op: &py::UnaryOp) -> UnaryOp {
    match op {
        py::UnaryOp::UAdd => UnaryOp::Plus,
        py::UnaryOp::USub => UnaryOp::Minus,
        py::UnaryOp::Not => UnaryOp::Not,
        py::UnaryOp::Invert => UnaryOp::Invert,
    }
}

fn binary_op(op: &py::Operator) -> BinaryOp {
    match op {
        py::Operator::Add => BinaryOp::Add,
        py::Operator::Sub => BinaryOp::Sub,
        py::Operator::Mult => BinaryOp::Mul,
        py::Operator::Div => BinaryOp::Div,
        py::Operator::FloorDiv => BinaryOp::FloorDiv,
        py::Operator::Mod => BinaryOp::Mod,
        py::Operator::Pow => BinaryOp::Pow,
        py::Operator::MatMult => BinaryOp::MatMul,
        py::Operator::BitAnd => BinaryOp::BitAnd,
        py::Operator::BitOr => BinaryOp::BitOr,
        py::Operator::BitXor => BinaryOp::BitXor,
        py::Operator::LShift => BinaryOp::LShift,
        py::Operator::RShift => BinaryOp::RShift,
    }
}

fn compare_op(op: &py::CmpOp) -> CompareOp {
    match op {
        py::CmpOp::Eq => CompareOp::Eq,
        py::CmpOp::NotEq => CompareOp::NotEq,
        py::CmpOp::Lt => CompareOp::Lt,
        py::CmpOp::LtE => CompareOp::LtE,
        py::CmpOp::Gt => CompareOp::Gt,
        py::CmpOp::GtE => CompareOp::GtE,
        py::CmpOp::In => CompareOp::In,
        py::CmpOp::NotIn => CompareOp::NotIn,
        py::CmpOp::Is => CompareOp::Is,
        py::CmpOp::IsNot => CompareOp::IsNot,
    }
}
