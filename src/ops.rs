//! Binary, comparison and logical operators over evaluated values.
//!
//! Numeric operations promote to float when either side is a float and stay
//! integer otherwise (`/` truncates on integers). `+` concatenates when
//! either side is a string. `&&` and `||` are truthiness-based and **eager**:
//! both operands are always evaluated before this module sees them, so an
//! error on the right side surfaces even when the left side decides the
//! result. Every operator rejects the internal range value.
//!
//! Functions return bare [`EvalErrorKind`]s; the evaluator attaches source
//! positions.

use crate::ast::BinaryOp;
use crate::error::EvalErrorKind;
use crate::value::Value;

pub fn eval_binary(left: &Value, op: BinaryOp, right: &Value) -> Result<Value, EvalErrorKind> {
    if left.is_range() || right.is_range() {
        return Err(EvalErrorKind::OperatorOnRange {
            op: op.symbol().to_string(),
        });
    }

    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => arithmetic(left, op, right, |a, b| a - b, |a, b| Some(a - b)),
        BinaryOp::Mul => arithmetic(left, op, right, |a, b| a * b, |a, b| Some(a * b)),
        BinaryOp::Div => divide(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Lt => less_than(left, right).map(Value::Bool),
        BinaryOp::Gt => less_than(right, left).map(Value::Bool),
        BinaryOp::Le => {
            if values_equal(left, right) {
                Ok(Value::Bool(true))
            } else {
                less_than(left, right).map(Value::Bool)
            }
        }
        BinaryOp::Ge => {
            if values_equal(left, right) {
                Ok(Value::Bool(true))
            } else {
                less_than(right, left).map(Value::Bool)
            }
        }
        BinaryOp::And => Ok(Value::Bool(is_truthy(left) && is_truthy(right))),
        BinaryOp::Or => Ok(Value::Bool(is_truthy(left) || is_truthy(right))),
    }
}

/// `+` with string coercion: if either side is a string, the other side is
/// stringified and concatenated.
fn add(left: &Value, right: &Value) -> Result<Value, EvalErrorKind> {
    if let Value::String(l) = left {
        return Ok(Value::String(format!("{l}{}", right.display_string())));
    }
    if let Value::String(r) = right {
        return Ok(Value::String(format!("{}{r}", left.display_string())));
    }
    arithmetic(left, BinaryOp::Add, right, |a, b| a + b, |a, b| Some(a + b))
}

/// Shared numeric dispatch: float path when either side is a float, integer
/// path when both are integers, error otherwise.
fn arithmetic(
    left: &Value,
    op: BinaryOp,
    right: &Value,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> Option<i64>,
) -> Result<Value, EvalErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => match int_op(*l, *r) {
            Some(v) => Ok(Value::Int(v)),
            None => Err(unsupported(left, op, right)),
        },
        _ => match (as_float(left), as_float(right)) {
            (Some(l), Some(r)) => Ok(Value::Float(float_op(l, r))),
            _ => Err(unsupported(left, op, right)),
        },
    }
}

fn divide(left: &Value, right: &Value) -> Result<Value, EvalErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            if *r == 0 {
                Err(EvalErrorKind::DivisionByZero)
            } else {
                Ok(Value::Int(l / r))
            }
        }
        _ => match (as_float(left), as_float(right)) {
            (Some(l), Some(r)) => {
                if r == 0.0 {
                    Err(EvalErrorKind::DivisionByZero)
                } else {
                    Ok(Value::Float(l / r))
                }
            }
            _ => Err(unsupported(left, BinaryOp::Div, right)),
        },
    }
}

/// `%` is integer-only.
fn modulo(left: &Value, right: &Value) -> Result<Value, EvalErrorKind> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            if *r == 0 {
                Err(EvalErrorKind::ModuloByZero)
            } else {
                Ok(Value::Int(l % r))
            }
        }
        _ => Err(unsupported(left, BinaryOp::Mod, right)),
    }
}

/// Equality with numeric cross-type comparison: an int and a float compare
/// by float value. Compound values never compare equal here.
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (as_float(left), as_float(right)) {
        return l == r;
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Bool(l), Value::Bool(r)) => l == r,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

/// `<` over numbers (with promotion) or strings (lexicographic).
fn less_than(left: &Value, right: &Value) -> Result<bool, EvalErrorKind> {
    if let (Some(l), Some(r)) = (as_float(left), as_float(right)) {
        return Ok(l < r);
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => Ok(l < r),
        _ => Err(EvalErrorKind::UnsupportedComparison {
            left: left.describe(),
            right: right.describe(),
        }),
    }
}

/// Falsy: `false`, `0`, `0.0`, the empty string, and null. Everything else,
/// including empty arrays and objects, is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) | Value::Range(_) => true,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn unsupported(left: &Value, op: BinaryOp, right: &Value) -> EvalErrorKind {
    EvalErrorKind::UnsupportedBinaryOp {
        left: left.describe(),
        op: op.symbol().to_string(),
        right: right.describe(),
    }
}
