//! Operator Table
//!
//! Pure value-level semantics for binary and unary operators. Short-circuit
//! `&&`/`||` and variable write-back live in the evaluator because they need
//! the AST and the environment.

use crate::interpreter::errors::{EngineError, EngineResult};
use crate::interpreter::types::Value;

/// The arithmetic operator behind a compound assignment (`+=` -> `+`).
pub fn compound_base(op: &str) -> Option<&str> {
    match op {
        "+=" | "-=" | "*=" | "/=" | "%=" | "**=" | "<<=" | ">>=" | "&=" | "|=" | "^=" => {
            Some(&op[..op.len() - 1])
        }
        _ => None,
    }
}

fn num(value: &Value) -> EngineResult<f64> {
    value.to_number()
}

fn int(value: &Value) -> EngineResult<i64> {
    value.to_integer()
}

/// Apply a non-short-circuit binary operator.
pub fn apply_binary(op: &str, left: &Value, right: &Value) -> EngineResult<Value> {
    let value = match op {
        "+" => Value::Number(num(left)? + num(right)?),
        "-" => Value::Number(num(left)? - num(right)?),
        "*" => Value::Number(num(left)? * num(right)?),
        "/" | "%" => {
            let (a, b) = (num(left)?, num(right)?);
            if b == 0.0 {
                return Err(EngineError::DivideByZero {
                    operator: op.to_string(),
                });
            }
            Value::Number(if op == "/" { a / b } else { a % b })
        }
        "**" => Value::Number(num(left)?.powf(num(right)?)),

        "==" => Value::Bool(left == right),
        "!=" => Value::Bool(left != right),
        "<" => Value::Bool(num(left)? < num(right)?),
        ">" => Value::Bool(num(left)? > num(right)?),
        "<=" => Value::Bool(num(left)? <= num(right)?),
        ">=" => Value::Bool(num(left)? >= num(right)?),

        "&" => Value::Number((int(left)? & int(right)?) as f64),
        "|" => Value::Number((int(left)? | int(right)?) as f64),
        "^" => Value::Number((int(left)? ^ int(right)?) as f64),
        "<<" => Value::Number(int(left)?.wrapping_shl((int(right)? & 63) as u32) as f64),
        ">>" => Value::Number(int(left)?.wrapping_shr((int(right)? & 63) as u32) as f64),

        "++" => Value::Number(num(left)? + 1.0),
        "--" => Value::Number(num(left)? - 1.0),

        _ => return Err(EngineError::type_error(format!("unknown operator \"{}\"", op))),
    };
    Ok(value)
}

/// Apply a prefix unary operator.
pub fn apply_unary(op: &str, operand: &Value) -> EngineResult<Value> {
    match op {
        "!" => Ok(Value::Bool(!operand.is_truthy())),
        "~" => Ok(Value::Number(!int(operand)? as f64)),
        "-" => Ok(Value::Number(-num(operand)?)),
        _ => Err(EngineError::type_error(format!("unknown operator \"{}\"", op))),
    }
}
