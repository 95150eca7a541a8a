//! Interpreter Types
//!
//! Runtime values, callables and the knobs that configure evaluation.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::ast::types::Expr;
use crate::interpreter::environment::{Environment, WeakEnvironment};
use crate::interpreter::errors::{EngineError, EngineResult};

// ============================================================================
// Callables
// ============================================================================

/// Signature of a host-provided command.
pub type BuiltinFn = dyn Fn(&[Value]) -> EngineResult<Value>;

/// A host command bound in the root environment.
#[derive(Clone)]
pub struct Builtin {
    pub name: String,
    pub func: Rc<BuiltinFn>,
}

impl Builtin {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> EngineResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, args: &[Value]) -> EngineResult<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// How a closure holds its defining scope.
///
/// A closure bound in the scope it captured holds that scope weakly, so the
/// binding does not keep its own scope alive. Reads out of the scope hand
/// back a strong copy (see `Environment::get`).
#[derive(Clone)]
pub enum CapturedEnv {
    Strong(Environment),
    Weak(WeakEnvironment),
}

impl CapturedEnv {
    fn scope_id(&self) -> *const () {
        match self {
            CapturedEnv::Strong(env) => env.scope_id(),
            CapturedEnv::Weak(weak) => weak.scope_id(),
        }
    }
}

/// A user function paired with the environment it was defined in.
pub struct Closure {
    pub name: Option<String>,
    /// Bare `Variable` or `Assign` (with default) nodes
    pub params: Vec<Expr>,
    pub body: Rc<Expr>,
    pub env: CapturedEnv,
}

impl Closure {
    pub fn new(name: Option<String>, params: Vec<Expr>, body: Rc<Expr>, env: &Environment) -> Self {
        Closure {
            name,
            params,
            body,
            env: CapturedEnv::Strong(env.clone()),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }

    /// The defining scope, unless a weak capture outlived it.
    pub fn scope(&self) -> Option<Environment> {
        match &self.env {
            CapturedEnv::Strong(env) => Some(env.clone()),
            CapturedEnv::Weak(weak) => weak.upgrade(),
        }
    }

    /// Whether this closure captured exactly `env`.
    pub fn captures(&self, env: &Environment) -> bool {
        self.env.scope_id() == env.scope_id()
    }

    /// Same function over the same scope, with a different hold on it.
    pub(crate) fn with_env(&self, env: CapturedEnv) -> Closure {
        Closure {
            name: self.name.clone(),
            params: self.params.clone(),
            body: Rc::clone(&self.body),
            env,
        }
    }
}

// The captured environment may hold this closure, so Debug stays shallow.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .finish()
    }
}

// ============================================================================
// Values
// ============================================================================

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Function(Rc<Closure>),
    Builtin(Builtin),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) | Value::Builtin(_) => "function",
        }
    }

    /// Shell truthiness: only `false` is falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Builtin(_))
    }

    /// Numeric coercion: numbers and numeric strings.
    pub fn to_number(&self) -> EngineResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| EngineError::type_error("expected number")),
            _ => Err(EngineError::type_error("expected number")),
        }
    }

    /// Integer view for bitwise operators and indexes.
    pub fn to_integer(&self) -> EngineResult<i64> {
        Ok(self.to_number()?.trunc() as i64)
    }

    /// Bool results stored through the legacy write-back path become 1/0.
    pub fn coerce_bool(self) -> Self {
        match self {
            Value::Bool(b) => Value::Number(if b { 1.0 } else { 0.0 }),
            other => other,
        }
    }

    /// Element count for collections, character count otherwise.
    pub fn len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            Value::Str(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items to iterate: list items, map values, or the value itself.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::List(items) => items,
            Value::Map(map) => map.into_values().collect(),
            other => vec![other],
        }
    }
}

/// Render a number the way the shell prints it: integral values lose
/// their fraction.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
            Value::Map(map) => {
                let parts: Vec<String> = map.values().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
            Value::Function(c) => write!(f, "function {}", c.display_name()),
            Value::Builtin(b) => write!(f, "builtin {}", b.name),
        }
    }
}

impl PartialEq for Value {
    /// Strict equality: no coercion between kinds.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => {
                Rc::ptr_eq(&a.body, &b.body) && a.env.scope_id() == b.env.scope_id()
            }
            (Value::Builtin(a), Value::Builtin(b)) => {
                Rc::as_ptr(&a.func) as *const () == Rc::as_ptr(&b.func) as *const ()
            }
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Function(_) | Value::Builtin(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Execution limits to prevent runaway recursion.
/// Loops are deliberately unbounded.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    /// Maximum nesting depth of user function calls
    pub max_call_depth: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
        }
    }
}

/// Which binary operators write their result back into a variable left
/// operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritebackMode {
    /// Compound assignments (`+=`, ...) and `++`/`--` only.
    #[default]
    AssignmentOnly,
    /// Every binary operator, so `a = 5; a < 10` leaves `a` at 1.
    AllOperators,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(
            Value::List(vec![Value::from(1.0), Value::from("b")]).to_string(),
            "1 b"
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Null.is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::str("").is_truthy());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::str(" 42 ").to_number().unwrap(), 42.0);
        assert_eq!(Value::Number(1.5).to_number().unwrap(), 1.5);
        assert!(matches!(
            Value::str("abc").to_number(),
            Err(EngineError::Type { .. })
        ));
        assert!(Value::Bool(true).to_number().is_err());
        assert!(Value::Null.to_number().is_err());
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(Value::from(1.0), Value::from(1.0));
        assert_ne!(Value::from(1.0), Value::from("1"));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn test_serialize() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), Value::from(2.0));
        map.insert("a".to_string(), Value::from(0.5));
        let value = Value::List(vec![Value::Null, Value::Bool(true), Value::Map(map)]);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"[null,true,{"b":2,"a":0.5}]"#
        );
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(Value::Bool(true).coerce_bool(), Value::Number(1.0));
        assert_eq!(Value::Bool(false).coerce_bool(), Value::Number(0.0));
        assert_eq!(Value::str("x").coerce_bool(), Value::str("x"));
    }
}
