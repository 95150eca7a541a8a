//! Tree-Walking Evaluator
//!
//! `Interpreter::evaluate` walks an AST node in an environment and returns
//! its value. Loop and conditional nodes are handled in `control_flow`,
//! function definitions and calls in `functions`.
//!
//! Word rule: a bare word (`name`, no `$`, no index) evaluates to the value
//! bound to it, or to its own text when unbound. `$name` evaluates to the
//! bound value or null.

use indexmap::IndexMap;

use crate::ast::types::{AssignNode, BinaryNode, Expr, Program, QuoteStyle, VariableNode};
use crate::interpreter::environment::Environment;
use crate::interpreter::errors::{EngineError, EngineResult};
use crate::interpreter::expansion::{expand_braces, expand_string};
use crate::interpreter::operators::{apply_binary, apply_unary, compound_base};
use crate::interpreter::types::{ExecutionLimits, Value, WritebackMode};

/// Evaluator state that outlives a single node: limits, the write-back
/// mode and the current call depth.
#[derive(Debug, Default)]
pub struct Interpreter {
    pub(crate) limits: ExecutionLimits,
    pub(crate) writeback: WritebackMode,
    pub(crate) call_depth: u32,
}

/// Evaluate `node` in `env` with default settings.
pub fn evaluate(node: &Expr, env: &Environment) -> EngineResult<Value> {
    Interpreter::default().evaluate(node, env)
}

impl Interpreter {
    pub fn new(limits: ExecutionLimits, writeback: WritebackMode) -> Self {
        Self {
            limits,
            writeback,
            call_depth: 0,
        }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn writeback(&self) -> WritebackMode {
        self.writeback
    }

    /// Run top-level statements in order; the value is the last statement's.
    pub fn run_program(&mut self, program: &Program, env: &Environment) -> EngineResult<Value> {
        let mut last = Value::Null;
        for statement in &program.statements {
            log::debug!("statement kind={}", statement.kind());
            last = self.evaluate(statement, env)?;
        }
        Ok(last)
    }

    pub fn evaluate(&mut self, node: &Expr, env: &Environment) -> EngineResult<Value> {
        match node {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Str { value, quote } => match quote {
                QuoteStyle::Double => Ok(Value::Str(expand_string(value, env)?)),
                QuoteStyle::Single | QuoteStyle::Backtick | QuoteStyle::Bare => {
                    Ok(Value::Str(value.clone()))
                }
            },
            Expr::ParamExpansion(raw) => Ok(Value::Str(expand_string(raw, env)?)),
            Expr::BraceExpansion(raw) => Ok(Value::List(
                expand_braces(raw, env)?.into_iter().map(Value::Str).collect(),
            )),
            Expr::Variable(var) => self.eval_variable(var, env),
            Expr::ArrayLiteral(items) => {
                let values = items
                    .iter()
                    .map(|item| self.evaluate(item, env))
                    .collect::<EngineResult<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            Expr::Unary(node) => {
                let operand = self.evaluate(&node.operand, env)?;
                apply_unary(&node.operator, &operand)
            }
            Expr::Binary(node) => self.eval_binary(node, env),
            Expr::Assign(node) => self.eval_assign(node, env),
            Expr::Program(program) => self.eval_block(program, env),
            Expr::Function(node) => Ok(self.eval_function(node, env)),
            Expr::Call(node) => self.eval_call(node, env),
            Expr::If(node) => self.eval_if(node, env),
            Expr::For(node) => self.eval_for(node, env),
            Expr::ForIn(node) => self.eval_for_in(node, env),
            Expr::While(node) => self.eval_while(node, env),
        }
    }

    /// Blocks share the enclosing scope.
    pub(crate) fn eval_block(&mut self, program: &Program, env: &Environment) -> EngineResult<Value> {
        let mut last = Value::Null;
        for statement in &program.statements {
            last = self.evaluate(statement, env)?;
        }
        Ok(last)
    }

    // ========================================================================
    // Variables
    // ========================================================================

    fn eval_variable(&mut self, var: &VariableNode, env: &Environment) -> EngineResult<Value> {
        let bound = env.get(&var.name);
        let Some(index) = &var.index else {
            return Ok(match bound {
                Some(value) => value,
                None if !var.deref => Value::Str(var.name.clone()),
                None => Value::Null,
            });
        };
        let key = self.evaluate(index, env)?;
        index_value(&var.name, &bound.unwrap_or_default(), &key)
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn eval_assign(&mut self, node: &AssignNode, env: &Environment) -> EngineResult<Value> {
        let Expr::Variable(target) = node.target.as_ref() else {
            return Err(EngineError::type_error(format!(
                "cannot assign to {}",
                node.target.kind()
            )));
        };
        let value = self.evaluate(&node.value, env)?;
        self.assign_variable(target, value.clone(), env)?;
        Ok(value)
    }

    /// Store `value` into a variable or one of its elements. Null removes.
    pub(crate) fn assign_variable(
        &mut self,
        target: &VariableNode,
        value: Value,
        env: &Environment,
    ) -> EngineResult<()> {
        let Some(index) = &target.index else {
            if value.is_null() {
                env.remove(&target.name);
            } else {
                env.set(&target.name, value);
            }
            return Ok(());
        };

        let key = self.evaluate(index, env)?;
        let current = env.get(&target.name).unwrap_or_default();
        let updated = store_element(current, &key, value)?;
        env.set(&target.name, updated);
        Ok(())
    }

    // ========================================================================
    // Binary operators
    // ========================================================================

    fn eval_binary(&mut self, node: &BinaryNode, env: &Environment) -> EngineResult<Value> {
        let op = node.operator.as_str();
        let left = self.evaluate(&node.left, env)?;

        let result = match op {
            "&&" if !left.is_truthy() => left,
            "||" if left.is_truthy() => left,
            "&&" | "||" => self.evaluate(&node.right, env)?,
            "++" | "--" => apply_binary(op, &left, &Value::Null)?,
            _ => {
                let right = self.evaluate(&node.right, env)?;
                apply_binary(compound_base(op).unwrap_or(op), &left, &right)?
            }
        };

        let assigns = compound_base(op).is_some() || matches!(op, "++" | "--");
        if assigns || self.writeback == WritebackMode::AllOperators {
            match node.left.as_ref() {
                Expr::Variable(target) => {
                    self.assign_variable(target, result.clone().coerce_bool(), env)?;
                }
                other if assigns => {
                    return Err(EngineError::type_error(format!(
                        "cannot assign to {}",
                        other.kind()
                    )));
                }
                _ => {}
            }
        }
        Ok(result)
    }
}

/// Read one element of a collection.
pub(crate) fn index_value(name: &str, base: &Value, key: &Value) -> EngineResult<Value> {
    match base {
        Value::List(items) => {
            let i = key.to_integer()?;
            let i = if i < 0 { items.len() as i64 + i } else { i };
            Ok(usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default())
        }
        Value::Map(map) => Ok(map.get(&key.to_string()).cloned().unwrap_or_default()),
        _ => Err(EngineError::UndefinedVariableIndex {
            name: name.to_string(),
        }),
    }
}

/// Write one element, turning the target into a map when a list cannot
/// hold the key.
fn store_element(current: Value, key: &Value, value: Value) -> EngineResult<Value> {
    match current {
        Value::Map(mut map) => {
            if value.is_null() {
                map.shift_remove(&key.to_string());
            } else {
                map.insert(key.to_string(), value);
            }
            Ok(Value::Map(map))
        }
        Value::List(mut items) => {
            let position = key
                .to_integer()
                .ok()
                .and_then(|i| usize::try_from(i).ok());
            match position {
                Some(i) if i < items.len() => {
                    items[i] = value;
                    Ok(Value::List(items))
                }
                Some(i) if i == items.len() => {
                    items.push(value);
                    Ok(Value::List(items))
                }
                _ => {
                    let mut map: IndexMap<String, Value> = items
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (i.to_string(), v))
                        .collect();
                    map.insert(key.to_string(), value);
                    Ok(Value::Map(map))
                }
            }
        }
        _ => {
            let mut map = IndexMap::new();
            if !value.is_null() {
                map.insert(key.to_string(), value);
            }
            Ok(Value::Map(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run_with(src: &str, mode: WritebackMode) -> (EngineResult<Value>, Environment) {
        let env = Environment::new();
        let program = parse(src).unwrap();
        let mut interp = Interpreter::new(ExecutionLimits::default(), mode);
        let result = interp.run_program(&program, &env);
        (result, env)
    }

    fn run(src: &str) -> (EngineResult<Value>, Environment) {
        run_with(src, WritebackMode::AssignmentOnly)
    }

    fn value(src: &str) -> Value {
        run(src).0.unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(value("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(value("(1 + 2) * 3"), Value::Number(9.0));
        assert_eq!(value("2 ** 3 ** 2"), Value::Number(512.0));
        assert_eq!(value("10 - 4 - 3"), Value::Number(3.0));
    }

    #[test]
    fn test_unary() {
        assert_eq!(value("-2 * 3"), Value::Number(-6.0));
        assert_eq!(value("x = 4; -$x + 1"), Value::Number(-3.0));
        assert_eq!(value("!false"), Value::Bool(true));
    }

    #[test]
    fn test_assignment_and_lookup() {
        let (result, env) = run("a = 5; b = $a * 2");
        assert_eq!(result.unwrap(), Value::Number(10.0));
        assert_eq!(env.get("a"), Some(Value::Number(5.0)));
        assert_eq!(env.get("b"), Some(Value::Number(10.0)));
    }

    #[test]
    fn test_chained_assignment() {
        let (_, env) = run("a = b = 3");
        assert_eq!(env.get("a"), Some(Value::Number(3.0)));
        assert_eq!(env.get("b"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_comparison_does_not_write_back_by_default() {
        let (result, env) = run("a = 5; a < 10");
        assert_eq!(result.unwrap(), Value::Bool(true));
        assert_eq!(env.get("a"), Some(Value::Number(5.0)));
    }

    #[test]
    fn test_legacy_writeback_quirk() {
        let (result, env) = run_with("a = 5; a < 10", WritebackMode::AllOperators);
        assert_eq!(result.unwrap(), Value::Bool(true));
        assert_eq!(env.get("a"), Some(Value::Number(1.0)));

        let (_, env) = run_with("b = 2; $b + 3", WritebackMode::AllOperators);
        assert_eq!(env.get("b"), Some(Value::Number(5.0)));
    }

    #[test]
    fn test_compound_assignment_and_postfix() {
        let (_, env) = run("a = 5; a += 2; a *= 3; i = 0; i++; i++; j = 3; j--");
        assert_eq!(env.get("a"), Some(Value::Number(21.0)));
        assert_eq!(env.get("i"), Some(Value::Number(2.0)));
        assert_eq!(env.get("j"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_compound_assignment_needs_variable() {
        let (result, _) = run("3 += 1");
        assert!(matches!(result, Err(EngineError::Type { .. })));
    }

    #[test]
    fn test_divide_by_zero() {
        assert!(matches!(run("10 / 0").0, Err(EngineError::DivideByZero { .. })));
        assert!(matches!(run("10 % 0").0, Err(EngineError::DivideByZero { .. })));
    }

    #[test]
    fn test_type_error() {
        let (result, _) = run("x = \"abc\"; $x * 2");
        assert_eq!(result.unwrap_err(), EngineError::type_error("expected number"));
    }

    #[test]
    fn test_short_circuit() {
        let (result, env) = run("false && (x = 1)");
        assert_eq!(result.unwrap(), Value::Bool(false));
        assert!(env.get("x").is_none());
        assert_eq!(value("false || 7"), Value::Number(7.0));
        assert_eq!(value("0 && 7"), Value::Number(7.0));
    }

    #[test]
    fn test_strings() {
        assert_eq!(value("name = \"John\"; \"hi $name\""), Value::str("hi John"));
        assert_eq!(value("name = \"John\"; 'hi $name'"), Value::str("hi $name"));
        assert_eq!(value("name = \"John\"; \"${name:0:2}\""), Value::str("Jo"));
    }

    #[test]
    fn test_word_rule() {
        assert_eq!(value("x = hello; $x"), Value::str("hello"));
        assert_eq!(value("$unbound"), Value::Null);
    }

    #[test]
    fn test_brace_expansion_value() {
        assert_eq!(
            value("\"{1..3}\""),
            Value::List(vec![Value::str("1"), Value::str("2"), Value::str("3")])
        );
    }

    #[test]
    fn test_indexing() {
        assert_eq!(value("a = (10 20 30); $a[1]"), Value::Number(20.0));
        assert_eq!(value("a = (10 20 30); $a[-1]"), Value::Number(30.0));
        assert_eq!(value("a = (10 20 30); $a[7]"), Value::Null);
        assert!(matches!(
            run("s = 5; $s[0]").0,
            Err(EngineError::UndefinedVariableIndex { ref name }) if name == "s"
        ));
    }

    #[test]
    fn test_indexed_assignment_materializes_map() {
        let (_, env) = run("m[color] = \"red\"; m[size] = 3");
        let Some(Value::Map(map)) = env.get("m") else {
            panic!("expected map");
        };
        assert_eq!(map.get("color"), Some(&Value::str("red")));
        assert_eq!(map.get("size"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_indexed_assignment_on_list() {
        let (_, env) = run("a = (1 2); a[0] = 9; a[2] = 3");
        assert_eq!(
            env.get("a"),
            Some(Value::List(vec![
                Value::Number(9.0),
                Value::Number(2.0),
                Value::Number(3.0)
            ]))
        );
        let (_, env) = run("a = (1 2); a[key] = 3");
        assert!(matches!(env.get("a"), Some(Value::Map(ref m)) if m.len() == 3));
    }

    #[test]
    fn test_unset() {
        let (_, env) = run("a = 1; b = 2; c = 3; unset a b");
        assert!(env.get("a").is_none());
        assert!(env.get("b").is_none());
        assert_eq!(env.get("c"), Some(Value::Number(3.0)));
    }

    #[test]
    fn test_free_evaluate() {
        let env = Environment::new();
        assert_eq!(evaluate(&Expr::Number(2.0), &env).unwrap(), Value::Number(2.0));
    }
}
