//! Control Flow Execution
//!
//! Handles control flow constructs:
//! - if/else
//! - C-style for loops
//! - for-in loops
//! - while loops (also `for cond do ... done`)
//!
//! Loops carry no iteration cap. Every loop body runs in one child scope
//! shared by all of its iterations: a for-in variable lives there, so
//! closures created in the body see the last value, and names first
//! assigned in a while body do not leak out.

use crate::ast::types::{Expr, ForInNode, ForNode, IfNode, WhileNode};
use crate::interpreter::environment::Environment;
use crate::interpreter::errors::EngineResult;
use crate::interpreter::evaluator::Interpreter;
use crate::interpreter::types::Value;

impl Interpreter {
    pub(crate) fn eval_if(&mut self, node: &IfNode, env: &Environment) -> EngineResult<Value> {
        let condition = self.evaluate(&node.condition, env)?;
        if condition.is_truthy() {
            self.evaluate(&node.then_branch, env)
        } else if let Some(else_branch) = &node.else_branch {
            self.evaluate(else_branch, env)
        } else {
            Ok(Value::Bool(false))
        }
    }

    /// All conditions must hold; an empty list holds.
    fn conditions_hold(&mut self, conditions: &[Expr], env: &Environment) -> EngineResult<bool> {
        for condition in conditions {
            if !self.evaluate(condition, env)?.is_truthy() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn eval_for(&mut self, node: &ForNode, env: &Environment) -> EngineResult<Value> {
        let scope = env.extend();
        for init in &node.init {
            self.evaluate(init, &scope)?;
        }

        let mut last = Value::Null;
        let mut iterations = 0usize;
        while self.conditions_hold(&node.condition, &scope)? {
            last = self.evaluate(&node.body, &scope)?;
            for step in &node.step {
                self.evaluate(step, &scope)?;
            }
            iterations += 1;
        }
        log::trace!("for loop finished iterations={}", iterations);
        Ok(last)
    }

    pub(crate) fn eval_for_in(&mut self, node: &ForInNode, env: &Environment) -> EngineResult<Value> {
        let items = self.range_items(&node.range, env)?;
        log::trace!("for-in variable={} items={}", node.variable, items.len());

        let scope = env.extend();
        let mut last = Value::Null;
        for item in items {
            scope.def(&node.variable, item);
            last = self.evaluate(&node.body, &scope)?;
        }
        Ok(last)
    }

    /// The values a for-in range produces, evaluated in the outer scope.
    fn range_items(&mut self, range: &Expr, env: &Environment) -> EngineResult<Vec<Value>> {
        match range {
            Expr::Variable(var) if var.deref && var.index.is_none() => {
                Ok(match env.get(&var.name) {
                    Some(Value::Str(s)) => split_words(&s),
                    Some(value) => value.into_items(),
                    None => Vec::new(),
                })
            }
            Expr::ArrayLiteral(elements) => {
                let mut items = Vec::new();
                for element in elements {
                    match self.evaluate(element, env)? {
                        Value::List(nested) => items.extend(nested),
                        value => items.push(value),
                    }
                }
                Ok(items)
            }
            Expr::ParamExpansion(_) => match self.evaluate(range, env)? {
                Value::Str(s) => Ok(split_words(&s)),
                other => Ok(other.into_items()),
            },
            other => Ok(self.evaluate(other, env)?.into_items()),
        }
    }

    pub(crate) fn eval_while(&mut self, node: &WhileNode, env: &Environment) -> EngineResult<Value> {
        let scope = env.extend();
        let mut last = Value::Null;
        let mut iterations = 0usize;
        while self.conditions_hold(&node.condition, &scope)? {
            last = self.evaluate(&node.body, &scope)?;
            iterations += 1;
        }
        log::trace!("while loop finished iterations={}", iterations);
        Ok(last)
    }
}

fn split_words(s: &str) -> Vec<Value> {
    s.split_whitespace().map(Value::str).collect()
}
