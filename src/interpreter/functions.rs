//! Function Handling
//!
//! Function definitions evaluate to closures that capture the defining
//! environment. Calls bind parameters positionally in a child of that
//! environment:
//! - missing arguments are null, or the parameter's default
//! - defaults are evaluated in the caller's environment
//! - host builtins receive the flattened argument values
//!
//! Call depth is bounded by `ExecutionLimits::max_call_depth`.

use std::rc::Rc;

use crate::ast::types::{CallNode, Expr, FunctionNode};
use crate::interpreter::environment::Environment;
use crate::interpreter::errors::{EngineError, EngineResult, LimitType};
use crate::interpreter::evaluator::Interpreter;
use crate::interpreter::types::{Closure, Value};

impl Interpreter {
    /// Build a closure over `env`; named functions are also bound in `env`.
    pub(crate) fn eval_function(&mut self, node: &FunctionNode, env: &Environment) -> Value {
        let closure = Value::Function(Rc::new(Closure::new(
            node.name.clone(),
            node.params.clone(),
            Rc::clone(&node.body),
            env,
        )));
        if let Some(name) = &node.name {
            log::debug!("define function name={}", name);
            env.def(name, closure.clone());
        }
        closure
    }

    pub(crate) fn eval_call(&mut self, node: &CallNode, env: &Environment) -> EngineResult<Value> {
        let callee = self.resolve_callee(node, env)?;
        let args = self.eval_arguments(&node.args, env)?;
        self.call_value(&callee, args, env)
    }

    fn resolve_callee(&mut self, node: &CallNode, env: &Environment) -> EngineResult<Value> {
        let name = node.callee_name();
        let callee = match node.callee.as_ref() {
            Expr::Variable(var) if var.index.is_none() => env.get(&var.name),
            other => Some(self.evaluate(other, env)?),
        };
        match callee {
            Some(value) if value.is_callable() => Ok(value),
            Some(_) => Err(EngineError::type_error(format!("{} is not a function", name))),
            None => Err(EngineError::UndefinedFunction { name }),
        }
    }

    /// Bare words pass as their text; everything else is evaluated and
    /// lists are spread into separate arguments.
    fn eval_arguments(&mut self, args: &[Expr], env: &Environment) -> EngineResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            if let Some(word) = arg.as_bare_word() {
                values.push(Value::str(word));
                continue;
            }
            match self.evaluate(arg, env)? {
                Value::List(items) => values.extend(items),
                value => values.push(value),
            }
        }
        Ok(values)
    }

    /// Invoke a callable value with already-evaluated arguments.
    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        caller_env: &Environment,
    ) -> EngineResult<Value> {
        match callee {
            Value::Builtin(builtin) => {
                log::trace!("call builtin name={} argc={}", builtin.name, args.len());
                builtin.call(&args)
            }
            Value::Function(closure) => self.call_closure(closure, args, caller_env),
            other => Err(EngineError::type_error(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        caller_env: &Environment,
    ) -> EngineResult<Value> {
        let max_call_depth = self.limits.max_call_depth;
        self.call_depth += 1;
        if self.call_depth > max_call_depth {
            self.call_depth -= 1;
            log::debug!(
                "call depth exceeded function={} limit={}",
                closure.display_name(),
                max_call_depth
            );
            return Err(EngineError::Limit {
                limit_type: LimitType::Recursion,
                limit: max_call_depth,
            });
        }
        log::trace!(
            "call function name={} argc={} depth={}",
            closure.display_name(),
            args.len(),
            self.call_depth
        );

        let result = self
            .bind_parameters(closure, args, caller_env)
            .and_then(|scope| self.evaluate(&closure.body, &scope));
        self.call_depth -= 1;
        log::trace!(
            "leave function name={} ok={} depth={}",
            closure.display_name(),
            result.is_ok(),
            self.call_depth
        );
        result
    }

    fn bind_parameters(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        caller_env: &Environment,
    ) -> EngineResult<Environment> {
        let Some(defining) = closure.scope() else {
            return Err(EngineError::type_error(format!(
                "{} outlived its defining scope",
                closure.display_name()
            )));
        };
        let scope = defining.extend();
        let mut args = args.into_iter();
        for param in &closure.params {
            let arg = args.next();
            match param {
                Expr::Variable(var) => {
                    scope.def(&var.name, arg.unwrap_or_default());
                }
                Expr::Assign(assign) => {
                    let Expr::Variable(var) = assign.target.as_ref() else {
                        return Err(EngineError::type_error("invalid parameter"));
                    };
                    let value = match arg {
                        Some(value) if !value.is_null() => value,
                        _ => self.evaluate(&assign.value, caller_env)?,
                    };
                    scope.def(&var.name, value);
                }
                other => {
                    return Err(EngineError::type_error(format!(
                        "invalid parameter {}",
                        other.kind()
                    )));
                }
            }
        }
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::environment::Environment;
    use crate::interpreter::errors::{EngineError, EngineResult, LimitType};
    use crate::interpreter::evaluator::Interpreter;
    use crate::interpreter::types::{Builtin, ExecutionLimits, Value, WritebackMode};
    use crate::parser::parse;

    fn run_in(src: &str, env: &Environment, interp: &mut Interpreter) -> EngineResult<Value> {
        let program = parse(src).unwrap();
        interp.run_program(&program, env)
    }

    fn run(src: &str) -> (EngineResult<Value>, Environment) {
        let env = Environment::new();
        let result = run_in(src, &env, &mut Interpreter::default());
        (result, env)
    }

    #[test]
    fn test_named_function_and_call() {
        let (result, _) = run("function add(a, b) { $a + $b }; add(2, 3)");
        assert_eq!(result.unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_command_style_call() {
        let (result, _) = run("function double(n) { $n * 2 }; double 21");
        assert_eq!(result.unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_missing_argument_is_null() {
        let (result, _) = run("function second(a, b) { $b }; second(1)");
        assert_eq!(result.unwrap(), Value::Null);
    }

    #[test]
    fn test_default_parameter() {
        let (result, _) = run("base = 10; function f(a, b = $base) { $a + $b }; f(1)");
        assert_eq!(result.unwrap(), Value::Number(11.0));
        let (result, _) = run("function f(a, b = 5) { $a + $b }; f(1, 2)");
        assert_eq!(result.unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_parameters_shadow_outer_scope() {
        let (result, env) = run("x = 1; function f(x) { x = 99; $x }; f(5)");
        assert_eq!(result.unwrap(), Value::Number(99.0));
        assert_eq!(env.get("x"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_function_writes_outer_variable() {
        let (_, env) = run("count = 0; function bump() { count += 1 }; bump(); bump()");
        assert_eq!(env.get("count"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_closure_captures_defining_scope() {
        let src = "function counter() { n = 0; function() { n += 1 } }; \
                   c = counter(); c(); c(); c()";
        let (result, env) = run(src);
        assert_eq!(result.unwrap(), Value::Number(3.0));
        assert!(env.get("n").is_none());
    }

    #[test]
    fn test_call_scope_with_named_inner_function_is_freed() {
        let env = Environment::new();
        let mut interp = Interpreter::default();
        let src = "function outer() { function inner() { 1 } }; x = outer()";
        run_in(src, &env, &mut interp).unwrap();

        let Some(Value::Function(inner)) = env.get("x") else {
            panic!("expected a function");
        };
        let call_scope = {
            let scope = inner.scope().unwrap();
            assert!(scope.parent().unwrap().ptr_eq(&env));
            scope.downgrade()
        };
        drop(inner);
        assert!(call_scope.upgrade().is_some());

        env.remove("x");
        assert!(call_scope.upgrade().is_none());

        let root = env.downgrade();
        drop(env);
        assert!(root.upgrade().is_none());
    }

    #[test]
    fn test_function_read_from_scope_keeps_identity() {
        let (result, env) = run("function f() { 1 }; g = $f; $g == $f");
        assert_eq!(result.unwrap(), Value::Bool(true));
        assert_eq!(env.get("f"), env.get("f"));
        let (result, _) = run("function f() { 1 }; function h() { 1 }; $f == $h");
        assert_eq!(result.unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_anonymous_function_value() {
        let (result, _) = run("sq = function(x) { $x * $x }; sq(7)");
        assert_eq!(result.unwrap(), Value::Number(49.0));
    }

    #[test]
    fn test_for_in_closures_share_loop_scope() {
        let src = "fs = (); n = 0; for i in (1 2 3) do fs[$n] = function() { $i }; n++ done; \
                   first = $fs[0]; first()";
        let (result, _) = run(src);
        assert_eq!(result.unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_recursion() {
        let src = "function fact(n) { if $n <= 1 then 1 else $n * fact($n - 1) }; fact(5)";
        let (result, _) = run(src);
        assert_eq!(result.unwrap(), Value::Number(120.0));
    }

    #[test]
    fn test_recursion_limit() {
        let env = Environment::new();
        let mut interp = Interpreter::new(
            ExecutionLimits { max_call_depth: 10 },
            WritebackMode::AssignmentOnly,
        );
        let err = run_in("function down(n) { down($n + 1) }; down(0)", &env, &mut interp)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Limit {
                limit_type: LimitType::Recursion,
                limit: 10
            }
        );
        assert_eq!(interp.call_depth, 0);
    }

    #[test]
    fn test_undefined_function() {
        let (result, _) = run("missing(1)");
        assert_eq!(
            result.unwrap_err(),
            EngineError::UndefinedFunction {
                name: "missing".into()
            }
        );
        let (result, _) = run("nothing_here");
        assert!(matches!(result, Err(EngineError::UndefinedFunction { .. })));
    }

    #[test]
    fn test_not_a_function() {
        let (result, _) = run("x = 5; x(1)");
        assert_eq!(result.unwrap_err(), EngineError::type_error("x is not a function"));
    }

    #[test]
    fn test_builtin_receives_flattened_arguments() {
        let env = Environment::new();
        env.def(
            "count",
            Value::Builtin(Builtin::new("count", |args| Ok(Value::Number(args.len() as f64)))),
        );
        let mut interp = Interpreter::default();
        let result = run_in("xs = (1 2 3); count $xs extra", &env, &mut interp);
        assert_eq!(result.unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_bare_word_arguments_are_literal() {
        let env = Environment::new();
        env.def(
            "first",
            Value::Builtin(Builtin::new("first", |args| Ok(args.first().cloned().unwrap_or_default()))),
        );
        env.def("name", Value::str("bound"));
        let mut interp = Interpreter::default();
        assert_eq!(
            run_in("first name", &env, &mut interp).unwrap(),
            Value::str("name")
        );
        assert_eq!(
            run_in("first $name", &env, &mut interp).unwrap(),
            Value::str("bound")
        );
    }
}
