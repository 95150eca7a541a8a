//! Script Engine
//!
//! Main entry point for hosts embedding the language.
//! Ties together the parser, the evaluator, and the default builtins.
//!
//! The engine keeps one root environment alive across `exec` calls, so
//! every line a REPL feeds it sees the bindings of earlier lines.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use crate::interpreter::errors::{EngineError, EngineResult};
use crate::interpreter::types::{Builtin, ExecutionLimits, Value, WritebackMode};
use crate::interpreter::{Environment, Interpreter};

/// Options for creating an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Variables bound in the root scope before the first line runs
    pub env: Option<HashMap<String, String>>,
    /// Execution limits
    pub limits: Option<ExecutionLimits>,
    /// Which binary operators write back into their left operand
    pub writeback: WritebackMode,
    /// Install `echo`, `print`, `printf`, `len`, `typeof`, `join`, `split`
    pub builtins: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            env: None,
            limits: None,
            writeback: WritebackMode::default(),
            builtins: true,
        }
    }
}

/// Outcome of one `exec` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Value of the last statement; null on error
    pub value: Value,
}

impl ExecResult {
    pub fn new(stdout: String, stderr: String, exit_code: i32, value: Value) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            value,
        }
    }

    pub fn ok() -> Self {
        Self::new(String::new(), String::new(), 0, Value::Null)
    }
}

/// A persistent interpreter session.
pub struct Engine {
    env: Environment,
    interpreter: Interpreter,
    stdout: Rc<RefCell<String>>,
}

impl Engine {
    /// Create a new engine.
    pub fn new(options: EngineOptions) -> Self {
        let env = Environment::new();
        let stdout = Rc::new(RefCell::new(String::new()));

        if options.builtins {
            for builtin in default_builtins(&stdout) {
                env.def(&builtin.name.clone(), Value::Builtin(builtin));
            }
        }
        if let Some(vars) = options.env {
            for (name, value) in vars {
                env.def(&name, Value::Str(value));
            }
        }

        let interpreter = Interpreter::new(options.limits.unwrap_or_default(), options.writeback);
        Self {
            env,
            interpreter,
            stdout,
        }
    }

    /// Bind a host command in the root scope.
    pub fn register(
        &mut self,
        name: &str,
        func: impl Fn(&[Value]) -> EngineResult<Value> + 'static,
    ) {
        self.env.def(name, Value::Builtin(Builtin::new(name, func)));
    }

    /// Run one input, capturing output and errors.
    pub fn exec(&mut self, script: &str) -> ExecResult {
        if script.trim().is_empty() {
            return ExecResult::ok();
        }

        let result = self.eval(script);
        let stdout = std::mem::take(&mut *self.stdout.borrow_mut());
        match result {
            Ok(value) => ExecResult::new(stdout, String::new(), 0, value),
            Err(err) => {
                log::debug!("exec failed kind={} exit_code={}", err.kind(), err.exit_code());
                ExecResult::new(
                    stdout,
                    format!("termscript: {}\n", err),
                    err.exit_code(),
                    Value::Null,
                )
            }
        }
    }

    /// Run one input and return its value. Output stays buffered until the
    /// next `exec` or `take_output`.
    pub fn eval(&mut self, script: &str) -> EngineResult<Value> {
        let program = crate::parser::parse(script)?;
        log::debug!("exec statements={}", program.statements.len());
        self.interpreter.call_depth = 0;
        self.interpreter.run_program(&program, &self.env)
    }

    /// Drain the output buffer.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut *self.stdout.borrow_mut())
    }

    /// Read a binding visible from the root scope.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.env.get(name)
    }

    /// Bind a root-scope variable; null removes it.
    pub fn set(&mut self, name: &str, value: Value) {
        if value.is_null() {
            self.env.remove(name);
        } else {
            self.env.set(name, value);
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

// ============================================================================
// Default builtins
// ============================================================================

fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_builtins(stdout: &Rc<RefCell<String>>) -> Vec<Builtin> {
    let echo_out = Rc::clone(stdout);
    let print_out = Rc::clone(stdout);
    let printf_out = Rc::clone(stdout);

    vec![
        Builtin::new("echo", move |args| {
            let mut out = echo_out.borrow_mut();
            out.push_str(&render_args(args));
            out.push('\n');
            Ok(Value::Null)
        }),
        Builtin::new("print", move |args| {
            print_out.borrow_mut().push_str(&render_args(args));
            Ok(Value::Null)
        }),
        Builtin::new("printf", move |args| {
            let text = format_printf(args)?;
            printf_out.borrow_mut().push_str(&text);
            Ok(Value::Null)
        }),
        Builtin::new("len", |args| {
            let n = match args {
                [single] => single.len(),
                _ => args.len(),
            };
            Ok(Value::Number(n as f64))
        }),
        Builtin::new("typeof", |args| {
            Ok(Value::str(args.first().map_or("null", Value::type_name)))
        }),
        Builtin::new("join", |args| {
            let Some((separator, items)) = args.split_first() else {
                return Err(EngineError::host("join", "missing separator"));
            };
            let joined = items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(&separator.to_string());
            Ok(Value::Str(joined))
        }),
        Builtin::new("split", |args| {
            let Some(text) = args.first() else {
                return Err(EngineError::host("split", "missing string"));
            };
            let text = text.to_string();
            let parts: Vec<Value> = match args.get(1).map(|s| s.to_string()) {
                Some(sep) if !sep.is_empty() => text.split(sep.as_str()).map(Value::str).collect(),
                _ => text.split_whitespace().map(Value::str).collect(),
            };
            Ok(Value::List(parts))
        }),
    ]
}

/// `%s`, `%d`, `%%` directives and `\n`, `\t`, `\\` escapes.
fn format_printf(args: &[Value]) -> EngineResult<String> {
    let Some((format, rest)) = args.split_first() else {
        return Err(EngineError::host("printf", "usage: printf format [arguments]"));
    };
    let format = format.to_string();
    let mut rest = rest.iter();
    let mut out = String::new();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        match c {
            '%' => match chars.next() {
                Some('s') => out.push_str(&rest.next().map(|v| v.to_string()).unwrap_or_default()),
                Some('d') => {
                    let n = match rest.next() {
                        Some(v) => v
                            .to_integer()
                            .map_err(|_| EngineError::host("printf", format!("{}: invalid number", v)))?,
                        None => 0,
                    };
                    out.push_str(&n.to_string());
                }
                Some('%') => out.push('%'),
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            },
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(script: &str) -> ExecResult {
        Engine::default().exec(script)
    }

    #[test]
    fn test_exec_empty() {
        let result = exec("   ");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.value, Value::Null);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(exec("1 + 2 * 3").value, Value::Number(7.0));
        assert_eq!(exec("(1 + 2) * 3").value, Value::Number(9.0));
    }

    #[test]
    fn test_unspaced_division_after_number() {
        let mut engine = Engine::default();
        assert_eq!(engine.exec("x = 8 /2").exit_code, 0);
        assert_eq!(engine.get("x"), Some(Value::Number(4.0)));
    }

    #[test]
    fn test_echo() {
        let result = exec("name = \"World\"; echo \"Hello, $name\"");
        assert_eq!(result.stdout, "Hello, World\n");
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn test_echo_flattens_lists() {
        assert_eq!(exec("xs = (1 2 3); echo items $xs").stdout, "items 1 2 3\n");
        assert_eq!(exec("echo file{1..3}.txt").stdout, "file1.txt file2.txt file3.txt\n");
    }

    #[test]
    fn test_keyword_words_as_arguments() {
        let result = exec("echo in\necho x");
        assert_eq!(result.stdout, "in\nx\n");
        assert_eq!(result.exit_code, 0);
        assert_eq!(exec("echo sign in then done").exit_code, 2);
        assert_eq!(exec("echo log in for now").stdout, "log in for now\n");
    }

    #[test]
    fn test_printf() {
        assert_eq!(
            exec("printf '%s has %d items\\n' cart 3").stdout,
            "cart has 3 items\n"
        );
        let result = exec("printf '%d' abc");
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("printf"));
    }

    #[test]
    fn test_value_builtins() {
        assert_eq!(exec("len \"hello\"").value, Value::Number(5.0));
        assert_eq!(exec("xs = (4 5 6); len $xs").value, Value::Number(3.0));
        assert_eq!(exec("typeof 3").value, Value::str("number"));
        assert_eq!(exec("xs = (a b c); join \"-\" $xs").value, Value::str("a-b-c"));
        assert_eq!(
            exec("split \"a,b\" \",\"").value,
            Value::List(vec![Value::str("a"), Value::str("b")])
        );
    }

    #[test]
    fn test_writeback_modes() {
        let mut engine = Engine::default();
        engine.exec("a = 5; a < 10");
        assert_eq!(engine.get("a"), Some(Value::Number(5.0)));

        let mut legacy = Engine::new(EngineOptions {
            writeback: WritebackMode::AllOperators,
            ..Default::default()
        });
        let result = legacy.exec("a = 5; a < 10");
        assert_eq!(result.value, Value::Bool(true));
        assert_eq!(legacy.get("a"), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_scoping_sees_binding_not_snapshot() {
        let mut engine = Engine::default();
        let result = engine.exec("x = 1; function show() { $x }; x = 2; show");
        assert_eq!(result.value, Value::Number(2.0));
        let result = engine.exec("function shadow(x) { $x }; shadow 7");
        assert_eq!(result.value, Value::Number(7.0));
        assert_eq!(engine.get("x"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_divide_by_zero_reported() {
        let result = exec("10 / 0");
        assert_eq!(result.exit_code, 1);
        assert_eq!(
            result.stderr,
            "termscript: DivideByZeroError: division by zero in \"/\"\n"
        );
        assert!(exec("10 % 0").stderr.contains("DivideByZeroError"));
    }

    #[test]
    fn test_for_in_order_and_shared_scope() {
        let result = exec("for x in (1 2 3) do echo $x done");
        assert_eq!(result.stdout, "1\n2\n3\n");

        let result = exec(
            "f = 0; for x in (1 2 3) do if $x == 1 then f = function() { $x } done; f()",
        );
        assert_eq!(result.value, Value::Number(3.0));
    }

    #[test]
    fn test_undefined_function() {
        let result = exec("frobnicate 1 2");
        assert_eq!(result.exit_code, 1);
        assert_eq!(
            result.stderr,
            "termscript: UndefinedFunctionError: frobnicate: command not found\n"
        );
    }

    #[test]
    fn test_parameter_expansion() {
        let mut engine = Engine::default();
        engine.exec("name = \"John\"");
        assert_eq!(engine.exec("echo \"${name:0:2}\"").stdout, "Jo\n");
        assert_eq!(engine.exec("echo \"${name:(-1)}\"").stdout, "n\n");
        assert_eq!(engine.exec("echo \"${food:-Cake}\"").stdout, "Cake\n");
        assert_eq!(engine.get("food"), None);
        assert_eq!(engine.exec("echo \"${food:=Cake}\"").stdout, "Cake\n");
        assert_eq!(engine.get("food"), Some(Value::str("Cake")));
    }

    #[test]
    fn test_user_requested_error() {
        let result = exec("echo \"${missing:?must be set}\"");
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "termscript: missing: must be set\n");
    }

    #[test]
    fn test_syntax_error_exit_code() {
        let result = exec("x = (1 + ");
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.starts_with("termscript: "));
        assert_eq!(exec("echo \"unterminated").exit_code, 2);
    }

    #[test]
    fn test_recursion_limit_exit_code() {
        let mut engine = Engine::new(EngineOptions {
            limits: Some(ExecutionLimits { max_call_depth: 20 }),
            ..Default::default()
        });
        let result = engine.exec("function loop(n) { loop($n + 1) }; loop(0)");
        assert_eq!(result.exit_code, 126);
        assert!(result.stderr.contains("maximum recursion depth (20) exceeded"));
        assert_eq!(engine.exec("1 + 1").value, Value::Number(2.0));
    }

    #[test]
    fn test_state_persists_and_errors_are_statement_fatal() {
        let mut engine = Engine::default();
        engine.exec("counter = 1");
        assert_eq!(engine.exec("missing_cmd").exit_code, 1);
        engine.exec("counter += 1");
        assert_eq!(engine.get("counter"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_output_before_error_is_kept() {
        let result = exec("echo before; 1 / 0");
        assert_eq!(result.stdout, "before\n");
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn test_register_and_options() {
        let mut env = HashMap::new();
        env.insert("greeting".to_string(), "hi".to_string());
        let mut engine = Engine::new(EngineOptions {
            env: Some(env),
            builtins: false,
            ..Default::default()
        });
        engine.register("shout", |args| {
            Ok(Value::Str(args.iter().map(|a| a.to_string().to_uppercase()).collect::<Vec<_>>().join(" ")))
        });
        assert_eq!(engine.exec("shout $greeting there").value, Value::str("HI THERE"));
        assert_eq!(engine.exec("echo x").exit_code, 1);
    }

    #[test]
    fn test_set_and_get() {
        let mut engine = Engine::default();
        engine.set("n", Value::Number(4.0));
        assert_eq!(engine.exec("$n * 2").value, Value::Number(8.0));
        engine.set("n", Value::Null);
        assert_eq!(engine.get("n"), None);
    }

    #[test]
    fn test_json_shape() {
        let result = exec("echo hi; 40 + 2");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stdout"], "hi\n");
        assert_eq!(json["exitCode"], 0);
        assert_eq!(json["value"], 42.0);
    }
}
