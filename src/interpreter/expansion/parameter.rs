//! Parameter Expansion
//!
//! `expand_string` rewrites every `${...}` occurrence (and bare `$name`) in a
//! string. It runs a fixed list of passes; each pass scans the string for
//! balanced `${...}` occurrences, matches the body against its own anchored
//! regex, splices in the replacement and resumes scanning after it. An
//! occurrence whose body the pass does not recognise is left untouched for
//! the passes that follow, so each pass is a no-op on text it does not own.
//!
//! Pass order:
//! 1. pattern replace      `${v/pat/rep}` `${v//pat/rep}` `${v/#pat/rep}` `${v/%pat/rep}`
//! 2. slice                `${v:from}` `${v:from:len}`
//! 3. right-anchored slice `${v:(-n)}` `${v: -n}`
//! 4. default family       `${v:-w}` `${v:=w}` `${v:+w}` `${v:?w}` (colon optional)
//! 5. pattern removal      `${v#p}` `${v##p}` `${v%p}` `${v%%p}`
//! 6. case modification    `${v^}` `${v^^}` `${v,}` `${v,,}`
//! 7. arrays               `${a[i]}` `${a[@]}` `${#a[@]}` `${!a[@]}` `${a[@]/re/:1:2}`
//! 8. length               `${#v}`
//! 9. simple               `${v}`
//!
//! Substituted values have their `$` escaped so later passes never expand
//! them again; `\$` is unescaped at the very end.

use regex_lite::{Captures, Regex};

use crate::interpreter::environment::Environment;
use crate::interpreter::errors::{EngineError, EngineResult};
use crate::interpreter::expansion::parameter_ops::{
    apply_case_modification, apply_list_slice, apply_pattern_replacement_op, apply_substring_op,
    should_use_default, DefaultOp,
};
use crate::interpreter::expansion::pattern::pattern_to_regex;
use crate::interpreter::expansion::pattern_removal::{apply_pattern_removal, PatternRemovalSide};
use crate::interpreter::types::Value;
use crate::parser::input::find_matching_brace;

lazy_static::lazy_static! {
    static ref REPLACE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(//|/#|/%|/)([^/]*)(?:/(.*))?$").unwrap();
    static ref SLICE: Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*):(\d+|\$?[A-Za-z_][A-Za-z0-9_]*)(?::(-?\d+|\$?[A-Za-z_][A-Za-z0-9_]*))?$"
    ).unwrap();
    static ref RIGHT_SLICE: Regex = Regex::new(
        r"^([A-Za-z_][A-Za-z0-9_]*):(?:\s+(-\d+)|\(\s*(-\d+)\s*\))(?::(-?\d+))?$"
    ).unwrap();
    static ref DEFAULT: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(:?)([-=+?])(.*)$").unwrap();
    static ref REMOVAL: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(##|#|%%|%)(.+)$").unwrap();
    static ref CASE: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(\^\^|\^|,,|,)$").unwrap();
    static ref ARRAY: Regex = Regex::new(
        r"^([#!])?([A-Za-z_][A-Za-z0-9_]*)\[([^\]]+)\](?:/(.*)/)?(?::(-?\d+)(?::(\d+))?)?$"
    ).unwrap();
    static ref LENGTH: Regex = Regex::new(r"^#([A-Za-z_][A-Za-z0-9_]*)$").unwrap();
    static ref SIMPLE: Regex = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)$").unwrap();
}

type Resolver = fn(&Captures, &Environment) -> EngineResult<String>;

/// One rewrite pass: a body regex and the function computing its replacement.
struct Pass {
    name: &'static str,
    regex: &'static Regex,
    resolve: Resolver,
}

fn passes() -> [Pass; 9] {
    [
        Pass { name: "replace", regex: &*REPLACE, resolve: resolve_replace },
        Pass { name: "slice", regex: &*SLICE, resolve: resolve_slice },
        Pass { name: "right-slice", regex: &*RIGHT_SLICE, resolve: resolve_right_slice },
        Pass { name: "default", regex: &*DEFAULT, resolve: resolve_default },
        Pass { name: "removal", regex: &*REMOVAL, resolve: resolve_removal },
        Pass { name: "case", regex: &*CASE, resolve: resolve_case },
        Pass { name: "array", regex: &*ARRAY, resolve: resolve_array },
        Pass { name: "length", regex: &*LENGTH, resolve: resolve_length },
        Pass { name: "simple", regex: &*SIMPLE, resolve: resolve_simple },
    ]
}

/// Expand all parameter references in `raw`.
pub fn expand_string(raw: &str, env: &Environment) -> EngineResult<String> {
    if !raw.contains('$') {
        return Ok(raw.to_string());
    }
    let mut text = raw.to_string();
    for pass in passes() {
        text = run_pass(&text, env, &pass)?;
    }
    text = expand_bare_variables(&text, env);
    Ok(text.replace("\\$", "$"))
}

/// Scan `text` once, replacing every `${...}` whose body `pass` recognises.
fn run_pass(text: &str, env: &Environment, pass: &Pass) -> EngineResult<String> {
    if !text.contains("${") {
        return Ok(text.to_string());
    }
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && chars.get(i + 1) == Some(&'$') {
            out.push_str("\\$");
            i += 2;
            continue;
        }
        if c == '$' && chars.get(i + 1) == Some(&'{') {
            if let Some(close) = find_matching_brace(&chars, i + 1) {
                let body: String = chars[i + 2..close].iter().collect();
                if let Some(caps) = pass.regex.captures(&body) {
                    let replacement = (pass.resolve)(&caps, env)?;
                    log::trace!("expand pass={} body={:?} result={:?}", pass.name, body, replacement);
                    out.push_str(&escape_dollars(&replacement));
                } else {
                    out.extend(&chars[i..=close]);
                }
                i = close + 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    Ok(out)
}

/// Replace `$name` references not followed by `{`.
fn expand_bare_variables(text: &str, env: &Environment) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && chars.get(i + 1) == Some(&'$') {
            out.push_str("\\$");
            i += 2;
            continue;
        }
        let starts_name = chars
            .get(i + 1)
            .map_or(false, |n| n.is_ascii_alphabetic() || *n == '_');
        if c == '$' && starts_name {
            let mut end = i + 1;
            while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            let name: String = chars[i + 1..end].iter().collect();
            out.push_str(&escape_dollars(&lookup_string(env, &name)));
            i = end;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

fn escape_dollars(text: &str) -> String {
    text.replace('$', "\\$")
}

fn lookup_string(env: &Environment, name: &str) -> String {
    env.get(name).map(|v| v.to_string()).unwrap_or_default()
}

fn group<'t>(caps: &'t Captures, index: usize) -> &'t str {
    caps.get(index).map_or("", |m| m.as_str())
}

/// A slice operand: an integer literal or the integer value of a variable.
fn resolve_operand(operand: &str, env: &Environment) -> EngineResult<i64> {
    if let Ok(n) = operand.parse::<i64>() {
        return Ok(n);
    }
    let name = operand.trim_start_matches('$');
    env.get(name).unwrap_or_default().to_integer()
}

// ============================================================================
// Resolvers
// ============================================================================

fn resolve_replace(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let value = lookup_string(env, group(caps, 1));
    let op = group(caps, 2);
    let pattern = expand_string(group(caps, 3), env)?;
    let replacement = expand_string(group(caps, 4), env)?;
    let anchor = match op {
        "/#" => Some('#'),
        "/%" => Some('%'),
        _ => None,
    };
    Ok(apply_pattern_replacement_op(
        &value,
        &pattern_to_regex(&pattern, true),
        &replacement,
        op == "//",
        anchor,
    ))
}

fn resolve_slice(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let value = lookup_string(env, group(caps, 1));
    let offset = resolve_operand(group(caps, 2), env)?;
    let length = match caps.get(3) {
        Some(m) => Some(resolve_operand(m.as_str(), env)?),
        None => None,
    };
    Ok(apply_substring_op(&value, offset, length))
}

fn resolve_right_slice(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let value = lookup_string(env, group(caps, 1));
    let offset_text = caps.get(2).or_else(|| caps.get(3)).map_or("0", |m| m.as_str());
    let offset = resolve_operand(offset_text, env)?;
    let length = match caps.get(4) {
        Some(m) => Some(resolve_operand(m.as_str(), env)?),
        None => None,
    };
    Ok(apply_substring_op(&value, offset, length))
}

fn resolve_default(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let name = group(caps, 1);
    let check_empty = !group(caps, 2).is_empty();
    let Some(op) = DefaultOp::from_char(group(caps, 3)) else {
        return Ok(String::new());
    };
    let word = group(caps, 4);
    let current = env.get(name);
    let use_default = should_use_default(current.as_ref(), check_empty);
    let current_text = current.map(|v| v.to_string()).unwrap_or_default();

    match op {
        DefaultOp::UseDefault if use_default => expand_string(word, env),
        DefaultOp::AssignDefault if use_default => {
            let expanded = expand_string(word, env)?;
            env.set(name, Value::str(expanded.clone()));
            Ok(expanded)
        }
        DefaultOp::UseAlternative if use_default => Ok(String::new()),
        DefaultOp::UseAlternative => expand_string(word, env),
        DefaultOp::ErrorIfUnset if use_default => {
            let message = if word.is_empty() {
                "parameter null or not set".to_string()
            } else {
                expand_string(word, env)?
            };
            Err(EngineError::UserRequested {
                name: name.to_string(),
                message,
            })
        }
        _ => Ok(current_text),
    }
}

fn resolve_removal(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let value = lookup_string(env, group(caps, 1));
    let Some((side, greedy)) = PatternRemovalSide::from_operator(group(caps, 2)) else {
        return Ok(value);
    };
    let pattern = expand_string(group(caps, 3), env)?;
    Ok(apply_pattern_removal(
        &value,
        &pattern_to_regex(&pattern, greedy),
        side,
        greedy,
    ))
}

fn resolve_case(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let value = lookup_string(env, group(caps, 1));
    Ok(apply_case_modification(&value, group(caps, 2)))
}

fn resolve_array(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let prefix = group(caps, 1);
    let name = group(caps, 2);
    let index = group(caps, 3);
    let value = env.get(name).unwrap_or_default();

    if index != "@" && index != "*" {
        let key = expand_string(index, env)?;
        let element = index_element(name, &value, &key)?;
        return Ok(match prefix {
            "#" => element.map_or(0, |v| v.len()).to_string(),
            "!" => element.map(|_| key).unwrap_or_default(),
            _ => element.map(|v| v.to_string()).unwrap_or_default(),
        });
    }

    let mut items: Vec<String> = if prefix == "!" {
        collection_keys(&value)
    } else {
        value.into_items().iter().map(|v| v.to_string()).collect()
    };

    if let Some(filter) = caps.get(4) {
        let re = Regex::new(filter.as_str()).map_err(|e| {
            EngineError::type_error(format!("invalid filter /{}/: {}", filter.as_str(), e))
        })?;
        items.retain(|item| !re.is_match(item));
    }

    if let Some(offset) = caps.get(5) {
        let offset = resolve_operand(offset.as_str(), env)?;
        let length = match caps.get(6) {
            Some(m) => Some(resolve_operand(m.as_str(), env)?),
            None => None,
        };
        items = apply_list_slice(items, offset, length);
    }

    if prefix == "#" {
        return Ok(items.len().to_string());
    }
    Ok(items.join(" "))
}

/// Keys of a collection: list positions or map keys.
fn collection_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        Value::Map(map) => map.keys().cloned().collect(),
        _ => vec!["0".to_string()],
    }
}

/// One element of a list (integer index, negative from the end) or map.
fn index_element(name: &str, value: &Value, key: &str) -> EngineResult<Option<Value>> {
    match value {
        Value::Null => Ok(None),
        Value::List(items) => {
            let Ok(i) = key.trim().parse::<i64>() else {
                return Err(EngineError::type_error("expected number"));
            };
            let len = items.len() as i64;
            let i = if i < 0 { len + i } else { i };
            Ok(usize::try_from(i).ok().and_then(|i| items.get(i)).cloned())
        }
        Value::Map(map) => Ok(map.get(key).cloned()),
        _ => Err(EngineError::UndefinedVariableIndex {
            name: name.to_string(),
        }),
    }
}

fn resolve_length(caps: &Captures, env: &Environment) -> EngineResult<String> {
    let value = env.get(group(caps, 1)).unwrap_or_default();
    Ok(value.len().to_string())
}

fn resolve_simple(caps: &Captures, env: &Environment) -> EngineResult<String> {
    Ok(lookup_string(env, group(caps, 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn env() -> Environment {
        let env = Environment::new();
        env.def("name", Value::str("John"));
        env.def("path", Value::str("/usr/local/bin/tool.tar.gz"));
        env.def("n", Value::from(2.0));
        env.def("empty", Value::str(""));
        env.def(
            "arr",
            Value::List(vec![
                Value::str("apple"),
                Value::str("banana"),
                Value::str("cherry"),
                Value::str("date"),
            ]),
        );
        let mut map = IndexMap::new();
        map.insert("one".to_string(), Value::from(1.0));
        map.insert("two".to_string(), Value::from(2.0));
        env.def("map", Value::Map(map));
        env
    }

    fn expand(raw: &str, env: &Environment) -> String {
        expand_string(raw, env).unwrap()
    }

    #[test]
    fn test_simple_and_bare() {
        let env = env();
        assert_eq!(expand("Hi ${name}!", &env), "Hi John!");
        assert_eq!(expand("Hi $name, n=$n", &env), "Hi John, n=2");
        assert_eq!(expand("${missing}|$missing", &env), "|");
        assert_eq!(expand("plain text", &env), "plain text");
    }

    #[test]
    fn test_escaped_dollar() {
        let env = env();
        assert_eq!(expand("cost \\$name", &env), "cost $name");
        assert_eq!(expand("\\${name}", &env), "${name}");
    }

    #[test]
    fn test_slices() {
        let env = env();
        assert_eq!(expand("${name:0:2}", &env), "Jo");
        assert_eq!(expand("${name:1}", &env), "ohn");
        assert_eq!(expand("${name:$n}", &env), "hn");
        assert_eq!(expand("${name:(-1)}", &env), "n");
        assert_eq!(expand("${name: -3:2}", &env), "oh");
    }

    #[test]
    fn test_slices_with_huge_operands() {
        let env = env();
        assert_eq!(expand("${name:1:9223372036854775807}", &env), "ohn");
        assert_eq!(expand("${name: -9223372036854775808}", &env), "John");
        assert_eq!(expand("${arr[@]:1:9223372036854775807}", &env), "banana cherry date");
    }

    #[test]
    fn test_default_family() {
        let env = env();
        assert_eq!(expand("${food:-Cake}", &env), "Cake");
        assert!(env.get("food").is_none());
        assert_eq!(expand("${name:-Cake}", &env), "John");
        assert_eq!(expand("${empty:-fallback}", &env), "fallback");
        assert_eq!(expand("${empty-fallback}", &env), "");
        assert_eq!(expand("${food:=Cake}", &env), "Cake");
        assert_eq!(env.get("food"), Some(Value::str("Cake")));
        assert_eq!(expand("${name:+set}", &env), "set");
        assert_eq!(expand("${nothing:+set}", &env), "");
        assert_eq!(expand("${nothing:-${name}}", &env), "John");
    }

    #[test]
    fn test_error_if_unset() {
        let env = env();
        let err = expand_string("${nothing:?must be set}", &env).unwrap_err();
        assert_eq!(
            err,
            EngineError::UserRequested {
                name: "nothing".into(),
                message: "must be set".into()
            }
        );
        assert_eq!(expand("${name:?unused}", &env), "John");
    }

    #[test]
    fn test_replace() {
        let env = env();
        assert_eq!(expand("${name/o/0}", &env), "J0hn");
        assert_eq!(expand("${path//o/0}", &env), "/usr/l0cal/bin/t00l.tar.gz");
        assert_eq!(expand("${name/#J/j}", &env), "john");
        assert_eq!(expand("${name/%n/N}", &env), "JohN");
        assert_eq!(expand("${name/h}", &env), "Jon");
    }

    #[test]
    fn test_removal() {
        let env = env();
        assert_eq!(expand("${path##*/}", &env), "tool.tar.gz");
        assert_eq!(expand("${path#*/}", &env), "usr/local/bin/tool.tar.gz");
        assert_eq!(expand("${path%.*}", &env), "/usr/local/bin/tool.tar");
        assert_eq!(expand("${path%%.*}", &env), "/usr/local/bin/tool");
    }

    #[test]
    fn test_case() {
        let env = env();
        assert_eq!(expand("${name^^}", &env), "JOHN");
        assert_eq!(expand("${name,,}", &env), "john");
        assert_eq!(expand("${name,}", &env), "john");
    }

    #[test]
    fn test_arrays() {
        let env = env();
        assert_eq!(expand("${arr[1]}", &env), "banana");
        assert_eq!(expand("${arr[-1]}", &env), "date");
        assert_eq!(expand("${arr[9]}", &env), "");
        assert_eq!(expand("${arr[@]}", &env), "apple banana cherry date");
        assert_eq!(expand("${#arr[@]}", &env), "4");
        assert_eq!(expand("${!arr[@]}", &env), "0 1 2 3");
        assert_eq!(expand("${arr[@]:1:2}", &env), "banana cherry");
        assert_eq!(expand("${arr[@]/an/}", &env), "apple cherry date");
        assert_eq!(expand("${map[two]}", &env), "2");
        assert_eq!(expand("${!map[@]}", &env), "one two");
        assert_eq!(expand("${#arr[0]}", &env), "5");
    }

    #[test]
    fn test_index_on_scalar_fails() {
        let env = env();
        assert!(matches!(
            expand_string("${name[0]}", &env),
            Err(EngineError::UndefinedVariableIndex { .. })
        ));
    }

    #[test]
    fn test_length() {
        let env = env();
        assert_eq!(expand("${#name}", &env), "4");
        assert_eq!(expand("${#missing}", &env), "0");
    }

    #[test]
    fn test_values_are_not_reexpanded() {
        let env = env();
        env.def("tricky", Value::str("${name} $name"));
        assert_eq!(expand("${tricky}", &env), "${name} $name");
        assert_eq!(expand("$tricky", &env), "${name} $name");
    }

    #[test]
    fn test_unrecognised_body_is_left_alone() {
        let env = env();
        assert_eq!(expand("${1bad}", &env), "${1bad}");
    }
}
