//! Brace Range Expansion
//!
//! Numeric `{1..10}` / `{01..10..2}` and character `{a..z}` ranges.
//! - a step of 0 is treated as 1
//! - the step's sign is ignored; ranges run in their natural direction
//! - zero padding uses the widest zero-padded endpoint
//! - mixed-case character ranges are an error

use regex_lite::Regex;

use crate::interpreter::errors::{EngineError, EngineResult};

/// Upper bound on the number of items one range may produce.
pub const MAX_RANGE_ITEMS: usize = 10_000;

lazy_static::lazy_static! {
    static ref NUMERIC_RANGE: Regex =
        Regex::new(r"^(-?\d+)\.\.(-?\d+)(?:\.\.(-?\d+))?$").unwrap();
    static ref CHAR_RANGE: Regex =
        Regex::new(r"^([A-Za-z])\.\.([A-Za-z])(?:\.\.(-?\d+))?$").unwrap();
}

/// Does the group body look like a range (`a..b`)?
pub fn is_range_body(body: &str) -> bool {
    body.contains("..")
}

/// Expand a range group body (without braces). Anything containing `..`
/// that is not a valid range is a `RangeError` naming `{body}`.
pub fn expand_range(body: &str) -> EngineResult<Vec<String>> {
    let literal = format!("{{{}}}", body);

    if let Some(caps) = NUMERIC_RANGE.captures(body) {
        let start_str = &caps[1];
        let end_str = &caps[2];
        let start = parse_bound(start_str, &literal)?;
        let end = parse_bound(end_str, &literal)?;
        let step = parse_step(caps.get(3).map(|m| m.as_str()), &literal)?;
        return expand_numeric_range(start, end, step, start_str, end_str, &literal);
    }

    if let Some(caps) = CHAR_RANGE.captures(body) {
        let start = caps[1].chars().next().unwrap_or('a');
        let end = caps[2].chars().next().unwrap_or('a');
        let step = parse_step(caps.get(3).map(|m| m.as_str()), &literal)?;
        return expand_char_range(start, end, step, &literal);
    }

    Err(EngineError::range(literal, "malformed range"))
}

fn parse_bound(text: &str, literal: &str) -> EngineResult<i64> {
    text.parse::<i64>()
        .map_err(|_| EngineError::range(literal, "range bound out of bounds"))
}

fn parse_step(text: Option<&str>, literal: &str) -> EngineResult<i64> {
    let step = match text {
        Some(t) => parse_bound(t, literal)?,
        None => 1,
    };
    Ok(if step == 0 { 1 } else { step.saturating_abs() })
}

fn range_count(start: i64, end: i64, step: i64) -> u128 {
    let span = (i128::from(end) - i128::from(start)).unsigned_abs();
    span / step as u128 + 1
}

/// Width used for zero padding: the widest endpoint written with a
/// leading zero, or 0 when neither is padded.
fn pad_width(start_str: &str, end_str: &str) -> usize {
    [start_str, end_str]
        .iter()
        .map(|s| s.trim_start_matches('-'))
        .filter(|digits| digits.len() > 1 && digits.starts_with('0'))
        .map(str::len)
        .max()
        .unwrap_or(0)
}

fn expand_numeric_range(
    start: i64,
    end: i64,
    step: i64,
    start_str: &str,
    end_str: &str,
    literal: &str,
) -> EngineResult<Vec<String>> {
    if range_count(start, end, step) > MAX_RANGE_ITEMS as u128 {
        return Err(EngineError::range(literal, "range too large"));
    }
    let width = pad_width(start_str, end_str);
    let format_num = |n: i64| -> String {
        if width == 0 {
            return n.to_string();
        }
        let digits = format!("{:0>width$}", n.unsigned_abs(), width = width);
        if n < 0 {
            format!("-{}", digits)
        } else {
            digits
        }
    };

    let mut results = Vec::new();
    let mut i = start;
    if start <= end {
        while i <= end {
            results.push(format_num(i));
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        while i >= end {
            results.push(format_num(i));
            match i.checked_sub(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    }
    Ok(results)
}

fn expand_char_range(start: char, end: char, step: i64, literal: &str) -> EngineResult<Vec<String>> {
    if start.is_ascii_uppercase() != end.is_ascii_uppercase() {
        return Err(EngineError::range(literal, "mixed-case character range"));
    }
    let (s, e) = (start as i64, end as i64);
    let mut results = Vec::new();
    let mut i = s;
    if s <= e {
        while i <= e {
            results.extend(char::from_u32(i as u32).map(String::from));
            i += step;
        }
    } else {
        while i >= e {
            results.extend(char::from_u32(i as u32).map(String::from));
            i -= step;
        }
    }
    Ok(results)
}
