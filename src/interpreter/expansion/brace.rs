//! Brace Expansion
//!
//! `expand_braces` turns one word into a list of words:
//! - `a{x,y}b` -> `axb ayb` (comma lists, which may nest)
//! - `{1..3}`, `{05..08}`, `{a..e..2}` (ranges, see `brace_range`)
//! - several groups combine as a cartesian product, left to right
//!
//! Parameter references are expanded first. A `{...}` group that is neither
//! a comma list nor a range is kept verbatim.

use crate::interpreter::environment::Environment;
use crate::interpreter::errors::{EngineError, EngineResult};
use crate::interpreter::expansion::brace_range::{expand_range, is_range_body, MAX_RANGE_ITEMS};
use crate::interpreter::expansion::parameter::expand_string;
use crate::parser::input::find_matching_brace;

/// Expand parameters, then braces, in `raw`.
pub fn expand_braces(raw: &str, env: &Environment) -> EngineResult<Vec<String>> {
    let text = expand_string(raw, env)?;
    let words = expand_word(&text)?;
    log::trace!("brace expansion word={:?} count={}", raw, words.len());
    Ok(words)
}

/// A located `{...}` group.
struct Group {
    open: usize,
    close: usize,
    body: String,
}

/// Top-level commas in a group body.
fn split_alternatives(body: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut has_comma = false;
    for c in body.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                has_comma = true;
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);
    has_comma.then_some(parts)
}

/// The first group that expands: a comma list or a range. Groups written
/// as `${...}` are skipped.
fn first_group(chars: &[char]) -> Option<Group> {
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '{' {
            i += 1;
            continue;
        }
        let Some(close) = find_matching_brace(chars, i) else {
            return None;
        };
        let body: String = chars[i + 1..close].iter().collect();
        let is_param = i > 0 && chars[i - 1] == '$';
        if !is_param && (split_alternatives(&body).is_some() || is_range_body(&body)) {
            return Some(Group {
                open: i,
                close,
                body,
            });
        }
        i += 1;
    }
    None
}

fn expand_word(word: &str) -> EngineResult<Vec<String>> {
    let chars: Vec<char> = word.chars().collect();
    let Some(group) = first_group(&chars) else {
        return Ok(vec![word.to_string()]);
    };

    let prefix: String = chars[..group.open].iter().collect();
    let suffix: String = chars[group.close + 1..].iter().collect();

    let alternatives = match split_alternatives(&group.body) {
        Some(parts) => {
            let mut out = Vec::new();
            for part in parts {
                out.extend(expand_word(&part)?);
            }
            out
        }
        None => expand_range(&group.body)?,
    };
    let tails = expand_word(&suffix)?;

    if alternatives.len().saturating_mul(tails.len()) > MAX_RANGE_ITEMS {
        return Err(EngineError::range(word, "expansion too large"));
    }

    let mut results = Vec::with_capacity(alternatives.len() * tails.len());
    for alt in &alternatives {
        for tail in &tails {
            results.push(format!("{}{}{}", prefix, alt, tail));
        }
    }
    Ok(results)
}
