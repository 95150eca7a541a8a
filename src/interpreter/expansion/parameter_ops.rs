//! Parameter Operation Handlers
//!
//! Value-level transforms behind the parameter expansion passes:
//! - default family (`:-`, `:=`, `:+`, `:?` and their colon-less forms)
//! - pattern replacement
//! - substring and list slicing
//! - case modification

use regex_lite::{NoExpand, Regex};

use crate::interpreter::types::Value;

/// The operator of a default-family expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultOp {
    /// `:-` use the word
    UseDefault,
    /// `:=` assign the word
    AssignDefault,
    /// `:+` use the word when set
    UseAlternative,
    /// `:?` raise with the word as message
    ErrorIfUnset,
}

impl DefaultOp {
    pub fn from_char(c: &str) -> Option<Self> {
        match c {
            "-" => Some(DefaultOp::UseDefault),
            "=" => Some(DefaultOp::AssignDefault),
            "+" => Some(DefaultOp::UseAlternative),
            "?" => Some(DefaultOp::ErrorIfUnset),
            _ => None,
        }
    }
}

/// Whether the fallback word applies. With the colon form an empty value
/// counts as unset.
pub fn should_use_default(value: Option<&Value>, check_empty: bool) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(v) => check_empty && v.to_string().is_empty(),
    }
}

/// Replace matches of `pattern_regex` in `value`.
/// `anchor` is `Some('#')` for a prefix-only match, `Some('%')` for suffix-only.
pub fn apply_pattern_replacement_op(
    value: &str,
    pattern_regex: &str,
    replacement: &str,
    replace_all: bool,
    anchor: Option<char>,
) -> String {
    let final_pattern = match anchor {
        Some('#') => format!("^(?:{})", pattern_regex),
        Some('%') => format!("(?:{})$", pattern_regex),
        _ => pattern_regex.to_string(),
    };
    if pattern_regex.is_empty() {
        return value.to_string();
    }

    match Regex::new(&final_pattern) {
        Ok(re) if replace_all => re.replace_all(value, NoExpand(replacement)).into_owned(),
        Ok(re) => re.replace(value, NoExpand(replacement)).into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Resolve a slice window over `len` items. A negative offset counts from
/// the end; a negative length stops that many items before the end.
fn slice_bounds(len: usize, offset: i64, length: Option<i64>) -> Option<(usize, usize)> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let start = if offset < 0 {
        len_i.saturating_add(offset).max(0)
    } else {
        offset
    };
    if start >= len_i {
        return None;
    }
    let end = match length {
        Some(l) if l < 0 => len_i.saturating_add(l),
        Some(l) => start.saturating_add(l).min(len_i),
        None => len_i,
    };
    if end <= start {
        return None;
    }
    Some((start as usize, end as usize))
}

/// Substring by characters.
pub fn apply_substring_op(value: &str, offset: i64, length: Option<i64>) -> String {
    let chars: Vec<char> = value.chars().collect();
    match slice_bounds(chars.len(), offset, length) {
        Some((start, end)) => chars[start..end].iter().collect(),
        None => String::new(),
    }
}

/// Slice a list of items the same way.
pub fn apply_list_slice(items: Vec<String>, offset: i64, length: Option<i64>) -> Vec<String> {
    match slice_bounds(items.len(), offset, length) {
        Some((start, end)) => items[start..end].to_vec(),
        None => Vec::new(),
    }
}

/// Apply case modification to a value.
/// `^^` uppercase all, `^` uppercase first, `,,` lowercase all, `,` lowercase first.
pub fn apply_case_modification(value: &str, operator: &str) -> String {
    let first_mapped = |upper: bool| {
        let mut chars = value.chars();
        match chars.next() {
            None => String::new(),
            Some(c) if upper => c.to_uppercase().collect::<String>() + chars.as_str(),
            Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
        }
    };
    match operator {
        "^^" => value.to_uppercase(),
        "^" => first_mapped(true),
        ",," => value.to_lowercase(),
        "," => first_mapped(false),
        _ => value.to_string(),
    }
}
