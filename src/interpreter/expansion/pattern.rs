//! Pattern Matching
//!
//! Converts glob patterns to regex source for the pattern-taking parameter
//! expansions (`${v#pat}`, `${v%pat}`, `${v/pat/rep}`).
//!
//! Supported: `*`, `?`, `[...]` classes (with `!`/`^` negation and
//! `[:alpha:]`-style POSIX classes), and `\x` escapes. An unclosed `[` is
//! literal.

use std::collections::HashMap;

lazy_static::lazy_static! {
    /// Valid POSIX character class names
    static ref POSIX_CLASSES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("alnum", "a-zA-Z0-9");
        m.insert("alpha", "a-zA-Z");
        m.insert("blank", " \\t");
        m.insert("digit", "0-9");
        m.insert("lower", "a-z");
        m.insert("punct", "!-/:-@\\[-`{-~");
        m.insert("space", " \\t\\n\\r\\f\\v");
        m.insert("upper", "A-Z");
        m.insert("word", "a-zA-Z0-9_");
        m.insert("xdigit", "0-9A-Fa-f");
        m
    };
}

/// Characters that must be escaped outside a class.
const REGEX_META: &str = "\\^$.|+(){}[]*?";

/// Convert a glob pattern to regex source (unanchored).
/// `greedy` picks `.*` over `.*?` for `*`.
pub fn pattern_to_regex(pattern: &str, greedy: bool) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                match chars.get(i + 1) {
                    Some(&next) => push_literal(&mut regex, next),
                    None => regex.push_str("\\\\"),
                }
                i += 2;
            }
            '*' => {
                regex.push_str(if greedy { ".*" } else { ".*?" });
                i += 1;
            }
            '?' => {
                regex.push('.');
                i += 1;
            }
            '[' => match find_class_end(&chars, i) {
                Some(end) => {
                    regex.push_str(&convert_class(&chars[i + 1..end]));
                    i = end + 1;
                }
                None => {
                    regex.push_str("\\[");
                    i += 1;
                }
            },
            c => {
                push_literal(&mut regex, c);
                i += 1;
            }
        }
    }
    regex
}

fn push_literal(regex: &mut String, c: char) {
    if REGEX_META.contains(c) {
        regex.push('\\');
    }
    regex.push(c);
}

/// Index of the `]` closing the class opened at `start`.
fn find_class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('!') | Some('^')) {
        i += 1;
    }
    // A leading ] is literal
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '[' if chars.get(i + 1) == Some(&':') => {
                let rest: String = chars[i + 2..].iter().collect();
                match rest.find(":]") {
                    Some(pos) => i += 2 + rest[..pos].chars().count() + 2,
                    None => i += 1,
                }
            }
            ']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Convert the content between `[` and `]` to a regex class.
fn convert_class(content: &[char]) -> String {
    let mut out = String::from("[");
    let mut i = 0;
    if matches!(content.first(), Some('!') | Some('^')) {
        out.push('^');
        i = 1;
    }
    while i < content.len() {
        let c = content[i];
        if c == '[' && content.get(i + 1) == Some(&':') {
            let rest: String = content[i + 2..].iter().collect();
            if let Some(pos) = rest.find(":]") {
                let name = &rest[..pos];
                out.push_str(POSIX_CLASSES.get(name).copied().unwrap_or(""));
                i += 2 + name.chars().count() + 2;
                continue;
            }
        }
        match c {
            '\\' => {
                out.push('\\');
                if let Some(&next) = content.get(i + 1) {
                    out.push(next);
                }
                i += 2;
                continue;
            }
            ']' | '[' | '^' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out.push(']');
    out
}
