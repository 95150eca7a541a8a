//! Input Normalization
//!
//! Prepares raw terminal input for the lexer:
//! - trailing whitespace is trimmed per line
//! - `#` comments are stripped (never inside quotes or `${...}`)
//! - bare `${...}` and `{a,b}` / `{1..3}` words are wrapped in double quotes
//!   so the lexer sees each one as a single string token
//! - a `;` terminator is appended to every line that does not continue onto
//!   the next one (lines ending in `{`, `do`, and similar)
//! - empty statements (`;;`, leading `;`) are dropped
//!
//! `normalize` is idempotent: feeding its output back in returns it unchanged.
//!
//! `InputStream` is the character cursor the lexer reads from.

use crate::parser::types::LexError;

/// Words after which a control statement continues onto the next line.
const CONTINUATION_WORDS: &[&str] = &["do", "then", "else", "in"];

/// Words that open a control statement segment.
const CONTROL_WORDS: &[&str] = &["if", "then", "else", "for", "while", "do"];

/// Line endings after which no terminator is inserted.
const CONTINUATION_SUFFIXES: &[&str] = &["{", "(", ",", ";", "&&", "||", "\\"];

/// Normalize raw script text.
pub fn normalize(raw: &str) -> String {
    let mut lines = Vec::new();
    let mut control_open = false;

    for line in raw.lines() {
        let line = strip_comment(line.trim_end());
        let line = quote_expansions(line.trim_end());
        let mut line = line.trim_end().to_string();

        if line.trim().is_empty() {
            continue;
        }
        control_open = ends_control_clause(&line, control_open);
        if !control_open && !ends_with_continuation(&line) {
            line.push(';');
        }

        let line = remove_blank_statements(&line);
        if line.trim().is_empty() {
            continue;
        }
        lines.push(line);
    }

    lines.join("\n")
}

fn ends_with_continuation(line: &str) -> bool {
    let trimmed = line.trim_end();
    CONTINUATION_SUFFIXES.iter().any(|s| trimmed.ends_with(s))
}

/// Whether the line stops inside a control statement header, e.g. after
/// `for x in` or `if $a then`. `open` carries that state from the previous
/// line when this one has no separator of its own.
fn ends_control_clause(line: &str, open: bool) -> bool {
    let (segment, separated) = last_segment(line.trim_end());
    let mut words = segment.split_whitespace();
    let first_word = words.next().unwrap_or("");
    let last_word = words.last().unwrap_or(first_word);
    let in_control = CONTROL_WORDS.contains(&first_word) || (open && !separated);
    in_control && CONTINUATION_WORDS.contains(&last_word)
}

/// The text after the last unquoted `;`, `{` or `}` of a line, and whether
/// there was such a separator.
fn last_segment(line: &str) -> (&str, bool) {
    let mut quotes = QuoteState::default();
    let mut start = None;
    for (i, c) in line.char_indices() {
        if quotes.feed(c) {
            continue;
        }
        if matches!(c, ';' | '{' | '}') {
            start = Some(i + c.len_utf8());
        }
    }
    match start {
        Some(start) => (&line[start..], true),
        None => (line, false),
    }
}

/// Tracks quoting while scanning a line left to right.
#[derive(Debug, Default, Clone, Copy)]
struct QuoteState {
    single: bool,
    double: bool,
    backtick: bool,
    escaped: bool,
}

impl QuoteState {
    fn in_quotes(&self) -> bool {
        self.single || self.double || self.backtick
    }

    /// Feed one character; returns true if the character was consumed as
    /// quoting syntax or quoted content.
    fn feed(&mut self, c: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return true;
        }
        match c {
            '\\' if !self.single && !self.backtick => {
                self.escaped = true;
                true
            }
            '\'' if !self.double && !self.backtick => {
                self.single = !self.single;
                true
            }
            '"' if !self.single && !self.backtick => {
                self.double = !self.double;
                true
            }
            '`' if !self.single && !self.double => {
                self.backtick = !self.backtick;
                true
            }
            _ => self.in_quotes(),
        }
    }
}

/// Remove a trailing `#` comment. A `#` only starts a comment at the start
/// of a line or after whitespace or `;`, outside quotes and outside `${...}`.
fn strip_comment(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut quotes = QuoteState::default();
    let mut expansion_depth = 0usize;

    for i in 0..chars.len() {
        let c = chars[i];
        if quotes.feed(c) {
            continue;
        }
        match c {
            '$' if chars.get(i + 1) == Some(&'{') => expansion_depth += 1,
            '}' if expansion_depth > 0 => expansion_depth -= 1,
            '#' if expansion_depth == 0 => {
                let starts_comment = i == 0 || chars[i - 1].is_whitespace() || chars[i - 1] == ';';
                if starts_comment {
                    return chars[..i].iter().collect();
                }
            }
            _ => {}
        }
    }
    line.to_string()
}

/// Characters that end a bare word outside of any `{...}` group.
fn is_word_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ';' | '(' | ')' | ',' | '=' | '<' | '>' | '|' | '&' | '!' | '+' | '*')
}

/// Wrap bare parameter and brace expansion words in double quotes.
fn quote_expansions(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + 8);
    let mut quotes = QuoteState::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if quotes.in_quotes() || quotes.escaped || matches!(c, '"' | '\'' | '`' | '\\') {
            quotes.feed(c);
            out.push(c);
            i += 1;
            continue;
        }
        if is_word_delimiter(c) {
            out.push(c);
            i += 1;
            continue;
        }

        let end = scan_bare_word(&chars, i);
        let word: String = chars[i..end].iter().collect();
        if is_param_expansion_word(&word) || contains_param_expansion(&word) || is_brace_expansion_word(&word) {
            out.push('"');
            out.push_str(&word);
            out.push('"');
        } else {
            out.push_str(&word);
        }
        i = end.max(i + 1);
    }
    out
}

/// Find the end of a bare word starting at `start`. Quotes inside the word
/// stop it; `${...}` and `{...}` groups may contain delimiters.
fn scan_bare_word(chars: &[char], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '"' | '\'' | '`' | '\\') {
            break;
        }
        match c {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            _ if depth == 0 && is_word_delimiter(c) => break,
            _ if depth > 0 && c.is_whitespace() && !inside_param_expansion(chars, start, i) => break,
            _ => {}
        }
        i += 1;
    }
    i
}

/// Whether position `at` lies inside an unterminated `${` opened at or after `start`.
fn inside_param_expansion(chars: &[char], start: usize, at: usize) -> bool {
    let mut depth = 0i32;
    let mut i = start;
    while i < at {
        if chars[i] == '$' && chars.get(i + 1) == Some(&'{') {
            depth += 1;
            i += 2;
            continue;
        }
        if chars[i] == '}' && depth > 0 {
            depth -= 1;
        }
        i += 1;
    }
    depth > 0
}

/// Index of the `}` matching the `{` at `open`, honoring nesting.
pub fn find_matching_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &c) in chars[open..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn contains_param_expansion(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    (0..chars.len()).any(|i| {
        chars[i] == '$' && chars.get(i + 1) == Some(&'{') && find_matching_brace(&chars, i + 1).is_some()
    })
}

/// A whole word that is exactly one `${...}` expansion.
pub fn is_param_expansion_word(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    if chars.len() < 3 || chars[0] != '$' || chars[1] != '{' {
        return false;
    }
    find_matching_brace(&chars, 1) == Some(chars.len() - 1)
}

/// A whitespace-free word holding at least one `{...}` group that is a
/// comma list or a `..` range (ignoring `${...}` groups).
pub fn is_brace_expansion_word(word: &str) -> bool {
    if word.is_empty() || word.chars().any(char::is_whitespace) {
        return false;
    }
    let chars: Vec<char> = word.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            let is_param = i > 0 && chars[i - 1] == '$';
            let Some(close) = find_matching_brace(&chars, i) else {
                return false;
            };
            if !is_param && group_is_expandable(&chars[i + 1..close]) {
                return true;
            }
            i = close + 1;
            continue;
        }
        i += 1;
    }
    false
}

fn group_is_expandable(body: &[char]) -> bool {
    let mut depth = 0usize;
    for (i, &c) in body.iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return true,
            '.' if depth == 0 && body.get(i + 1) == Some(&'.') => return true,
            _ => {}
        }
    }
    false
}

/// Collapse `;;` runs and drop leading `;` outside quotes and parentheses.
fn remove_blank_statements(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quotes = QuoteState::default();
    let mut paren_depth = 0usize;
    let mut last_significant: Option<char> = None;

    for c in line.chars() {
        if quotes.feed(c) {
            out.push(c);
            last_significant = Some(c);
            continue;
        }
        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            ';' if paren_depth == 0 => {
                if matches!(last_significant, None | Some(';') | Some('{')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
        if !c.is_whitespace() {
            last_significant = Some(c);
        }
    }
    out
}

/// Character cursor over normalized text with line/column tracking.
#[derive(Debug, Clone)]
pub struct InputStream {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl InputStream {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Consume and return the next character.
    pub fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Look `offset` characters past the current one without consuming.
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// The character consumed most recently.
    pub fn previous(&self) -> Option<char> {
        self.pos.checked_sub(1).and_then(|p| self.chars.get(p).copied())
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Build a `LexError` at the current position.
    pub fn error(&self, message: impl Into<String>) -> LexError {
        LexError::new(message, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserts_terminators() {
        assert_eq!(normalize("a = 1\nb = 2"), "a = 1;\nb = 2;");
    }

    #[test]
    fn test_skips_terminator_after_block_openers() {
        let src = "while $i < 3 do\n  i++\ndone\nif x {\n  echo hi\n}";
        assert_eq!(
            normalize(src),
            "while $i < 3 do\n  i++;\ndone;\nif x {\n  echo hi;\n};"
        );
    }

    #[test]
    fn test_continuation_words_only_close_control_statements() {
        assert_eq!(normalize("echo in\necho x"), "echo in;\necho x;");
        assert_eq!(normalize("say then\nsay else"), "say then;\nsay else;");
        assert_eq!(
            normalize("for x in\n(1 2) do\n  echo $x\ndone"),
            "for x in\n(1 2) do\n  echo $x;\ndone;"
        );
        assert_eq!(
            normalize("if $x then\n  a\nelse\n  b"),
            "if $x then\n  a;\nelse\n  b;"
        );
        assert_eq!(normalize("} else"), "} else");
        assert_eq!(normalize("n = 0; while $n < 2 do"), "n = 0; while $n < 2 do");
        assert_eq!(normalize("echo \"a; for\" in"), "echo \"a; for\" in;");
    }

    #[test]
    fn test_strips_comments() {
        assert_eq!(normalize("echo hi # greet\n# whole line"), "echo hi;");
        assert_eq!(normalize("echo \"a # b\""), "echo \"a # b\";");
        assert_eq!(normalize("echo ${#name}"), "echo \"${#name}\";");
    }

    #[test]
    fn test_quotes_expansions() {
        assert_eq!(normalize("echo ${name:0:2}"), "echo \"${name:0:2}\";");
        assert_eq!(normalize("echo {1..5}"), "echo \"{1..5}\";");
        assert_eq!(normalize("echo a{x,y}b"), "echo \"a{x,y}b\";");
        assert_eq!(normalize("echo ${food:-some cake}"), "echo \"${food:-some cake}\";");
        assert_eq!(normalize("x = $name"), "x = $name;");
    }

    #[test]
    fn test_leaves_blocks_alone() {
        assert_eq!(normalize("{ echo a; }"), "{ echo a; };");
        assert_eq!(normalize("function f(a, b) {"), "function f(a, b) {");
    }

    #[test]
    fn test_removes_blank_statements() {
        assert_eq!(normalize("a;; b;"), "a; b;");
        assert_eq!(normalize("\n\n;\n"), "");
        assert_eq!(normalize("for (;;) {"), "for (;;) {");
    }

    #[test]
    fn test_idempotent() {
        let src = "# setup\nname = \"John\"\necho ${name:0:2} {1..3}\nfor x in (1 2 3) do\n  echo $x # each\ndone\n";
        let once = normalize(src);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_expansion_word_detection() {
        assert!(is_param_expansion_word("${a}"));
        assert!(is_param_expansion_word("${a:-${b}}"));
        assert!(!is_param_expansion_word("${a}b"));
        assert!(is_brace_expansion_word("{1..5}"));
        assert!(is_brace_expansion_word("a{x,y}b"));
        assert!(!is_brace_expansion_word("${a,b}"));
        assert!(!is_brace_expansion_word("{abc}"));
        assert!(!is_brace_expansion_word("{a, b}"));
    }

    #[test]
    fn test_input_stream_positions() {
        let mut input = InputStream::new("ab\nc");
        assert_eq!(input.next(), Some('a'));
        assert_eq!(input.peek(), Some('b'));
        input.next();
        input.next();
        assert_eq!((input.line(), input.column()), (2, 1));
        assert_eq!(input.next(), Some('c'));
        assert!(input.is_eof());
        let err = input.error("boom");
        assert_eq!((err.line, err.column), (2, 2));
    }
}
