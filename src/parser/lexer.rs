//! Lexer for termscript
//!
//! Turns normalized input into a stream of typed tokens with one token of
//! lookahead. At each position the classification order is:
//! - file-path-like words (`/tmp/x`, `./run`, `~/docs`), except right
//!   after a number or `)` where `/` divides
//! - quoted strings (`"..."` interpolated, `'...'` and `` `...` `` raw);
//!   a double-quoted string that is exactly a `${...}` or brace-expansion
//!   word becomes a single expansion token
//! - a `-` folded into the following number or word (`-5`, `-la`)
//! - numbers (one `.` allowed)
//! - operator runs (maximal munch)
//! - `$name` / `$name[index]` variable references
//! - bare words (keywords, `true`/`false`, or variable-definition tokens)
//! - punctuation, where `(a b c)` lexes as a single array literal

use crate::ast::types::QuoteStyle;
use crate::parser::input::{is_brace_expansion_word, is_param_expansion_word, InputStream};
use crate::parser::types::{is_keyword, LexError, OPERATORS, OPERATOR_CHARS, PUNCTUATION_CHARS};

/// Token payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(String),
    Operator(String),
    Punctuation(char),
    Number(f64),
    Str { value: String, quote: QuoteStyle },
    Boolean(bool),
    /// `$name` (deref) or a bare `name`, each with an optional raw `[index]`.
    Variable {
        name: String,
        deref: bool,
        index: Option<String>,
    },
    ArrayLiteral(Vec<Token>),
    BraceExpansion(String),
    ParamExpansion(String),
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }

    pub fn is_punctuation(&self, c: char) -> bool {
        matches!(self.kind, TokenKind::Punctuation(p) if p == c)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Keyword(k) if k == word)
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, TokenKind::Operator(_))
    }

    /// Short human-readable form used in parse errors.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Keyword(k) => format!("keyword \"{}\"", k),
            TokenKind::Operator(op) => format!("operator \"{}\"", op),
            TokenKind::Punctuation(c) => format!("\"{}\"", c),
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::Str { value, .. } => format!("string \"{}\"", value),
            TokenKind::Boolean(b) => format!("boolean {}", b),
            TokenKind::Variable { name, deref, .. } => {
                if *deref {
                    format!("variable \"${}\"", name)
                } else {
                    format!("word \"{}\"", name)
                }
            }
            TokenKind::ArrayLiteral(items) => format!("array literal of {} items", items.len()),
            TokenKind::BraceExpansion(raw) => format!("brace expansion \"{}\"", raw),
            TokenKind::ParamExpansion(raw) => format!("parameter expansion \"{}\"", raw),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_path_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ';' | ')' | ',' | '"' | '\'' | '`')
}

/// Single-token-lookahead lexer over normalized input.
pub struct Lexer {
    input: InputStream,
    current: Option<Token>,
    /// The last token read was a number or `)`, so `/` divides.
    after_operand: bool,
}

impl Lexer {
    pub fn new(normalized: &str) -> Self {
        Self::from_stream(InputStream::new(normalized))
    }

    pub fn from_stream(input: InputStream) -> Self {
        Self {
            input,
            current: None,
            after_operand: false,
        }
    }

    /// Return the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<&Token>, LexError> {
        if self.current.is_none() {
            self.current = self.read_next()?;
        }
        Ok(self.current.as_ref())
    }

    /// Consume and return the next token.
    pub fn next(&mut self) -> Result<Option<Token>, LexError> {
        match self.current.take() {
            Some(token) => Ok(Some(token)),
            None => self.read_next(),
        }
    }

    pub fn is_eof(&mut self) -> Result<bool, LexError> {
        Ok(self.peek()?.is_none())
    }

    /// Current (line, column) of the underlying cursor.
    pub fn position(&self) -> (usize, usize) {
        match &self.current {
            Some(token) => (token.line, token.column),
            None => (self.input.line(), self.input.column()),
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.input.peek() {
            if c.is_whitespace() {
                self.input.next();
            } else if c == '\\' && self.input.peek_at(1) == Some('\n') {
                // Line continuation
                self.input.next();
                self.input.next();
            } else {
                break;
            }
        }
    }

    fn read_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.input.peek() {
            if !predicate(c) {
                break;
            }
            out.push(c);
            self.input.next();
        }
        out
    }

    fn read_next(&mut self) -> Result<Option<Token>, LexError> {
        let token = self.read_token()?;
        self.after_operand = token.as_ref().map_or(false, |t| {
            matches!(t.kind, TokenKind::Number(_) | TokenKind::Punctuation(')'))
        });
        Ok(token)
    }

    fn read_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();
        let Some(c) = self.input.peek() else {
            return Ok(None);
        };
        let line = self.input.line();
        let column = self.input.column();
        let token = |kind| Ok(Some(Token::new(kind, line, column)));

        if self.at_path_start() {
            let value = self.read_while(is_path_char);
            return token(TokenKind::Str {
                value,
                quote: QuoteStyle::Bare,
            });
        }
        if matches!(c, '"' | '\'' | '`') {
            let kind = self.read_string(c)?;
            return token(kind);
        }
        if c == '-' && self.at_foldable_minus() {
            let kind = self.read_negative();
            return token(kind);
        }
        if c.is_ascii_digit() {
            let kind = self.read_number(String::new())?;
            return token(kind);
        }
        if OPERATOR_CHARS.contains(c) {
            let op = self.read_operator();
            return token(TokenKind::Operator(op));
        }
        if c == '$' {
            let kind = self.read_variable()?;
            return token(kind);
        }
        if is_ident_start(c) {
            let kind = self.read_word()?;
            return token(kind);
        }
        if c == '(' {
            if let Some(items) = self.scan_array_literal() {
                return token(TokenKind::ArrayLiteral(items));
            }
        }
        if PUNCTUATION_CHARS.contains(c) {
            self.input.next();
            return token(TokenKind::Punctuation(c));
        }
        Err(self.input.error(format!("Can't handle character: {}", c)))
    }

    fn at_word_boundary(&self) -> bool {
        self.input
            .previous()
            .map_or(true, |p| p.is_whitespace() || matches!(p, '(' | ';' | ','))
    }

    fn at_path_start(&self) -> bool {
        if self.after_operand || !self.at_word_boundary() {
            return false;
        }
        let c0 = self.input.peek();
        let c1 = self.input.peek_at(1);
        let c2 = self.input.peek_at(2);
        match c0 {
            Some('/') => c1.map_or(false, |c| is_ident_char(c) || matches!(c, '.' | '-' | '~')),
            Some('.') => c1 == Some('/') || (c1 == Some('.') && c2 == Some('/')),
            Some('~') => c1.map_or(true, |c| c == '/' || c.is_whitespace() || c == ';'),
            _ => false,
        }
    }

    /// `-` directly followed by a digit or word, at the start of a word.
    fn at_foldable_minus(&self) -> bool {
        let folds_into = self
            .input
            .peek_at(1)
            .map_or(false, |c| c.is_ascii_digit() || is_ident_start(c));
        let after_separator = self.input.previous().map_or(true, |p| {
            p.is_whitespace() || matches!(p, '(' | ';' | ',' | '{' | '[') || OPERATOR_CHARS.contains(p)
        });
        folds_into && after_separator
    }

    fn read_negative(&mut self) -> TokenKind {
        self.input.next();
        if self.input.peek().map_or(false, |c| c.is_ascii_digit()) {
            // digits follow, so this cannot fail on an empty number
            if let Ok(kind) = self.read_number("-".to_string()) {
                return kind;
            }
        }
        let word = self.read_while(|c| is_ident_char(c) || c == '-');
        TokenKind::Str {
            value: format!("-{}", word),
            quote: QuoteStyle::Bare,
        }
    }

    fn read_number(&mut self, prefix: String) -> Result<TokenKind, LexError> {
        let mut text = prefix;
        let mut has_dot = false;
        while let Some(c) = self.input.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.'
                && !has_dot
                && self.input.peek_at(1).map_or(false, |n| n.is_ascii_digit())
            {
                has_dot = true;
                text.push(c);
            } else {
                break;
            }
            self.input.next();
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| self.input.error(format!("Invalid number: {}", text)))
    }

    fn read_operator(&mut self) -> String {
        let mut run = String::new();
        let mut offset = 0;
        while let Some(c) = self.input.peek_at(offset) {
            if !OPERATOR_CHARS.contains(c) {
                break;
            }
            run.push(c);
            offset += 1;
        }
        // every operator character is itself an operator, so this always matches
        let op = OPERATORS
            .iter()
            .find(|op| run.starts_with(*op))
            .map_or_else(|| run.clone(), |op| op.to_string());
        for _ in 0..op.chars().count() {
            self.input.next();
        }
        op
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind, LexError> {
        let (line, column) = (self.input.line(), self.input.column());
        self.input.next();
        let mut value = String::new();
        loop {
            let Some(c) = self.input.next() else {
                return Err(LexError::new("Unterminated string", line, column));
            };
            if c == quote {
                break;
            }
            if c == '\\' {
                let Some(escaped) = self.input.next() else {
                    return Err(LexError::new("Unterminated string", line, column));
                };
                match (quote, escaped) {
                    (q, e) if e == q => value.push(e),
                    ('"', '\\') => value.push('\\'),
                    ('"', 'n') => value.push('\n'),
                    ('"', 't') => value.push('\t'),
                    (_, e) => {
                        value.push('\\');
                        value.push(e);
                    }
                }
                continue;
            }
            value.push(c);
        }

        Ok(match quote {
            '"' if is_param_expansion_word(&value) => TokenKind::ParamExpansion(value),
            '"' if is_brace_expansion_word(&value) => TokenKind::BraceExpansion(value),
            '"' => TokenKind::Str {
                value,
                quote: QuoteStyle::Double,
            },
            '\'' => TokenKind::Str {
                value,
                quote: QuoteStyle::Single,
            },
            _ => TokenKind::Str {
                value,
                quote: QuoteStyle::Backtick,
            },
        })
    }

    fn read_index(&mut self) -> Result<Option<String>, LexError> {
        if self.input.peek() != Some('[') {
            return Ok(None);
        }
        let (line, column) = (self.input.line(), self.input.column());
        self.input.next();
        let mut depth = 1;
        let mut index = String::new();
        while let Some(c) = self.input.next() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some(index));
                    }
                }
                _ => {}
            }
            index.push(c);
        }
        Err(LexError::new("Unterminated index", line, column))
    }

    fn read_variable(&mut self) -> Result<TokenKind, LexError> {
        self.input.next();
        let name = self.read_while(is_ident_char);
        if name.is_empty() {
            return Err(self.input.error("Expected variable name after $"));
        }
        let index = self.read_index()?;
        Ok(TokenKind::Variable {
            name,
            deref: true,
            index,
        })
    }

    fn read_word(&mut self) -> Result<TokenKind, LexError> {
        let name = self.read_while(is_ident_char);
        match name.as_str() {
            "true" => return Ok(TokenKind::Boolean(true)),
            "false" => return Ok(TokenKind::Boolean(false)),
            _ if is_keyword(&name) => return Ok(TokenKind::Keyword(name)),
            _ => {}
        }
        let index = self.read_index()?;
        Ok(TokenKind::Variable {
            name,
            deref: false,
            index,
        })
    }

    /// Try to read `( item item ... )` as one array literal. Items must be
    /// literals separated by whitespace or commas, with zero or at least two
    /// of them. On any mismatch nothing is consumed.
    fn scan_array_literal(&mut self) -> Option<Vec<Token>> {
        let mut inner = String::new();
        let mut offset = 1;
        let mut quote: Option<char> = None;
        loop {
            let c = self.input.peek_at(offset)?;
            offset += 1;
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if matches!(c, '"' | '\'' | '`') => quote = Some(c),
                None if c == '(' || c == '\n' || c == ';' => return None,
                None if c == ')' => break,
                None => {}
            }
            inner.push(c);
        }

        let tokens = Lexer::new(&inner).tokenize().ok()?;
        let mut items = Vec::new();
        for token in tokens {
            match &token.kind {
                TokenKind::Punctuation(',') => continue,
                TokenKind::Operator(_) | TokenKind::Keyword(_) | TokenKind::Punctuation(_) => {
                    return None;
                }
                _ => items.push(token),
            }
        }
        if items.len() == 1 {
            return None;
        }

        for _ in 0..offset {
            self.input.next();
        }
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn word(name: &str) -> TokenKind {
        TokenKind::Variable {
            name: name.to_string(),
            deref: false,
            index: None,
        }
    }

    #[test]
    fn test_simple_command() {
        let tokens = kinds("echo hello;");
        assert_eq!(
            tokens,
            vec![word("echo"), word("hello"), TokenKind::Punctuation(';')]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        let tokens = kinds("1 + 2.5 ** 3 += 4");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Number(1.0),
                TokenKind::Operator("+".into()),
                TokenKind::Number(2.5),
                TokenKind::Operator("**".into()),
                TokenKind::Number(3.0),
                TokenKind::Operator("+=".into()),
                TokenKind::Number(4.0),
            ]
        );
    }

    #[test]
    fn test_operator_maximal_munch() {
        assert_eq!(
            kinds("i++<=3"),
            vec![
                word("i"),
                TokenKind::Operator("++".into()),
                TokenKind::Operator("<=".into()),
                TokenKind::Number(3.0),
            ]
        );
        assert_eq!(
            kinds("a=!b"),
            vec![
                word("a"),
                TokenKind::Operator("=".into()),
                TokenKind::Operator("!".into()),
                word("b"),
            ]
        );
    }

    #[test]
    fn test_unary_minus_folding() {
        assert_eq!(
            kinds("x = -5"),
            vec![word("x"), TokenKind::Operator("=".into()), TokenKind::Number(-5.0)]
        );
        assert_eq!(
            kinds("5 - 3"),
            vec![
                TokenKind::Number(5.0),
                TokenKind::Operator("-".into()),
                TokenKind::Number(3.0)
            ]
        );
        assert_eq!(
            kinds("x-1"),
            vec![word("x"), TokenKind::Operator("-".into()), TokenKind::Number(1.0)]
        );
        assert_eq!(
            kinds("ls -la"),
            vec![
                word("ls"),
                TokenKind::Str {
                    value: "-la".into(),
                    quote: QuoteStyle::Bare
                }
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""hi \"there\"" 'raw $x' `tick`"#),
            vec![
                TokenKind::Str {
                    value: "hi \"there\"".into(),
                    quote: QuoteStyle::Double
                },
                TokenKind::Str {
                    value: "raw $x".into(),
                    quote: QuoteStyle::Single
                },
                TokenKind::Str {
                    value: "tick".into(),
                    quote: QuoteStyle::Backtick
                },
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("echo \"oops").tokenize().unwrap_err();
        assert_eq!(err.message, "Unterminated string");
        assert_eq!((err.line, err.column), (1, 6));
    }

    #[test]
    fn test_expansion_tokens() {
        assert_eq!(
            kinds(r#""${name:0:2}" "{1..5}" "hi ${name}""#),
            vec![
                TokenKind::ParamExpansion("${name:0:2}".into()),
                TokenKind::BraceExpansion("{1..5}".into()),
                TokenKind::Str {
                    value: "hi ${name}".into(),
                    quote: QuoteStyle::Double
                },
            ]
        );
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            kinds("$name $arr[0] map[key]"),
            vec![
                TokenKind::Variable {
                    name: "name".into(),
                    deref: true,
                    index: None
                },
                TokenKind::Variable {
                    name: "arr".into(),
                    deref: true,
                    index: Some("0".into())
                },
                TokenKind::Variable {
                    name: "map".into(),
                    deref: false,
                    index: Some("key".into())
                },
            ]
        );
    }

    #[test]
    fn test_keywords_and_booleans() {
        assert_eq!(
            kinds("for x in true"),
            vec![
                TokenKind::Keyword("for".into()),
                word("x"),
                TokenKind::Keyword("in".into()),
                TokenKind::Boolean(true),
            ]
        );
    }

    #[test]
    fn test_array_literal() {
        let tokens = kinds("(1 2 3)");
        assert_eq!(tokens.len(), 1);
        match &tokens[0] {
            TokenKind::ArrayLiteral(items) => {
                let values: Vec<&TokenKind> = items.iter().map(|t| &t.kind).collect();
                assert_eq!(
                    values,
                    vec![
                        &TokenKind::Number(1.0),
                        &TokenKind::Number(2.0),
                        &TokenKind::Number(3.0)
                    ]
                );
            }
            other => panic!("expected array literal, got {:?}", other),
        }
        assert!(matches!(&kinds("(a, b)")[0], TokenKind::ArrayLiteral(items) if items.len() == 2));
        assert!(matches!(&kinds("()")[0], TokenKind::ArrayLiteral(items) if items.is_empty()));
    }

    #[test]
    fn test_parenthesized_expression_is_not_array() {
        assert_eq!(kinds("(1 + 2)")[0], TokenKind::Punctuation('('));
        assert_eq!(kinds("(x)")[0], TokenKind::Punctuation('('));
        assert_eq!(kinds("(i = 0; i < 3; i++)")[0], TokenKind::Punctuation('('));
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            kinds("cd /home/user ./run.sh"),
            vec![
                word("cd"),
                TokenKind::Str {
                    value: "/home/user".into(),
                    quote: QuoteStyle::Bare
                },
                TokenKind::Str {
                    value: "./run.sh".into(),
                    quote: QuoteStyle::Bare
                },
            ]
        );
        assert_eq!(kinds("10 / 2")[1], TokenKind::Operator("/".into()));
    }

    #[test]
    fn test_slash_after_operand_divides() {
        assert_eq!(
            kinds("x = 8 /2"),
            vec![
                word("x"),
                TokenKind::Operator("=".into()),
                TokenKind::Number(8.0),
                TokenKind::Operator("/".into()),
                TokenKind::Number(2.0),
            ]
        );
        assert_eq!(kinds("(1 + 3) /2")[5], TokenKind::Operator("/".into()));
        assert_eq!(
            kinds("ls /tmp")[1],
            TokenKind::Str {
                value: "/tmp".into(),
                quote: QuoteStyle::Bare
            }
        );
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("a b");
        assert_eq!(lexer.peek().unwrap().map(|t| t.kind.clone()), Some(word("a")));
        assert_eq!(lexer.next().unwrap().map(|t| t.kind), Some(word("a")));
        assert_eq!(lexer.next().unwrap().map(|t| t.kind), Some(word("b")));
        assert!(lexer.is_eof().unwrap());
    }

    #[test]
    fn test_bad_character() {
        let err = Lexer::new("a @ b").tokenize().unwrap_err();
        assert!(err.message.contains("@"));
    }
}
