//! Parser Types and Constants
//!
//! Shared error types, keyword/operator tables, and the operator precedence
//! table used by the lexer and the parser.

use std::collections::HashMap;

lazy_static::lazy_static! {
    /// Binary/postfix operator precedence. Higher binds tighter.
    static ref PRECEDENCE: HashMap<&'static str, u8> = {
        let mut m = HashMap::new();
        m.insert("=", 1);
        for op in ["+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", "&=", "|=", "^="] {
            m.insert(op, 10);
        }
        m.insert("||", 11);
        m.insert("&&", 12);
        m.insert("|", 13);
        m.insert("^", 14);
        m.insert("&", 15);
        for op in ["==", "!=", "<", ">", "<=", ">="] {
            m.insert(op, 20);
        }
        m.insert("<<", 25);
        m.insert(">>", 25);
        m.insert("+", 30);
        m.insert("-", 30);
        m.insert("*", 40);
        m.insert("/", 40);
        m.insert("%", 40);
        m.insert("**", 50);
        m.insert("++", 100);
        m.insert("--", 100);
        m
    };
}

/// Reserved words. `true`/`false` are lexed as booleans, not keywords.
pub const KEYWORDS: &[&str] = &[
    "if", "then", "else", "function", "for", "in", "do", "done", "while", "unset",
];

/// Every operator the lexer accepts, longest first so a prefix scan finds
/// the maximal munch.
pub const OPERATORS: &[&str] = &[
    "**=", "<<=", ">>=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "==", "!=", "<=", ">=",
    "&&", "||", "<<", ">>", "**", "++", "--", "=", "<", ">", "+", "-", "*", "/", "%", "&", "|",
    "^", "!", "~",
];

/// Characters that may start or continue an operator run.
pub const OPERATOR_CHARS: &str = "+-*/%=&|<>!^~";

/// Punctuation characters.
pub const PUNCTUATION_CHARS: &str = ",;(){}[]";

/// Precedence for prefix unary `!`, `~` and `-`.
pub const UNARY_PRECEDENCE: u8 = 60;

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn precedence(op: &str) -> Option<u8> {
    PRECEDENCE.get(op).copied()
}

/// Postfix operators take no right operand.
pub fn is_postfix(op: &str) -> bool {
    matches!(op, "++" | "--")
}

/// Assignment-family and `**` group to the right.
pub fn is_right_associative(op: &str) -> bool {
    op == "**" || is_compound_assignment(op) || op == "="
}

/// `+=`, `-=` and friends. Plain `=` is not compound.
pub fn is_compound_assignment(op: &str) -> bool {
    op.len() >= 2 && op.ends_with('=') && !matches!(op, "==" | "!=" | "<=" | ">=")
}

/// Raised by the input cursor and the lexer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} ({line}:{column})")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Raised by the parser when the token stream does not fit the grammar.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Parse error at {line}:{column}: expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(
        expected: impl Into<String>,
        found: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
            line,
            column,
        }
    }
}

/// Anything that can go wrong before evaluation starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
