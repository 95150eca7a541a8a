//! Engine Errors
//!
//! Every failure the engine can report:
//! - syntax: `LexError`, `ParseError` (from the parser module)
//! - evaluation: type, divide-by-zero, undefined function / index
//! - expansion: `${var:?msg}` requests and malformed brace ranges
//! - host: execution limits and failing host builtins
//!
//! All of them abort the current statement only. The host catches them at
//! the `exec` boundary and keeps accepting input.

use std::fmt;

use crate::parser::types::{LexError, ParseError, SyntaxError};

/// The type of execution limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitType {
    Recursion,
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitType::Recursion => write!(f, "recursion"),
        }
    }
}

/// Unified error enum for everything the engine raises.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Lex(#[from] LexError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("TypeError: {message}")]
    Type { message: String },

    #[error("DivideByZeroError: division by zero in \"{operator}\"")]
    DivideByZero { operator: String },

    #[error("UndefinedFunctionError: {name}: command not found")]
    UndefinedFunction { name: String },

    #[error("UndefinedVariableIndexError: {name} cannot be indexed")]
    UndefinedVariableIndex { name: String },

    #[error("{name}: {message}")]
    UserRequested { name: String, message: String },

    #[error("RangeError: {literal}: {reason}")]
    Range { literal: String, reason: String },

    #[error("maximum {limit_type} depth ({limit}) exceeded")]
    Limit { limit_type: LimitType, limit: u32 },

    #[error("{command}: {message}")]
    Host { command: String, message: String },
}

/// Result alias used throughout the interpreter.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<SyntaxError> for EngineError {
    fn from(err: SyntaxError) -> Self {
        match err {
            SyntaxError::Lex(e) => EngineError::Lex(e),
            SyntaxError::Parse(e) => EngineError::Parse(e),
        }
    }
}

impl EngineError {
    /// Exit code reported when an execution limit was hit.
    pub const LIMIT_EXIT_CODE: i32 = 126;

    pub fn type_error(message: impl Into<String>) -> Self {
        EngineError::Type {
            message: message.into(),
        }
    }

    pub fn range(literal: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Range {
            literal: literal.into(),
            reason: reason.into(),
        }
    }

    /// Error constructor for host builtins.
    pub fn host(command: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Host {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Name of the error kind, as reported in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Lex(_) => "LexError",
            EngineError::Parse(_) => "ParseError",
            EngineError::Type { .. } => "TypeError",
            EngineError::DivideByZero { .. } => "DivideByZeroError",
            EngineError::UndefinedFunction { .. } => "UndefinedFunctionError",
            EngineError::UndefinedVariableIndex { .. } => "UndefinedVariableIndexError",
            EngineError::UserRequested { .. } => "UserRequestedError",
            EngineError::Range { .. } => "RangeError",
            EngineError::Limit { .. } => "ExecutionLimitError",
            EngineError::Host { .. } => "HostError",
        }
    }

    /// Process exit status for this error: 2 for syntax errors, 126 for
    /// execution limits, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Lex(_) | EngineError::Parse(_) => 2,
            EngineError::Limit { .. } => Self::LIMIT_EXIT_CODE,
            _ => 1,
        }
    }
}
