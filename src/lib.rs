//! termscript - a small shell-flavoured command language
//!
//! This library provides the full pipeline for one line of input: a
//! normalizer, lexer and parser producing an AST, and a tree-walking
//! evaluator with shell-style parameter and brace expansion.

pub mod ast;
pub mod engine;
pub mod interpreter;
pub mod parser;

pub use ast::types::*;
pub use engine::{Engine, EngineOptions, ExecResult};
pub use interpreter::{
    evaluate, Builtin, EngineError, EngineResult, Environment, ExecutionLimits, Interpreter,
    Value, WritebackMode,
};
pub use parser::{parse, LexError, ParseError, Parser, SyntaxError};
