//! Abstract Syntax Tree (AST) Types for termscript
//!
//! This module defines the node types produced by the parser and walked by
//! the interpreter.
//!
//! Architecture:
//!   Input → Normalizer → Lexer → Parser → AST → Evaluator (+ Expansion) → Value

pub mod types;
