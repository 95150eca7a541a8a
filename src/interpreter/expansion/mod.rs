//! Expansion Engine
//!
//! String rewriting invoked by the evaluator for double-quoted strings,
//! `${...}` words and brace-expansion words:
//! - `expand_string`: parameter expansion, yields one string
//! - `expand_braces`: parameter then brace expansion, yields a list

pub mod brace;
pub mod brace_range;
pub mod parameter;
pub mod parameter_ops;
pub mod pattern;
pub mod pattern_removal;

pub use brace::expand_braces;
pub use parameter::expand_string;
