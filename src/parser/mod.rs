//! Parser module for termscript
//!
//! Normalizer, lexer and recursive-descent parser. `parse` runs all three.

pub mod types;
pub mod input;
pub mod lexer;
pub mod parser;

// Re-exports
pub use input::{normalize, InputStream};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{parse, parse_normalized, Parser, TokenBuffer, TokenSource};
pub use types::{LexError, ParseError, SyntaxError};
