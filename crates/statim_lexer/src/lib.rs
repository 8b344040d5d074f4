//! Lexical scanner for the statim source language.
//!
//! Out of the core's scope per the specification (the lowerer consumes an
//! already-resolved AST), but shipped here so the workspace is buildable and
//! demonstrable end to end, matching the teacher's convention of a
//! standalone lexer crate ahead of the parser.

pub mod lexer;
pub mod token;

pub use lexer::{LexError, Lexer};
pub use token::{keyword, Token, TokenExt, TokenKind};
