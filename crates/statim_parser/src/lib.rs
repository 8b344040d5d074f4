//! AST node set and recursive-descent parser for the statim source language.
//!
//! Lexing and parsing are outside the compiler core's specification (the
//! lowerer's precondition is a fully resolved `TranslationUnit`), but this
//! crate ships a real front end so the workspace builds and runs end to
//! end. The AST is arena-backed: every `Decl`/`Stmt`/`Expr` lives in a flat
//! `Vec` owned by the `Ast`, addressed by a typed index rather than a raw
//! owning pointer (see `statim`'s workspace-wide design notes on replacing
//! intrusive pointer graphs).

pub mod ast;
pub mod parser;
pub mod precedence;

pub use ast::*;
pub use parser::{Parser, ParseError, ParseResult};
