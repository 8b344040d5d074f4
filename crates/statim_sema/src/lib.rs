//! Name resolution and type checking for the statim front end.
//!
//! Out of the compiler core's specification proper — the lowerer's only
//! precondition is a fully resolved, fully typed AST — but shipped here so
//! the workspace builds end to end. Scope is deliberately minimal: a
//! single-pass scope-stack resolver and a bottom-up checker built on the
//! cast lattice in `statim_types`, matching the reference implementation's
//! documented split between its semantic-analysis stage and its lowering
//! stage (the latter assumes resolution already happened).

pub mod error;
pub mod resolver;
pub mod scope;

pub use error::{SemaError, SemaResult};
pub use resolver::Sema;
