//! Error kinds shared across compiler stages.
//!
//! These map to the origins enumerated by the error handling design: lexical
//! and syntactic errors belong to the (external) front end, semantic errors
//! to analysis, and the `Lowering`/`Codegen` variants to the core. All of them
//! eventually get wrapped in a [`crate::Diagnostic`] before being reported.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatimError {
    #[error("lexical error: {message}")]
    Lex { message: String },

    #[error("syntax error: {message}")]
    Parse { message: String },

    #[error("semantic error: {message}")]
    Semantic { message: String },

    #[error("lowering error: {message}")]
    Lowering { message: String },

    #[error("codegen error: {message}")]
    Codegen { message: String },
}

pub type StatimResult<T> = Result<T, StatimError>;

impl StatimError {
    pub fn lex(message: impl Into<String>) -> Self {
        Self::Lex { message: message.into() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic { message: message.into() }
    }

    pub fn lowering(message: impl Into<String>) -> Self {
        Self::Lowering { message: message.into() }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::Codegen { message: message.into() }
    }
}
