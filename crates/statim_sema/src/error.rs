//! The external-facing error type for the resolver/checker, matching the
//! teacher's per-crate `SeenError` convention: typed variants a caller can
//! match on, each carrying the span it was raised from.

use statim_common::SourceSpan;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemaError {
    #[error("unresolved identifier '{name}' at {span}")]
    UnresolvedIdent { name: String, span: SourceSpan },

    #[error("struct has no field '{field}' at {span}")]
    UnresolvedField { field: String, span: SourceSpan },

    #[error("type mismatch: expected {expected}, found {found} at {span}")]
    TypeMismatch { expected: String, found: String, span: SourceSpan },

    #[error("expression is not an lvalue at {span}")]
    NotAnLvalue { span: SourceSpan },

    #[error("condition must be scalar, found {found} at {span}")]
    NonScalarCondition { found: String, span: SourceSpan },

    #[error("'break' outside a loop at {span}")]
    BreakOutsideLoop { span: SourceSpan },

    #[error("'continue' outside a loop at {span}")]
    ContinueOutsideLoop { span: SourceSpan },

    #[error("function '{name}' is not guaranteed to return a value at {span}")]
    MissingReturn { name: String, span: SourceSpan },

    #[error("duplicate definition of function '{name}' at {span}")]
    DuplicateFunction { name: String, span: SourceSpan },

    #[error("'{name}' is called with {found} argument(s), expected {expected} at {span}")]
    ArgumentCountMismatch { name: String, expected: usize, found: usize, span: SourceSpan },

    #[error("cannot call non-function '{name}' at {span}")]
    NotCallable { name: String, span: SourceSpan },

    #[error("'main' must return i64 at {span}")]
    InvalidMainSignature { span: SourceSpan },
}

pub type SemaResult<T> = Result<T, SemaError>;

impl From<SemaError> for statim_common::StatimError {
    fn from(err: SemaError) -> Self {
        statim_common::StatimError::semantic(err.to_string())
    }
}
