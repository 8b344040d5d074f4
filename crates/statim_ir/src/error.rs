//! The external-facing error type for the lowerer, matching the teacher's
//! per-crate `SeenError` convention: typed variants a caller can match on,
//! each carrying the span it was raised from.

use statim_common::SourceSpan;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoweringError {
    #[error("unsupported construct: {what} at {span}")]
    Unsupported { what: String, span: SourceSpan },

    #[error("call with more than 6 arguments is not supported at {span}")]
    TooManyArguments { span: SourceSpan },

    #[error("a non-constant initializer is not allowed for global '{name}' at {span}")]
    NonConstantGlobalInit { name: String, span: SourceSpan },

    #[error("reference to unresolved declaration at {span}")]
    UnresolvedReference { span: SourceSpan },
}

pub type LoweringResult<T> = Result<T, LoweringError>;

impl From<LoweringError> for statim_common::StatimError {
    fn from(err: LoweringError) -> Self {
        statim_common::StatimError::lowering(err.to_string())
    }
}
