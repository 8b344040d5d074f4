//! Codegen-stage errors (spec §7: "the core's own `Lowering`/`Codegen`
//! variants"), mirroring `statim_ir::LoweringError`'s shape. The IR carries
//! no source spans (those are spent during lowering), so these identify the
//! offending function by name instead.

use statim_common::StatimError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CodegenError {
    #[error("unsupported construct in function '{function}': {what}")]
    Unsupported { function: String, what: String },

    /// Spec §4.4: "more than six arguments is unsupported".
    #[error("call in function '{function}' has more than six arguments, which is unsupported")]
    TooManyArguments { function: String },

    #[error("malformed inline assembly template in function '{function}': {message}")]
    MalformedInlineAsm { function: String, message: String },
}

pub type CodegenResult<T> = Result<T, CodegenError>;

impl From<CodegenError> for StatimError {
    fn from(e: CodegenError) -> Self {
        StatimError::codegen(e.to_string())
    }
}
