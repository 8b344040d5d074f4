//! The target-independent IR (spec §3.3): a single static-assignment value
//! graph of functions, basic blocks and instructions, plus the two-phase
//! AST-to-IR lowering pass that builds it (spec §4.3).
//!
//! Downstream, `statim_codegen` consumes a `Cfg` produced here and never
//! walks the AST directly — everything past this crate is target-dependent.

pub mod block;
pub mod builder;
pub mod cfg;
pub mod error;
pub mod function;
pub mod instr;
pub mod lower;
pub mod value;

pub use block::BasicBlock;
pub use builder::{Builder, InsertMode};
pub use cfg::Cfg;
pub use error::{LoweringError, LoweringResult};
pub use function::{Function, Global, GlobalDef, Local};
pub use instr::{FCmpOp, ICmpOp, InstrData, Instruction, Opcode};
pub use lower::lower;
pub use value::{BlockId, Constant, FunctionId, GlobalId, LocalId, Value, ValueId, ValueKind};
