//! The IR value hierarchy (spec §3.3): every operand an instruction can
//! reference, each carrying its own [`TypeUse`] so no pass needs to thread a
//! function/context pair through just to ask "what type is this operand".
//!
//! Grounded in `original_source/spbe`'s `Value` base class and its
//! `Constant`/`Global`/`Function`/`Argument`/`Local`/`Instruction` subtypes;
//! `BlockAddress` folds into `Constant` here rather than getting its own
//! variant, since its only use (branch/jump targets) already carries the
//! target `BlockId` directly on those instructions.

use serde::{Deserialize, Serialize};
use statim_types::TypeUse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(pub u32);

/// Literal, self-contained values: the only values that need no function or
/// global table to make sense of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i64),
    FP(f64),
    Null,
    String(String),
    /// The address of `block` within `function`, used as a jump/branch
    /// target operand.
    BlockAddress(FunctionId, BlockId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValueKind {
    Constant(Constant),
    Global(GlobalId),
    Function(FunctionId),
    /// Index into the owning function's parameter list.
    Argument(u32),
    Local(LocalId),
    /// The result of a previously-emitted instruction in the same function.
    Instruction(ValueId),
    /// One incoming edge of a `Phi`: the value arriving along `pred`.
    PhiOperand { pred: BlockId, value: Box<Value> },
    InlineAsm { template: String, constraints: String },
}

/// A typed use of some [`ValueKind`] as an instruction operand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: TypeUse,
}

impl Value {
    pub fn new(kind: ValueKind, ty: TypeUse) -> Self {
        Self { kind, ty }
    }

    pub fn constant(c: Constant, ty: TypeUse) -> Self {
        Self::new(ValueKind::Constant(c), ty)
    }

    pub fn global(id: GlobalId, ty: TypeUse) -> Self {
        Self::new(ValueKind::Global(id), ty)
    }

    pub fn function(id: FunctionId, ty: TypeUse) -> Self {
        Self::new(ValueKind::Function(id), ty)
    }

    pub fn argument(index: u32, ty: TypeUse) -> Self {
        Self::new(ValueKind::Argument(index), ty)
    }

    pub fn local(id: LocalId, ty: TypeUse) -> Self {
        Self::new(ValueKind::Local(id), ty)
    }

    pub fn instr(id: ValueId, ty: TypeUse) -> Self {
        Self::new(ValueKind::Instruction(id), ty)
    }

    pub fn phi_operand(pred: BlockId, value: Value) -> Self {
        let ty = value.ty;
        Self::new(ValueKind::PhiOperand { pred, value: Box::new(value) }, ty)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ValueKind::Constant(_))
    }
}
