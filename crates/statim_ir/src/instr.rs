//! IR instructions and their opcodes (spec §3.3).
//!
//! The opcode set is grounded in `original_source/spbe/source/graph/
//! InstrBuilder.cpp`'s `build_*` family — signed/unsigned multiply, divide
//! and remainder stay distinct opcodes (x86-64 uses different instructions
//! for each), and every conversion spec.md §3.3 names (`SExt`, `ZExt`,
//! `FExt`, `ITrunc`, `FTrunc`, `SI2FP`, `UI2FP`, `FP2SI`, `FP2UI`, `P2I`,
//! `I2P`, `Reinterpret`) is its own opcode rather than a generic "Cast" —
//! the IR has no implicit conversions, so each must be selectable on its
//! own.

use serde::{Deserialize, Serialize};
use statim_types::TypeUse;

use crate::value::{BlockId, Value, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ICmpOp {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Ordered comparisons trap on NaN operands (conceptually); unordered ones
/// treat a NaN operand as satisfying the comparison. `Oeq`/`One` are the pair
/// spec.md's implicit-boolean-reduction rule injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FCmpOp {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
    Ueq,
    Une,
    Ult,
    Ule,
    Ugt,
    Uge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Nop,

    Load,
    Store,
    /// Pointer arithmetic: `base + index * size(element)`, lowered through a
    /// dedicated opcode rather than integer multiply-add (spec §4.3).
    AccessPtr,
    Select,
    BranchIf,
    Jump,
    Phi,
    Return,
    Abort,
    Unreachable,
    Call,
    /// Call in tail position: selected identically to `Call` followed by
    /// `Return` (spec §3.3's "treated like call+return").
    TailCall,

    ICmp(ICmpOp),
    FCmp(FCmpOp),

    IAdd,
    FAdd,
    ISub,
    FSub,
    SMul,
    UMul,
    FMul,
    SDiv,
    UDiv,
    FDiv,
    SRem,
    URem,

    BitAnd,
    BitOr,
    BitXor,
    Shl,
    LShr,
    AShr,

    Not,
    INeg,
    FNeg,

    SExt,
    ZExt,
    FExt,
    ITrunc,
    FTrunc,
    SI2FP,
    UI2FP,
    FP2SI,
    FP2UI,
    P2I,
    I2P,
    Reinterpret,

    InlineAsm,
}

impl Opcode {
    /// A block's single terminator must be one of these (spec §3.3).
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Jump | Opcode::BranchIf | Opcode::Return | Opcode::Abort | Opcode::Unreachable | Opcode::TailCall
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, Opcode::ICmp(_) | Opcode::FCmp(_))
    }
}

/// One instruction: an opcode, an optional result (nullable for
/// side-effecting ops per spec §3.3), its operand list, and optional
/// per-opcode scalar data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub result: Option<ValueId>,
    pub result_ty: Option<TypeUse>,
    pub operands: Vec<Value>,
    pub data: InstrData,
}

/// Per-opcode scalar data that doesn't fit the operand list: `Load`/`Store`
/// alignment, and an inline-asm instruction's template/constraint text
/// (its `args` live in `operands`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum InstrData {
    #[default]
    None,
    Align(u32),
    InlineAsm {
        template: String,
        constraints: String,
    },
}

impl Instruction {
    pub fn new(opcode: Opcode, result: Option<ValueId>, result_ty: Option<TypeUse>, operands: Vec<Value>) -> Self {
        Self { opcode, result, result_ty, operands, data: InstrData::None }
    }

    pub fn with_data(mut self, data: InstrData) -> Self {
        self.data = data;
        self
    }

    /// For a `BranchIf`, the `(then, else)` block targets encoded as its
    /// second and third operands.
    pub fn branch_targets(&self) -> Option<(BlockId, BlockId)> {
        if self.opcode != Opcode::BranchIf {
            return None;
        }
        let then_blk = block_address(&self.operands[1])?;
        let else_blk = block_address(&self.operands[2])?;
        Some((then_blk, else_blk))
    }

    pub fn jump_target(&self) -> Option<BlockId> {
        if self.opcode != Opcode::Jump {
            return None;
        }
        block_address(&self.operands[0])
    }

    /// Every `(predecessor, value)` pair wired into a `Phi`.
    pub fn phi_incoming(&self) -> impl Iterator<Item = (BlockId, &Value)> {
        self.operands.iter().filter_map(|v| match &v.kind {
            crate::value::ValueKind::PhiOperand { pred, value } => Some((*pred, value.as_ref())),
            _ => None,
        })
    }
}

fn block_address(v: &Value) -> Option<BlockId> {
    match &v.kind {
        crate::value::ValueKind::Constant(crate::value::Constant::BlockAddress(_, block)) => Some(*block),
        _ => None,
    }
}
