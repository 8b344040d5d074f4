//! Machine operands (spec §3.4).
//!
//! Grounded in `original_source/spbe/source/machine/MachOperand.cpp`'s
//! `create_*` factory functions; the constructors here keep the same
//! invariant asserts (`dead ⇒ def`, `kill ⇒ ¬def`) spec.md §3.4 states.

use serde::{Deserialize, Serialize};

use crate::reg::MachRegister;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MachOperand {
    Register {
        reg: MachRegister,
        /// Operand width in bytes (1, 2, 4 or 8) — the x86-64 subregister
        /// this reference is made through.
        subreg: u32,
        def: bool,
        implicit: bool,
        kill: bool,
        dead: bool,
    },
    /// `[base + displacement]`.
    Memory {
        base: MachRegister,
        displacement: i32,
    },
    StackIndex(u32),
    Immediate(i64),
    BasicBlock(u32),
    ConstantIndex(u32),
    Symbol(String),
}

impl MachOperand {
    pub fn reg_use(reg: MachRegister, subreg: u32) -> Self {
        Self::create_reg(reg, subreg, false, false, false, false)
    }

    pub fn reg_def(reg: MachRegister, subreg: u32) -> Self {
        Self::create_reg(reg, subreg, true, false, false, false)
    }

    pub fn reg_kill(reg: MachRegister, subreg: u32) -> Self {
        Self::create_reg(reg, subreg, false, false, true, false)
    }

    pub fn implicit_def(reg: MachRegister, subreg: u32) -> Self {
        Self::create_reg(reg, subreg, true, true, false, false)
    }

    pub fn implicit_use(reg: MachRegister, subreg: u32) -> Self {
        Self::create_reg(reg, subreg, false, true, false, false)
    }

    pub fn create_reg(reg: MachRegister, subreg: u32, def: bool, implicit: bool, kill: bool, dead: bool) -> Self {
        assert!(!dead || def, "a dead flag requires a def operand");
        assert!(!(kill && def), "a kill flag is only meaningful on a use operand");
        Self::Register { reg, subreg, def, implicit, kill, dead }
    }

    pub fn create_mem(base: MachRegister, displacement: i32) -> Self {
        Self::Memory { base, displacement }
    }

    pub fn create_stack_index(idx: u32) -> Self {
        Self::StackIndex(idx)
    }

    pub fn create_imm(imm: i64) -> Self {
        Self::Immediate(imm)
    }

    pub fn create_zero() -> Self {
        Self::Immediate(0)
    }

    pub fn create_block(target: u32) -> Self {
        Self::BasicBlock(target)
    }

    pub fn create_constant_index(idx: u32) -> Self {
        Self::ConstantIndex(idx)
    }

    pub fn create_symbol(symbol: impl Into<String>) -> Self {
        Self::Symbol(symbol.into())
    }

    pub fn is_def(&self) -> bool {
        matches!(self, MachOperand::Register { def: true, .. })
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, MachOperand::Register { implicit: true, .. })
    }

    pub fn as_register(&self) -> Option<MachRegister> {
        match self {
            MachOperand::Register { reg, .. } => Some(*reg),
            _ => None,
        }
    }
}
