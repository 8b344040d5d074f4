//! Machine instructions: one opcode plus its ordered operand list (spec
//! §3.4).
//!
//! Grounded in `original_source/spbe/include/spbe/machine/
//! MachInstruction.hpp`'s def/use partitioning and chainable `add_*`
//! builder methods.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::opcode::Opcode;
use crate::operand::MachOperand;
use crate::reg::MachRegister;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachInstruction {
    pub opcode: Opcode,
    pub operands: SmallVec<[MachOperand; 4]>,
    /// Set only for [`Opcode::Raw`]: a mnemonic lifted verbatim from an
    /// inline-asm template line that has no selector-level opcode of its
    /// own (e.g. `syscall`).
    pub raw_mnemonic: Option<String>,
}

impl MachInstruction {
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, operands: SmallVec::new(), raw_mnemonic: None }
    }

    pub fn raw(mnemonic: impl Into<String>) -> Self {
        Self { opcode: Opcode::Raw, operands: SmallVec::new(), raw_mnemonic: Some(mnemonic.into()) }
    }

    pub fn mnemonic(&self) -> &str {
        match &self.raw_mnemonic {
            Some(m) => m,
            None => self.opcode.mnemonic(),
        }
    }

    pub fn add_operand(mut self, operand: MachOperand) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn add_reg(self, reg: MachRegister, subreg: u32, def: bool, implicit: bool, kill: bool, dead: bool) -> Self {
        self.add_operand(MachOperand::create_reg(reg, subreg, def, implicit, kill, dead))
    }

    pub fn add_use(self, reg: MachRegister, subreg: u32) -> Self {
        self.add_operand(MachOperand::reg_use(reg, subreg))
    }

    pub fn add_def(self, reg: MachRegister, subreg: u32) -> Self {
        self.add_operand(MachOperand::reg_def(reg, subreg))
    }

    pub fn add_mem(self, base: MachRegister, displacement: i32) -> Self {
        self.add_operand(MachOperand::create_mem(base, displacement))
    }

    pub fn add_stack_index(self, idx: u32) -> Self {
        self.add_operand(MachOperand::create_stack_index(idx))
    }

    pub fn add_imm(self, imm: i64) -> Self {
        self.add_operand(MachOperand::create_imm(imm))
    }

    pub fn add_zero(self) -> Self {
        self.add_operand(MachOperand::create_zero())
    }

    pub fn add_block(self, target: u32) -> Self {
        self.add_operand(MachOperand::create_block(target))
    }

    pub fn add_constant_index(self, idx: u32) -> Self {
        self.add_operand(MachOperand::create_constant_index(idx))
    }

    pub fn add_symbol(self, symbol: impl Into<String>) -> Self {
        self.add_operand(MachOperand::create_symbol(symbol))
    }

    /// The operand written as the destination in AT&T syntax: the first
    /// explicit (non-implicit) def, if any.
    pub fn explicit_def(&self) -> Option<&MachOperand> {
        self.operands.iter().find(|o| o.is_def() && !o.is_implicit())
    }

    pub fn defs(&self) -> impl Iterator<Item = &MachOperand> {
        self.operands.iter().filter(|o| o.is_def())
    }

    pub fn uses(&self) -> impl Iterator<Item = &MachOperand> {
        self.operands.iter().filter(|o| !o.is_def())
    }

    pub fn num_explicit_defs(&self) -> usize {
        self.operands.iter().filter(|o| o.is_def() && !o.is_implicit()).count()
    }
}
