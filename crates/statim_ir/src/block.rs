//! Basic blocks: a maximal straight-line instruction sequence ending in
//! exactly one terminator (spec §3.3/glossary).
//!
//! The reference implementation links blocks and instructions with
//! intrusive `prev`/`next` pointers; per spec §9's design notes this
//! becomes an owned `Vec` plus predecessor/successor lists tracked as plain
//! `BlockId`s, since nothing here needs `O(1)` mid-list splice.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::instr::Instruction;
use crate::value::BlockId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instrs: Vec<Instruction>,
    pub preds: SmallVec<[BlockId; 2]>,
    pub succs: SmallVec<[BlockId; 2]>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self { id, instrs: Vec::new(), preds: SmallVec::new(), succs: SmallVec::new() }
    }

    pub fn push(&mut self, inst: Instruction) {
        debug_assert!(
            self.terminator().is_none(),
            "cannot append past a block's terminator"
        );
        self.instrs.push(inst);
    }

    pub fn prepend(&mut self, inst: Instruction) {
        self.instrs.insert(0, inst);
    }

    pub fn terminator(&self) -> Option<&Instruction> {
        self.instrs.last().filter(|i| i.opcode.is_terminator())
    }

    pub fn has_terminator(&self) -> bool {
        self.terminator().is_some()
    }

    pub fn has_preds(&self) -> bool {
        !self.preds.is_empty()
    }
}
