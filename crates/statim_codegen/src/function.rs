//! `MachFunction` and `MachBasicBlock` (spec §3.4): the per-function machine
//! IR that instruction selection builds and the allocator/writer consume.

use serde::{Deserialize, Serialize};

use crate::instr::MachInstruction;
use crate::reg::RegClass;

/// One stack-frame entry: a local variable's slot or a spill slot the
/// allocator carved out (spec §3.4: "a stack-info vector (entries of
/// `{offset, size, align, local?}`)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackSlot {
    pub offset: i32,
    pub size: u32,
    pub align: u32,
    /// `Some(name)` for a slot that mirrors a source-level local; `None`
    /// for a spill slot minted by the allocator.
    pub local: Option<String>,
}

/// A constant-pool entry: a float or string literal referenced by
/// `%rip`-relative `ConstantIndex` operand (spec §4.7: "a read-only
/// constant-pool section with one entry per pool index").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PoolConstant {
    F32(f32),
    F64(f64),
    Str(String),
}

impl PoolConstant {
    pub fn size(&self) -> u32 {
        match self {
            PoolConstant::F32(_) => 4,
            PoolConstant::F64(_) => 8,
            PoolConstant::Str(s) => s.len() as u32 + 1,
        }
    }

    pub fn align(&self) -> u32 {
        match self {
            PoolConstant::F32(_) => 4,
            PoolConstant::F64(_) => 8,
            PoolConstant::Str(_) => 1,
        }
    }
}

/// A virtual register's class and allocation result (spec §3.4: "a
/// register-info table (virtual-register id -> `{class, allocation}`)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VRegInfo {
    pub class: RegClass,
    /// Filled in by the allocator; `None` means "not yet allocated" (or, for
    /// a spilled range, stays `None` and the stack slot is authoritative).
    pub alloc: Option<crate::reg::Register>,
    /// Set by the allocator when this vreg was spilled instead of assigned a
    /// physical register.
    pub spill_slot: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachBasicBlock {
    pub id: u32,
    pub instrs: Vec<MachInstruction>,
    pub preds: Vec<u32>,
}

impl MachBasicBlock {
    pub fn new(id: u32) -> Self {
        Self { id, instrs: Vec::new(), preds: Vec::new() }
    }

    pub fn push(&mut self, instr: MachInstruction) {
        self.instrs.push(instr);
    }

    /// Inserts before the block's terminator, or at the end if it has none
    /// yet (spec §4.4's phi-resolution rule: "emit a `MOV` ... at the *end*
    /// of `pred` (before terminators)").
    pub fn insert_before_terminators(&mut self, instr: MachInstruction) {
        let mut idx = self.instrs.len();
        while idx > 0 && is_terminator_opcode(self.instrs[idx - 1].opcode) {
            idx -= 1;
        }
        self.instrs.insert(idx, instr);
    }
}

fn is_terminator_opcode(op: crate::opcode::Opcode) -> bool {
    use crate::opcode::Opcode::*;
    op.is_unconditional_jump() || op.is_conditional_jump() || op.is_ret() || matches!(op, Ud2)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachFunction {
    pub name: String,
    pub external: bool,
    pub stack_info: Vec<StackSlot>,
    /// Indexed by `vreg id - VirtualBarrier`; see [`crate::reg::MachRegister`].
    pub vregs: Vec<VRegInfo>,
    pub constant_pool: Vec<PoolConstant>,
    pub blocks: Vec<MachBasicBlock>,
}

/// Virtual-register ids below this value are reserved for physical
/// registers; this is purely a documentation marker here, since
/// `MachRegister` already separates the two with a Rust enum rather than a
/// shared integer space (spec §3.4's "reserved physical range").
pub const VIRTUAL_BARRIER: u32 = 64;

impl MachFunction {
    pub fn new(name: impl Into<String>, external: bool) -> Self {
        Self { name: name.into(), external, stack_info: Vec::new(), vregs: Vec::new(), constant_pool: Vec::new(), blocks: Vec::new() }
    }

    pub fn push_block(&mut self) -> u32 {
        let id = self.blocks.len() as u32;
        self.blocks.push(MachBasicBlock::new(id));
        id
    }

    pub fn block_mut(&mut self, id: u32) -> &mut MachBasicBlock {
        &mut self.blocks[id as usize]
    }

    pub fn block(&self, id: u32) -> &MachBasicBlock {
        &self.blocks[id as usize]
    }

    pub fn new_vreg(&mut self, class: RegClass) -> u32 {
        let id = self.vregs.len() as u32;
        self.vregs.push(VRegInfo { class, alloc: None, spill_slot: None });
        id
    }

    pub fn push_stack_slot(&mut self, size: u32, align: u32, local: Option<String>) -> u32 {
        let offset = next_slot_offset(&self.stack_info, size, align);
        let idx = self.stack_info.len() as u32;
        self.stack_info.push(StackSlot { offset, size, align, local });
        idx
    }

    /// Interns a constant-pool entry, deduplicating by value like the
    /// lowerer's string-global pool (spec §4.4: "float constants -> a new
    /// constant-pool entry").
    pub fn intern_constant(&mut self, c: PoolConstant) -> u32 {
        if let Some(idx) = self.constant_pool.iter().position(|e| *e == c) {
            return idx as u32;
        }
        let idx = self.constant_pool.len() as u32;
        self.constant_pool.push(c);
        idx
    }

    /// Total frame size, rounded up to 16-byte alignment for the System V
    /// ABI's call-site stack alignment requirement.
    pub fn frame_size(&self) -> i32 {
        let raw = self.stack_info.iter().map(|s| -s.offset + s.size as i32).max().unwrap_or(0);
        (raw + 15) & !15
    }
}

/// Lays out stack slots downward from `%rbp` (negative offsets), each
/// aligned to its own natural alignment, growing the frame as needed — the
/// same packing rule spec §4.5 describes for struct fields, applied to the
/// frame itself.
fn next_slot_offset(existing: &[StackSlot], size: u32, align: u32) -> i32 {
    let used: i32 = existing.iter().map(|s| -s.offset).max().unwrap_or(0);
    let aligned = statim_types::layout::align_to(used as u32, align) as i32;
    -(aligned + size as i32)
}
