//! x86-64 code generation (spec §3.4, §4.4-§4.7): instruction selection,
//! liveness-driven linear-scan register allocation with caller-save
//! insertion, and the AT&T assembly writer, wired into the single
//! [`compile`] entry point `statim_cli` calls after `statim_ir::lower`.

pub mod error;
pub mod function;
pub mod instr;
pub mod layout;
pub mod opcode;
pub mod operand;
pub mod reg;
pub mod regalloc;
pub mod select;
pub mod writer;

pub use error::{CodegenError, CodegenResult};
pub use function::{MachBasicBlock, MachFunction, PoolConstant, StackSlot, VRegInfo};
pub use instr::MachInstruction;
pub use operand::MachOperand;
pub use reg::{MachRegister, RegClass, Register};

use statim_ir::Cfg;

/// Runs the whole backend over an already-lowered program: instruction
/// selection per function, then register allocation (which also rewrites
/// spills and inserts caller-save pushes/pops), then assembly emission.
pub fn compile(cfg: &Cfg) -> CodegenResult<Vec<u8>> {
    let mut funcs = select::select_program(cfg)?;
    for func in &mut funcs {
        regalloc::allocate(func);
    }
    Ok(writer::write_program(cfg, &funcs))
}
