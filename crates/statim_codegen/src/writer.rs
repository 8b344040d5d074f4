//! AT&T-syntax assembly writer (spec §4.7): turns the allocated
//! `MachFunction`s plus the program's globals into the final assembly text.
//!
//! Grounded in `original_source/spbe/source/X64/X64AsmWriter.cpp`: the
//! global data directives keyed by constant kind and type size, the
//! constant-pool section preceding each function's code, and the CFI
//! prologue/epilogue sequence this module reproduces as documented (spec
//! §9 flags the `.cfi_def_cfa_offset 16`-before-`subq` ordering as
//! intentional, not a bug to "fix" against a newer System V supplement).

use std::fmt::Write as _;

use statim_ir::{Cfg, Constant, Global};
use statim_parser::Linkage;
use statim_types::TypeContext;

use crate::function::{MachFunction, PoolConstant};
use crate::instr::MachInstruction;
use crate::opcode::Opcode;
use crate::operand::MachOperand;
use crate::reg::MachRegister;

/// Writes a complete translation unit: the `.file` directive, every global,
/// every function's constant pool plus code, and the trailing
/// `.ident`/GNU-stack note. Buffers the whole thing in memory before
/// returning so a fatal error partway through selection or allocation never
/// leaves a half-written `.s` file on disk (the caller only writes this
/// once it's complete).
pub fn write_program(cfg: &Cfg, funcs: &[MachFunction]) -> Vec<u8> {
    let mut out = String::new();
    writeln!(out, "\t.file\t\"{}\"", cfg.file).unwrap();

    for global in &cfg.globals {
        write_global(&mut out, &cfg.types, global);
    }

    for (idx, func) in funcs.iter().enumerate() {
        write_function(&mut out, idx, func);
    }

    writeln!(out, "\t.ident\t\"statim\"").unwrap();
    writeln!(out, "\t.section\t.note.GNU-stack,\"\",@progbits").unwrap();
    out.into_bytes()
}

fn write_global(out: &mut String, ctx: &TypeContext, global: &Global) {
    let size = statim_types::layout::size_of(ctx, global.ty.ty()).max(1);
    let align = statim_types::layout::align_of(ctx, global.ty.ty()).max(1);
    let section = if global.read_only { ".rodata" } else { ".data" };

    writeln!(out, "\t.section\t{section}").unwrap();
    if global.linkage == Linkage::External {
        writeln!(out, "\t.globl\t{}", global.name).unwrap();
    }
    writeln!(out, "\t.align\t{align}").unwrap();
    writeln!(out, "\t.type\t{},@object", global.name).unwrap();
    let emitted_size = match &global.initializer {
        Constant::String(s) => s.len() as u32 + 1,
        _ => size,
    };
    writeln!(out, "\t.size\t{},{emitted_size}", global.name).unwrap();
    writeln!(out, "{}:", global.name).unwrap();
    write_constant_directive(out, &global.initializer, size);
}

/// Directives for a constant by size/kind (spec §6): integers by type size
/// (`.byte/.word/.long/.quad`), floats as IEEE-754 hex via `.long`/`.quad`,
/// a null pointer as `.quad 0x0`, and strings as `.string` with escaping.
fn write_constant_directive(out: &mut String, c: &Constant, size: u32) {
    match c {
        Constant::Int(i) => {
            let directive = match size {
                1 => ".byte",
                2 => ".word",
                4 => ".long",
                _ => ".quad",
            };
            writeln!(out, "\t{directive}\t{i}").unwrap();
        }
        Constant::FP(f) => {
            if size <= 4 {
                writeln!(out, "\t.long\t0x{:08x}", (*f as f32).to_bits()).unwrap();
            } else {
                writeln!(out, "\t.quad\t0x{:016x}", f.to_bits()).unwrap();
            }
        }
        Constant::Null => writeln!(out, "\t.quad\t0x0").unwrap(),
        Constant::String(s) => writeln!(out, "\t.string\t\"{}\"", escape_string(s)).unwrap(),
        Constant::BlockAddress(..) => writeln!(out, "\t.quad\t0x0").unwrap(),
    }
}

fn write_pool_constant(out: &mut String, c: &PoolConstant) {
    match c {
        PoolConstant::F32(f) => writeln!(out, "\t.long\t0x{:08x}", f.to_bits()).unwrap(),
        PoolConstant::F64(f) => writeln!(out, "\t.quad\t0x{:016x}", f.to_bits()).unwrap(),
        PoolConstant::Str(s) => writeln!(out, "\t.string\t\"{}\"", escape_string(s)).unwrap(),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

fn write_function(out: &mut String, idx: usize, func: &MachFunction) {
    writeln!(out, "\t# -- Begin function {}", func.name).unwrap();

    if !func.constant_pool.is_empty() {
        writeln!(out, "\t.section\t.rodata").unwrap();
        for (i, c) in func.constant_pool.iter().enumerate() {
            writeln!(out, "\t.align\t{}", c.align()).unwrap();
            writeln!(out, ".LCPI{idx}_{i}:").unwrap();
            write_pool_constant(out, c);
        }
    }

    writeln!(out, "\t.text").unwrap();
    if func.external {
        writeln!(out, "\t.globl\t{}", func.name).unwrap();
    }
    writeln!(out, "\t.p2align\t4").unwrap();
    writeln!(out, "\t.type\t{},@function", func.name).unwrap();
    writeln!(out, "{}:", func.name).unwrap();
    writeln!(out, ".LFB{idx}:").unwrap();
    writeln!(out, "\t.cfi_startproc").unwrap();
    writeln!(out, "\tpushq\t%rbp").unwrap();
    writeln!(out, "\t.cfi_def_cfa_offset 16").unwrap();
    writeln!(out, "\t.cfi_offset %rbp, -16").unwrap();
    writeln!(out, "\tmovq\t%rsp, %rbp").unwrap();
    writeln!(out, "\t.cfi_def_cfa_register %rbp").unwrap();

    let frame_size = func.frame_size();
    if frame_size > 0 {
        writeln!(out, "\tsubq\t${frame_size}, %rsp").unwrap();
    }

    for block in &func.blocks {
        writeln!(out, ".LBB{idx}_{}:", block.id).unwrap();
        for instr in &block.instrs {
            write_instruction(out, idx, func, instr, frame_size);
        }
    }

    writeln!(out, ".LFE{idx}:").unwrap();
    writeln!(out, "\t.size\t{0}, .LFE{idx}-{0}", func.name).unwrap();
    writeln!(out, "\t.cfi_endproc").unwrap();
    writeln!(out, "\t# -- End function").unwrap();
}

fn write_instruction(out: &mut String, idx: usize, func: &MachFunction, instr: &MachInstruction, frame_size: i32) {
    if instr.opcode == Opcode::Ret64 {
        if frame_size > 0 {
            writeln!(out, "\taddq\t${frame_size}, %rsp").unwrap();
        }
        writeln!(out, "\tpopq\t%rbp").unwrap();
        writeln!(out, "\t.cfi_def_cfa %rsp, 8").unwrap();
        writeln!(out, "\tretq").unwrap();
        return;
    }

    if is_redundant_mov(instr) {
        return;
    }

    let mnemonic = instr.mnemonic();
    let is_call = instr.opcode.is_call();
    let explicit: Vec<&MachOperand> = instr.operands.iter().filter(|o| !o.is_implicit()).collect();

    if explicit.is_empty() {
        writeln!(out, "\t{mnemonic}").unwrap();
        return;
    }

    let rendered: Vec<String> = explicit.iter().enumerate().map(|(i, op)| format_operand(idx, func, op, is_call && i == 0)).collect();
    writeln!(out, "\t{mnemonic}\t{}", rendered.join(", ")).unwrap();
}

/// Drops a `MOV` whose source and destination are the same physical
/// register at the same subregister width — only possible after allocation
/// hands two previously-distinct virtual registers the same physical slot
/// (spec §4.7's peephole pass).
fn is_redundant_mov(instr: &MachInstruction) -> bool {
    if !matches!(
        instr.opcode,
        Opcode::Mov8 | Opcode::Mov16 | Opcode::Mov32 | Opcode::Mov64 | Opcode::Movss | Opcode::Movsd
    ) {
        return false;
    }
    let explicit: Vec<&MachOperand> = instr.operands.iter().filter(|o| !o.is_implicit()).collect();
    if explicit.len() != 2 {
        return false;
    }
    match (explicit[0], explicit[1]) {
        (
            MachOperand::Register { reg: MachRegister::Physical(a), subreg: sa, .. },
            MachOperand::Register { reg: MachRegister::Physical(b), subreg: sb, .. },
        ) => a == b && sa == sb,
        _ => false,
    }
}

fn format_operand(idx: usize, func: &MachFunction, op: &MachOperand, plt: bool) -> String {
    match op {
        MachOperand::Register { reg, subreg, .. } => match reg {
            MachRegister::Physical(r) => r.att_name(*subreg),
            MachRegister::Virtual(v) => format!("%v{v}"),
        },
        MachOperand::Memory { base, displacement } => {
            let base_name = match base {
                MachRegister::Physical(r) => r.att_name(8),
                MachRegister::Virtual(v) => format!("%v{v}"),
            };
            format!("{displacement}({base_name})")
        }
        MachOperand::StackIndex(si) => {
            let slot = &func.stack_info[*si as usize];
            format!("{}(%rbp)", slot.offset)
        }
        MachOperand::Immediate(i) => format!("${i}"),
        MachOperand::BasicBlock(target) => format!(".LBB{idx}_{target}"),
        MachOperand::ConstantIndex(ci) => format!(".LCPI{idx}_{ci}(%rip)"),
        MachOperand::Symbol(s) => {
            if plt {
                format!("{s}@PLT")
            } else {
                s.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{MachBasicBlock, StackSlot};
    use crate::reg::Register;
    use statim_types::TypeContext;

    fn program(types: TypeContext, name: &str) -> Cfg {
        Cfg::new(name, types)
    }

    #[test]
    fn expands_ret_into_epilogue_with_frame() {
        let cfg = program(TypeContext::new(), "t.statim");
        let mut func = MachFunction::new("main", true);
        func.stack_info.push(StackSlot { offset: -8, size: 8, align: 8, local: Some("x".into()) });
        let mut block = MachBasicBlock::new(0);
        block.push(MachInstruction::new(Opcode::Mov64).add_imm(0).add_def(MachRegister::Physical(Register::Rax), 8));
        block.push(MachInstruction::new(Opcode::Ret64));
        func.blocks.push(block);

        let bytes = write_program(&cfg, &[func]);
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains(".cfi_startproc"));
        assert!(text.contains("movq\t$0, %rax"));
        assert!(text.contains("addq\t$16, %rsp"));
        assert!(text.contains("popq\t%rbp"));
        assert!(text.contains("retq"));
        assert!(text.contains(".cfi_endproc"));
        assert!(text.contains(".size\tmain, .LFE0-main"));
    }

    #[test]
    fn drops_redundant_self_moves() {
        let cfg = program(TypeContext::new(), "t.statim");
        let mut func = MachFunction::new("f", true);
        let mut block = MachBasicBlock::new(0);
        block.push(
            MachInstruction::new(Opcode::Mov64)
                .add_use(MachRegister::Physical(Register::Rax), 8)
                .add_def(MachRegister::Physical(Register::Rax), 8),
        );
        block.push(MachInstruction::new(Opcode::Ret64));
        func.blocks.push(block);

        let bytes = write_program(&cfg, &[func]);
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("movq\t%rax, %rax"));
    }

    #[test]
    fn call_target_gets_plt_suffix() {
        let cfg = program(TypeContext::new(), "t.statim");
        let mut func = MachFunction::new("f", true);
        let mut block = MachBasicBlock::new(0);
        block.push(MachInstruction::new(Opcode::Call64).add_symbol("helper"));
        block.push(MachInstruction::new(Opcode::Ret64));
        func.blocks.push(block);

        let bytes = write_program(&cfg, &[func]);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("call\thelper@PLT"));
    }

    #[test]
    fn string_global_escapes_and_lands_in_rodata() {
        use statim_ir::{Global, GlobalId};
        let mut types = TypeContext::new();
        let char_ty = types.int(statim_types::IntWidth::W8);
        let elem = statim_types::TypeUse::unqualified(char_ty);
        let arr_ty = types.array(elem, 6);
        let ty_use = statim_types::TypeUse::unqualified(arr_ty);
        let mut cfg = program(types, "t.statim");
        cfg.push_global(Global {
            id: GlobalId(0),
            name: ".Lstr.0".into(),
            ty: ty_use,
            linkage: Linkage::Internal,
            initializer: Constant::String("hi\n".into()),
            read_only: true,
        });

        let bytes = write_program(&cfg, &[]);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(".section\t.rodata"));
        assert!(text.contains(".string\t\"hi\\n\""));
    }
}
