//! x86-64 machine opcodes (spec §4.4/§4.7).
//!
//! Transcribed from `original_source/spbe/include/x64/x64.hpp`'s `Opcode`
//! enum. Width-suffixed variants (`Mov8`..`Mov64`, `Add8`..`Add64`, etc.)
//! exist because AT&T mnemonics encode operand width in the instruction
//! name rather than the operand itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    Nop,
    Jmp,
    Ud2,
    Cqo,
    Call64,
    Ret64,

    Lea32,
    Lea64,
    Push64,
    Pop64,

    Mov8,
    Mov16,
    Mov32,
    Mov64,
    Movabs,
    Movsx8,
    Movsx16,
    Movsx32,
    Movzx8,
    Movzx16,

    Add8,
    Add16,
    Add32,
    Add64,
    Sub8,
    Sub16,
    Sub32,
    Sub64,
    Imul16,
    Imul32,
    Imul64,
    Mul8,
    Div8,
    Div16,
    Div32,
    Div64,
    Idiv8,
    Idiv16,
    Idiv32,
    Idiv64,
    And8,
    And16,
    And32,
    And64,
    Or8,
    Or16,
    Or32,
    Or64,
    Xor8,
    Xor16,
    Xor32,
    Xor64,
    Shl8,
    Shl16,
    Shl32,
    Shl64,
    Shr8,
    Shr16,
    Shr32,
    Shr64,
    Sar8,
    Sar16,
    Sar32,
    Sar64,
    Cmp8,
    Cmp16,
    Cmp32,
    Cmp64,
    Not8,
    Not16,
    Not32,
    Not64,
    Neg8,
    Neg16,
    Neg32,
    Neg64,

    Je,
    Jne,
    Jl,
    Jle,
    Jg,
    Jge,
    Ja,
    Jae,
    Jb,
    Jbe,

    Sete,
    Setne,
    Setl,
    Setle,
    Setg,
    Setge,
    Seta,
    Setae,
    Setb,
    Setbe,

    Movss,
    Movsd,
    Movaps,
    Movapd,
    Ucomiss,
    Ucomisd,
    Addss,
    Addsd,
    Subss,
    Subsd,
    Mulss,
    Mulsd,
    Divss,
    Divsd,
    Andps,
    Andpd,
    Orps,
    Orpd,
    Xorps,
    Xorpd,

    Cvtss2sd,
    Cvtsd2ss,
    Cvtsi2ss,
    Cvtsi2sd,
    Cvttss2si32,
    Cvttss2si64,
    Cvttsd2si32,
    Cvttsd2si64,

    /// A mnemonic with no selector-level meaning, passed through verbatim
    /// from an inline-asm template line the selector couldn't otherwise map
    /// (spec §4.4: "parse the template string line by line; each line's
    /// mnemonic maps to an opcode enum"). The writer reads the text from
    /// `MachInstruction::raw_mnemonic` rather than [`Opcode::mnemonic`].
    Raw,
}

impl Opcode {
    /// The mnemonic as written by the assembly writer (spec §4.7: "each
    /// instruction is written as `\t<mnemonic>\t<operands>`").
    pub fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            Jmp => "jmp",
            Ud2 => "ud2",
            Cqo => "cqto",
            Call64 => "call",
            Ret64 => "ret",

            Lea32 => "leal",
            Lea64 => "leaq",
            Push64 => "pushq",
            Pop64 => "popq",

            Mov8 => "movb",
            Mov16 => "movw",
            Mov32 => "movl",
            Mov64 => "movq",
            Movabs => "movabsq",
            Movsx8 => "movsbq",
            Movsx16 => "movswq",
            Movsx32 => "movslq",
            Movzx8 => "movzbl",
            Movzx16 => "movzwl",

            Add8 => "addb",
            Add16 => "addw",
            Add32 => "addl",
            Add64 => "addq",
            Sub8 => "subb",
            Sub16 => "subw",
            Sub32 => "subl",
            Sub64 => "subq",
            Imul16 => "imulw",
            Imul32 => "imull",
            Imul64 => "imulq",
            Mul8 => "mulb",
            Div8 => "divb",
            Div16 => "divw",
            Div32 => "divl",
            Div64 => "divq",
            Idiv8 => "idivb",
            Idiv16 => "idivw",
            Idiv32 => "idivl",
            Idiv64 => "idivq",
            And8 => "andb",
            And16 => "andw",
            And32 => "andl",
            And64 => "andq",
            Or8 => "orb",
            Or16 => "orw",
            Or32 => "orl",
            Or64 => "orq",
            Xor8 => "xorb",
            Xor16 => "xorw",
            Xor32 => "xorl",
            Xor64 => "xorq",
            Shl8 => "shlb",
            Shl16 => "shlw",
            Shl32 => "shll",
            Shl64 => "shlq",
            Shr8 => "shrb",
            Shr16 => "shrw",
            Shr32 => "shrl",
            Shr64 => "shrq",
            Sar8 => "sarb",
            Sar16 => "sarw",
            Sar32 => "sarl",
            Sar64 => "sarq",
            Cmp8 => "cmpb",
            Cmp16 => "cmpw",
            Cmp32 => "cmpl",
            Cmp64 => "cmpq",
            Not8 => "notb",
            Not16 => "notw",
            Not32 => "notl",
            Not64 => "notq",
            Neg8 => "negb",
            Neg16 => "negw",
            Neg32 => "negl",
            Neg64 => "negq",

            Je => "je",
            Jne => "jne",
            Jl => "jl",
            Jle => "jle",
            Jg => "jg",
            Jge => "jge",
            Ja => "ja",
            Jae => "jae",
            Jb => "jb",
            Jbe => "jbe",

            Sete => "sete",
            Setne => "setne",
            Setl => "setl",
            Setle => "setle",
            Setg => "setg",
            Setge => "setge",
            Seta => "seta",
            Setae => "setae",
            Setb => "setb",
            Setbe => "setbe",

            Movss => "movss",
            Movsd => "movsd",
            Movaps => "movaps",
            Movapd => "movapd",
            Ucomiss => "ucomiss",
            Ucomisd => "ucomisd",
            Addss => "addss",
            Addsd => "addsd",
            Subss => "subss",
            Subsd => "subsd",
            Mulss => "mulss",
            Mulsd => "mulsd",
            Divss => "divss",
            Divsd => "divsd",
            Andps => "andps",
            Andpd => "andpd",
            Orps => "orps",
            Orpd => "orpd",
            Xorps => "xorps",
            Xorpd => "xorpd",

            Cvtss2sd => "cvtss2sd",
            Cvtsd2ss => "cvtsd2ss",
            Cvtsi2ss => "cvtsi2ss",
            Cvtsi2sd => "cvtsi2sd",
            Cvttss2si32 => "cvttss2si",
            Cvttss2si64 => "cvttss2si",
            Cvttsd2si32 => "cvttsd2si",
            Cvttsd2si64 => "cvttsd2si",

            Raw => panic!("Opcode::Raw has no static mnemonic; read MachInstruction::raw_mnemonic instead"),
        }
    }

    /// `CALL64` is the only opcode needing the ELF PLT-indirection suffix
    /// (spec §4.7: "suffixing `@PLT` on call targets").
    pub fn is_call(self) -> bool {
        matches!(self, Opcode::Call64)
    }

    pub fn is_unconditional_jump(self) -> bool {
        matches!(self, Opcode::Jmp)
    }

    pub fn is_conditional_jump(self) -> bool {
        use Opcode::*;
        matches!(self, Je | Jne | Jl | Jle | Jg | Jge | Ja | Jae | Jb | Jbe)
    }

    pub fn is_ret(self) -> bool {
        matches!(self, Opcode::Ret64)
    }
}

/// Flips a conditional-jump opcode's sense for operand-order swaps (spec
/// §4.4: "flip condition code so that the immediate, if any, ends up on the
/// left"). Equality/inequality are self-flips; ordered comparisons swap
/// `</>` and `<=/>=` within their signedness family.
pub fn flip_jcc(op: Opcode) -> Opcode {
    use Opcode::*;
    match op {
        Je => Je,
        Jne => Jne,
        Jl => Jg,
        Jg => Jl,
        Jle => Jge,
        Jge => Jle,
        Jb => Ja,
        Ja => Jb,
        Jbe => Jae,
        Jae => Jbe,
        other => other,
    }
}

/// Logical negation of a conditional-jump opcode, used to invert a branch
/// when the deferred-comparison fast path swaps which arm is "then".
pub fn negate_jcc(op: Opcode) -> Opcode {
    use Opcode::*;
    match op {
        Je => Jne,
        Jne => Je,
        Jl => Jge,
        Jge => Jl,
        Jle => Jg,
        Jg => Jle,
        Jb => Jae,
        Jae => Jb,
        Jbe => Ja,
        Ja => Jbe,
        other => other,
    }
}

/// Picks the width-suffixed `MOV` family member (spec §4.4's "opcode suffix
/// selection... 1/8 -> `b`, 16 -> `w`, 32 -> `l`/`ss`, 64 -> `q`/`sd`").
pub fn mov_op(width_bytes: u32, is_float: bool) -> Opcode {
    if is_float {
        return if width_bytes <= 4 { Opcode::Movss } else { Opcode::Movsd };
    }
    match width_bytes {
        1 => Opcode::Mov8,
        2 => Opcode::Mov16,
        4 => Opcode::Mov32,
        _ => Opcode::Mov64,
    }
}

pub fn add_op(width_bytes: u32, is_float: bool) -> Opcode {
    if is_float {
        return if width_bytes <= 4 { Opcode::Addss } else { Opcode::Addsd };
    }
    match width_bytes {
        1 => Opcode::Add8,
        2 => Opcode::Add16,
        4 => Opcode::Add32,
        _ => Opcode::Add64,
    }
}

pub fn sub_op(width_bytes: u32, is_float: bool) -> Opcode {
    if is_float {
        return if width_bytes <= 4 { Opcode::Subss } else { Opcode::Subsd };
    }
    match width_bytes {
        1 => Opcode::Sub8,
        2 => Opcode::Sub16,
        4 => Opcode::Sub32,
        _ => Opcode::Sub64,
    }
}

/// Used for both `SMul` and `UMul`: the low bits of a two's-complement
/// product are identical whether the operands are interpreted as signed or
/// unsigned, so `IMUL`'s truncating 2-operand form serves both IR opcodes.
pub fn mul_op(width_bytes: u32, is_float: bool) -> Opcode {
    if is_float {
        return if width_bytes <= 4 { Opcode::Mulss } else { Opcode::Mulsd };
    }
    match width_bytes {
        2 => Opcode::Imul16,
        4 => Opcode::Imul32,
        _ => Opcode::Imul64,
    }
}

pub fn div_op(width_bytes: u32, is_float: bool, signed: bool) -> Opcode {
    if is_float {
        return if width_bytes <= 4 { Opcode::Divss } else { Opcode::Divsd };
    }
    match (width_bytes, signed) {
        (2, true) => Opcode::Idiv16,
        (2, false) => Opcode::Div16,
        (4, true) => Opcode::Idiv32,
        (4, false) => Opcode::Div32,
        (_, true) => Opcode::Idiv64,
        (_, false) => Opcode::Div64,
    }
}

pub fn and_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::And8,
        2 => Opcode::And16,
        4 => Opcode::And32,
        _ => Opcode::And64,
    }
}

pub fn or_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Or8,
        2 => Opcode::Or16,
        4 => Opcode::Or32,
        _ => Opcode::Or64,
    }
}

pub fn xor_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Xor8,
        2 => Opcode::Xor16,
        4 => Opcode::Xor32,
        _ => Opcode::Xor64,
    }
}

pub fn shl_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Shl8,
        2 => Opcode::Shl16,
        4 => Opcode::Shl32,
        _ => Opcode::Shl64,
    }
}

pub fn shr_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Shr8,
        2 => Opcode::Shr16,
        4 => Opcode::Shr32,
        _ => Opcode::Shr64,
    }
}

pub fn sar_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Sar8,
        2 => Opcode::Sar16,
        4 => Opcode::Sar32,
        _ => Opcode::Sar64,
    }
}

pub fn cmp_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Cmp8,
        2 => Opcode::Cmp16,
        4 => Opcode::Cmp32,
        _ => Opcode::Cmp64,
    }
}

pub fn ucomi_op(width_bytes: u32) -> Opcode {
    if width_bytes <= 4 {
        Opcode::Ucomiss
    } else {
        Opcode::Ucomisd
    }
}

pub fn not_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Not8,
        2 => Opcode::Not16,
        4 => Opcode::Not32,
        _ => Opcode::Not64,
    }
}

pub fn neg_op(width_bytes: u32) -> Opcode {
    match width_bytes {
        1 => Opcode::Neg8,
        2 => Opcode::Neg16,
        4 => Opcode::Neg32,
        _ => Opcode::Neg64,
    }
}

/// `ICmpOp` -> `Jcc` (spec §4.4's deferred-comparison table): signed
/// comparisons use the signed jump family, unsigned ones the unsigned
/// (`Ja/Jae/Jb/Jbe`) family.
pub fn jcc_for_icmp(op: statim_ir::ICmpOp) -> Opcode {
    use statim_ir::ICmpOp::*;
    match op {
        Eq => Opcode::Je,
        Ne => Opcode::Jne,
        Slt => Opcode::Jl,
        Sle => Opcode::Jle,
        Sgt => Opcode::Jg,
        Sge => Opcode::Jge,
        Ult => Opcode::Jb,
        Ule => Opcode::Jbe,
        Ugt => Opcode::Ja,
        Uge => Opcode::Jae,
    }
}

/// `FCmpOp` -> `Jcc`. `UCOMISS`/`UCOMISD` set flags the same way an unsigned
/// integer compare does, so both the ordered and unordered families map onto
/// the unsigned jump opcodes (spec §4.4's "choose... the signed/unsigned/
/// ordered `SETcc`").
pub fn jcc_for_fcmp(op: statim_ir::FCmpOp) -> Opcode {
    use statim_ir::FCmpOp::*;
    match op {
        Oeq | Ueq => Opcode::Je,
        One | Une => Opcode::Jne,
        Olt | Ult => Opcode::Jb,
        Ole | Ule => Opcode::Jbe,
        Ogt | Ugt => Opcode::Ja,
        Oge | Uge => Opcode::Jae,
    }
}

/// Maps a bare inline-asm mnemonic (spec §4.4) to the matching selector
/// opcode, when one exists; unrecognized mnemonics fall back to
/// [`crate::instr::MachInstruction::raw`] in the caller.
pub fn opcode_from_mnemonic(mnemonic: &str) -> Option<Opcode> {
    Some(match mnemonic.to_ascii_lowercase().as_str() {
        "nop" => Opcode::Nop,
        "jmp" => Opcode::Jmp,
        "ud2" => Opcode::Ud2,
        "cqto" | "cqo" => Opcode::Cqo,
        "call" | "callq" => Opcode::Call64,
        "ret" | "retq" => Opcode::Ret64,
        "movb" => Opcode::Mov8,
        "movw" => Opcode::Mov16,
        "movl" => Opcode::Mov32,
        "movq" | "mov" => Opcode::Mov64,
        "addb" => Opcode::Add8,
        "addw" => Opcode::Add16,
        "addl" => Opcode::Add32,
        "addq" | "add" => Opcode::Add64,
        "subb" => Opcode::Sub8,
        "subw" => Opcode::Sub16,
        "subl" => Opcode::Sub32,
        "subq" | "sub" => Opcode::Sub64,
        "andq" | "and" => Opcode::And64,
        "orq" | "or" => Opcode::Or64,
        "xorq" | "xor" => Opcode::Xor64,
        "shlq" | "shl" => Opcode::Shl64,
        "shrq" | "shr" => Opcode::Shr64,
        "sarq" | "sar" => Opcode::Sar64,
        "cmpq" | "cmp" => Opcode::Cmp64,
        "notq" | "not" => Opcode::Not64,
        "negq" | "neg" => Opcode::Neg64,
        "pushq" | "push" => Opcode::Push64,
        "popq" | "pop" => Opcode::Pop64,
        _ => return None,
    })
}

/// The `SETcc` opcode matching a `Jcc` opcode, used when a comparison's
/// result is materialized as a value rather than deferred into a branch.
pub fn setcc_for_jcc(op: Opcode) -> Opcode {
    use Opcode::*;
    match op {
        Je => Sete,
        Jne => Setne,
        Jl => Setl,
        Jle => Setle,
        Jg => Setg,
        Jge => Setge,
        Ja => Seta,
        Jae => Setae,
        Jb => Setb,
        Jbe => Setbe,
        other => panic!("setcc_for_jcc called on non-conditional opcode {other:?}"),
    }
}
