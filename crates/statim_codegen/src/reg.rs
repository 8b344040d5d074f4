//! x86-64 physical registers (spec §3.4/§4.4).
//!
//! Transcribed from `original_source/spbe/include/x64/x64.hpp`'s `Register`
//! enum: the sixteen general-purpose registers plus `%rip`, and the sixteen
//! SSE registers used for floating-point values and arguments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum Register {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rdi,
    Rsi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    Rip,
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
    Xmm8,
    Xmm9,
    Xmm10,
    Xmm11,
    Xmm12,
    Xmm13,
    Xmm14,
    Xmm15,
}

/// The register file a virtual register is allocated from (spec §4.6:
/// "choose a free physical register matching the range's class").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegClass {
    Gpr,
    Sse,
}

impl Register {
    pub fn class(self) -> RegClass {
        if matches!(self, Register::Xmm0..=Register::Xmm15) {
            RegClass::Sse
        } else {
            RegClass::Gpr
        }
    }

    /// True for System V AMD64 caller-saved registers (spec §4.6's
    /// `x64::is_caller_saved`): every SSE register, plus the integer
    /// scratch/argument registers not preserved across a call. `R12`-`R15`
    /// are included because this allocator never preserves them in the
    /// prologue/epilogue (unlike `%rbx`, which is never handed out at all,
    /// see `ALLOCATABLE_GPR`) — the caller-save pass is what keeps a value
    /// live in one of them across a call instead.
    pub fn is_caller_saved(self) -> bool {
        use Register::*;
        matches!(self, Rax | Rcx | Rdx | Rsi | Rdi | R8 | R9 | R10 | R11 | R12 | R13 | R14 | R15) || self.class() == RegClass::Sse
    }

    pub fn is_callee_saved(self) -> bool {
        use Register::*;
        matches!(self, Rbx | Rbp | Rsp)
    }

    /// The integer argument-register order for the System V ABI (spec
    /// §4.4: "the first six arguments go into `%rdi,%rsi,%rdx,%rcx,%r8,%r9`").
    pub const INT_ARG_REGS: [Register; 6] = [Register::Rdi, Register::Rsi, Register::Rdx, Register::Rcx, Register::R8, Register::R9];

    /// The SSE argument-register order (spec §4.4: "or `%xmm0..%xmm5` per
    /// argument type").
    pub const SSE_ARG_REGS: [Register; 6] =
        [Register::Xmm0, Register::Xmm1, Register::Xmm2, Register::Xmm3, Register::Xmm4, Register::Xmm5];

    /// General-purpose registers the allocator may hand out, in the order it
    /// tries them. `%rsp`/`%rbp` are reserved for the frame, and `%rbx` is
    /// withheld too since nothing in the prologue/epilogue preserves it once
    /// allocated; `%rip` is never a storage location.
    pub const ALLOCATABLE_GPR: [Register; 13] = [
        Register::Rax,
        Register::Rcx,
        Register::Rdx,
        Register::Rsi,
        Register::Rdi,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    pub const ALLOCATABLE_SSE: [Register; 16] = [
        Register::Xmm0,
        Register::Xmm1,
        Register::Xmm2,
        Register::Xmm3,
        Register::Xmm4,
        Register::Xmm5,
        Register::Xmm6,
        Register::Xmm7,
        Register::Xmm8,
        Register::Xmm9,
        Register::Xmm10,
        Register::Xmm11,
        Register::Xmm12,
        Register::Xmm13,
        Register::Xmm14,
        Register::Xmm15,
    ];

    /// AT&T register name at a given operand width in bytes (1, 2, 4 or 8);
    /// SSE registers ignore `subreg` since they are always referenced whole.
    pub fn att_name(self, subreg: u32) -> String {
        use Register::*;
        if self.class() == RegClass::Sse {
            return format!("%{}", sse_name(self));
        }
        let name64 = gpr_name64(self);
        match (self, subreg) {
            (_, 8) => format!("%{name64}"),
            (Rax | Rbx | Rcx | Rdx | Rsi | Rdi | Rbp | Rsp, 4) => format!("%e{}", &name64[1..]),
            (Rax | Rbx | Rcx | Rdx | Rsi | Rdi | Rbp | Rsp, 2) => format!("%{}", &name64[1..]),
            (Rax | Rbx | Rcx | Rdx, 1) => format!("%{}l", &name64[1..2]),
            (Rsi | Rdi | Rbp | Rsp, 1) => format!("%{}l", &name64[1..]),
            (R8..=R15, 4) => format!("%{name64}d"),
            (R8..=R15, 2) => format!("%{name64}w"),
            (R8..=R15, 1) => format!("%{name64}b"),
            _ => format!("%{name64}"),
        }
    }
}

impl Register {
    /// Looks up a register by its bare AT&T name (no leading `%`), used by
    /// the inline-asm template parser (spec §4.4: "operands starting with
    /// `%` are parsed as registers").
    pub fn from_name(name: &str) -> Option<Register> {
        use Register::*;
        Some(match name {
            "rax" | "eax" | "ax" | "al" => Rax,
            "rbx" | "ebx" | "bx" | "bl" => Rbx,
            "rcx" | "ecx" | "cx" | "cl" => Rcx,
            "rdx" | "edx" | "dx" | "dl" => Rdx,
            "rdi" | "edi" | "di" | "dil" => Rdi,
            "rsi" | "esi" | "si" | "sil" => Rsi,
            "rbp" | "ebp" | "bp" | "bpl" => Rbp,
            "rsp" | "esp" | "sp" | "spl" => Rsp,
            "r8" | "r8d" | "r8w" | "r8b" => R8,
            "r9" | "r9d" | "r9w" | "r9b" => R9,
            "r10" | "r10d" | "r10w" | "r10b" => R10,
            "r11" | "r11d" | "r11w" | "r11b" => R11,
            "r12" | "r12d" | "r12w" | "r12b" => R12,
            "r13" | "r13d" | "r13w" | "r13b" => R13,
            "r14" | "r14d" | "r14w" | "r14b" => R14,
            "r15" | "r15d" | "r15w" | "r15b" => R15,
            "rip" => Rip,
            "xmm0" => Xmm0,
            "xmm1" => Xmm1,
            "xmm2" => Xmm2,
            "xmm3" => Xmm3,
            "xmm4" => Xmm4,
            "xmm5" => Xmm5,
            "xmm6" => Xmm6,
            "xmm7" => Xmm7,
            "xmm8" => Xmm8,
            "xmm9" => Xmm9,
            "xmm10" => Xmm10,
            "xmm11" => Xmm11,
            "xmm12" => Xmm12,
            "xmm13" => Xmm13,
            "xmm14" => Xmm14,
            "xmm15" => Xmm15,
            _ => return None,
        })
    }
}

impl Register {
    /// The subregister width (in bytes) implied by a bare AT&T register
    /// name, e.g. `"eax"` -> 4, `"al"` -> 1. Used alongside [`Register::from_name`]
    /// by the inline-asm template parser, since an unsuffixed mnemonic like
    /// `mov` picks its opcode width from the operand's register name rather
    /// than from the mnemonic text.
    pub fn width_from_name(name: &str) -> Option<u32> {
        Some(match name {
            "rax" | "rbx" | "rcx" | "rdx" | "rdi" | "rsi" | "rbp" | "rsp" | "rip" | "r8" | "r9" | "r10" | "r11" | "r12" | "r13" | "r14" | "r15" => 8,
            "eax" | "ebx" | "ecx" | "edx" | "edi" | "esi" | "ebp" | "esp" | "r8d" | "r9d" | "r10d" | "r11d" | "r12d" | "r13d" | "r14d" | "r15d" => 4,
            "ax" | "bx" | "cx" | "dx" | "di" | "si" | "bp" | "sp" | "r8w" | "r9w" | "r10w" | "r11w" | "r12w" | "r13w" | "r14w" | "r15w" => 2,
            "al" | "bl" | "cl" | "dl" | "dil" | "sil" | "bpl" | "spl" | "r8b" | "r9b" | "r10b" | "r11b" | "r12b" | "r13b" | "r14b" | "r15b" => 1,
            n if n.starts_with("xmm") => 8,
            _ => return None,
        })
    }
}

fn gpr_name64(r: Register) -> &'static str {
    use Register::*;
    match r {
        Rax => "rax",
        Rbx => "rbx",
        Rcx => "rcx",
        Rdx => "rdx",
        Rdi => "rdi",
        Rsi => "rsi",
        Rbp => "rbp",
        Rsp => "rsp",
        R8 => "r8",
        R9 => "r9",
        R10 => "r10",
        R11 => "r11",
        R12 => "r12",
        R13 => "r13",
        R14 => "r14",
        R15 => "r15",
        Rip => "rip",
        _ => unreachable!("gpr_name64 called on an SSE register"),
    }
}

fn sse_name(r: Register) -> &'static str {
    use Register::*;
    match r {
        Xmm0 => "xmm0",
        Xmm1 => "xmm1",
        Xmm2 => "xmm2",
        Xmm3 => "xmm3",
        Xmm4 => "xmm4",
        Xmm5 => "xmm5",
        Xmm6 => "xmm6",
        Xmm7 => "xmm7",
        Xmm8 => "xmm8",
        Xmm9 => "xmm9",
        Xmm10 => "xmm10",
        Xmm11 => "xmm11",
        Xmm12 => "xmm12",
        Xmm13 => "xmm13",
        Xmm14 => "xmm14",
        Xmm15 => "xmm15",
        _ => unreachable!("sse_name called on a GPR"),
    }
}

/// A register in the machine IR: either one of the fixed physical
/// [`Register`]s or a virtual register minted during instruction selection
/// and resolved by the allocator (spec §3.4: "reserved physical range
/// `[1, VirtualBarrier)` and virtual range `[VirtualBarrier, ∞)`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachRegister {
    Physical(Register),
    Virtual(u32),
}

impl MachRegister {
    pub fn as_physical(self) -> Option<Register> {
        match self {
            MachRegister::Physical(r) => Some(r),
            MachRegister::Virtual(_) => None,
        }
    }

    pub fn as_virtual(self) -> Option<u32> {
        match self {
            MachRegister::Virtual(v) => Some(v),
            MachRegister::Physical(_) => None,
        }
    }

    pub fn is_virtual(self) -> bool {
        matches!(self, MachRegister::Virtual(_))
    }
}
