//! Type-to-machine-operand queries the selector needs repeatedly: a value's
//! register class and its subregister width in bytes (spec §4.4's "opcode
//! suffix selection... pick a width based on the type size in bits").

use statim_types::{TypeContext, TypeKind, TypeUse};

use crate::reg::RegClass;

pub fn is_float(ctx: &TypeContext, ty: TypeUse) -> bool {
    matches!(ctx.kind(ctx.underlying(ty.ty())), TypeKind::Float(_))
}

pub fn reg_class(ctx: &TypeContext, ty: TypeUse) -> RegClass {
    if is_float(ctx, ty) {
        RegClass::Sse
    } else {
        RegClass::Gpr
    }
}

/// Operand width in bytes: 1, 2, 4 or 8. Pointers and function references
/// are machine-word sized; everything else not an integer or float builtin
/// (arrays, structs) never lives directly in a register, only behind a
/// pointer, so it defaults to the pointer width.
pub fn width_bytes(ctx: &TypeContext, ty: TypeUse) -> u32 {
    let id = ctx.underlying(ty.ty());
    match ctx.kind(id) {
        TypeKind::Bool => 1,
        TypeKind::Char => 1,
        TypeKind::Int(w) | TypeKind::UInt(w) => w.bits() / 8,
        TypeKind::Float(w) => w.bits() / 8,
        TypeKind::Enum { underlying, .. } => width_bytes(ctx, TypeUse::unqualified(*underlying)),
        _ => statim_types::layout::POINTER_BITS / 8,
    }
}

pub fn is_signed(ctx: &TypeContext, ty: TypeUse) -> bool {
    let id = ctx.underlying(ty.ty());
    matches!(ctx.kind(id), TypeKind::Bool | TypeKind::Char | TypeKind::Int(_))
}
