//! Size, alignment and offset computation over interned types.
//!
//! Grounded in `original_source/spbe/source/target/Target.cpp`'s
//! `get_type_size`/`get_type_align`/`get_field_offset`/`get_element_offset`:
//! pointers are a fixed machine width, arrays are `size(element) * length`,
//! structs are laid out in declaration order with each field aligned to its
//! own natural alignment and the struct's own alignment the max of its
//! fields'. This lives in `statim_types` rather than a target-specific crate
//! because every consumer (IR lowering's default load/store alignment,
//! codegen's stack frame and struct-field offsets) only ever needs type
//! information to compute it — there is no second x86-64 target in this
//! compiler for the computation to vary across.

use crate::context::{TypeContext, TypeId};
use crate::ty::TypeKind;

/// Pointer width for the only target this compiler emits for (x86-64).
pub const POINTER_BITS: u32 = 64;

pub fn align_to(offset: u32, align: u32) -> u32 {
    if align <= 1 {
        return offset;
    }
    (offset + align - 1) & !(align - 1)
}

pub fn size_of(ctx: &TypeContext, id: TypeId) -> u32 {
    match ctx.kind(id) {
        TypeKind::Void => 0,
        TypeKind::Bool => 1,
        TypeKind::Char => 1,
        TypeKind::Int(w) | TypeKind::UInt(w) => w.bits() / 8,
        TypeKind::Float(w) => w.bits() / 8,
        TypeKind::Pointer { .. } => POINTER_BITS / 8,
        TypeKind::Function { .. } => POINTER_BITS / 8,
        TypeKind::Array { element, size } => size_of(ctx, element.ty()) * size,
        TypeKind::Struct { fields, .. } => {
            let mut offset = 0u32;
            for f in fields {
                offset = align_to(offset, align_of(ctx, f.ty()));
                offset += size_of(ctx, f.ty());
            }
            align_to(offset, align_of(ctx, id))
        }
        TypeKind::Enum { underlying, .. } => size_of(ctx, *underlying),
        TypeKind::Alias { underlying, .. } => size_of(ctx, underlying.ty()),
        TypeKind::NamedRef { resolved: Some(target), .. } => size_of(ctx, *target),
        TypeKind::NamedRef { resolved: None, name } => {
            panic!("size_of: unresolved named type '{name}' reached codegen")
        }
    }
}

pub fn align_of(ctx: &TypeContext, id: TypeId) -> u32 {
    match ctx.kind(id) {
        TypeKind::Void => 1,
        TypeKind::Pointer { .. } | TypeKind::Function { .. } => POINTER_BITS / 8,
        TypeKind::Array { element, .. } => align_of(ctx, element.ty()),
        TypeKind::Struct { fields, .. } => fields.iter().map(|f| align_of(ctx, f.ty())).max().unwrap_or(1),
        TypeKind::Enum { underlying, .. } => align_of(ctx, *underlying),
        TypeKind::Alias { underlying, .. } => align_of(ctx, underlying.ty()),
        TypeKind::NamedRef { resolved: Some(target), .. } => align_of(ctx, *target),
        TypeKind::NamedRef { resolved: None, name } => {
            panic!("align_of: unresolved named type '{name}' reached codegen")
        }
        TypeKind::Bool | TypeKind::Char | TypeKind::Int(_) | TypeKind::UInt(_) | TypeKind::Float(_) => size_of(ctx, id),
    }
}

/// Byte offset of field `idx` within a struct `TypeId`.
pub fn field_offset(ctx: &TypeContext, struct_id: TypeId, idx: usize) -> u32 {
    let TypeKind::Struct { fields, .. } = ctx.kind(struct_id) else {
        panic!("field_offset called on a non-struct type")
    };
    let mut offset = 0u32;
    for f in &fields[..idx] {
        offset = align_to(offset, align_of(ctx, f.ty()));
        offset += size_of(ctx, f.ty());
    }
    align_to(offset, align_of(ctx, fields[idx].ty()))
}

/// Byte offset of element `idx` within an array or the pointee of a pointer
/// `TypeId` (`get_element_offset`/`get_pointee_offset` in the reference
/// implementation collapse to the same computation).
pub fn element_offset(ctx: &TypeContext, id: TypeId, idx: u32) -> u32 {
    let element = match ctx.kind(id) {
        TypeKind::Array { element, .. } => element.ty(),
        TypeKind::Pointer { pointee } => pointee.ty(),
        _ => panic!("element_offset called on a non-array, non-pointer type"),
    };
    size_of(ctx, element) * idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TypeContext;
    use crate::ty::IntWidth;
    use crate::type_use::TypeUse;

    #[test]
    fn struct_fields_align_and_pack() {
        let mut ctx = TypeContext::new();
        let i8_use = TypeUse::unqualified(ctx.int(IntWidth::W8));
        let i32_use = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let s = ctx.declare_struct("S", vec![i8_use, i32_use]).unwrap();
        assert_eq!(align_of(&ctx, s), 4);
        assert_eq!(field_offset(&ctx, s, 0), 0);
        assert_eq!(field_offset(&ctx, s, 1), 4);
        assert_eq!(size_of(&ctx, s), 8);
    }

    #[test]
    fn array_size_is_element_times_length() {
        let mut ctx = TypeContext::new();
        let i32_use = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let arr = ctx.array(i32_use, 4);
        assert_eq!(size_of(&ctx, arr), 16);
        assert_eq!(align_of(&ctx, arr), 4);
        assert_eq!(element_offset(&ctx, arr, 2), 8);
    }

    #[test]
    fn pointer_is_machine_word_sized() {
        let mut ctx = TypeContext::new();
        let i8_use = TypeUse::unqualified(ctx.int(IntWidth::W8));
        let p = ctx.pointer(i8_use);
        assert_eq!(size_of(&ctx, p), 8);
        assert_eq!(align_of(&ctx, p), 8);
    }
}
