//! The cast lattice: which conversions are allowed, and which of those are
//! allowed to happen implicitly (without a source-level `cast` expression).

use crate::context::TypeContext;
use crate::ty::TypeKind;
use crate::type_use::TypeUse;

/// Coarse classification used to index the lattice table. Booleans are
/// folded into `Integer` (the table treats them identically); aliases are
/// never classified directly, callers resolve through `underlying` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Integer { bits: u32, signed: bool },
    Float { bits: u32 },
    Pointer,
    Array,
    Struct,
    Enum { underlying_bits: u32 },
    Void,
    Other,
}

fn classify(ctx: &TypeContext, tu: TypeUse) -> Class {
    let id = ctx.underlying(tu.ty());
    match ctx.kind(id) {
        TypeKind::Void => Class::Void,
        TypeKind::Bool => Class::Integer { bits: 1, signed: true },
        TypeKind::Char => Class::Integer { bits: 8, signed: true },
        TypeKind::Int(w) => Class::Integer { bits: w.bits(), signed: true },
        TypeKind::UInt(w) => Class::Integer { bits: w.bits(), signed: false },
        TypeKind::Float(w) => Class::Float { bits: w.bits() },
        TypeKind::Pointer { .. } => Class::Pointer,
        TypeKind::Array { .. } => Class::Array,
        TypeKind::Struct { .. } => Class::Struct,
        TypeKind::Enum { underlying, .. } => {
            let bits = match ctx.kind(*underlying) {
                TypeKind::Int(w) | TypeKind::UInt(w) => w.bits(),
                _ => 32,
            };
            Class::Enum { underlying_bits: bits }
        }
        // `Alias` can't appear here: `underlying` already looked through it.
        // A `NamedRef` that reached here is unresolved, which is a bug in an
        // earlier pass, not something the cast lattice should special-case.
        TypeKind::Alias { .. } | TypeKind::NamedRef { .. } | TypeKind::Function { .. } => Class::Other,
    }
}

fn is_void_pointer(ctx: &TypeContext, tu: TypeUse) -> bool {
    let id = ctx.underlying(tu.ty());
    matches!(ctx.kind(id), TypeKind::Pointer { pointee } if matches!(ctx.kind(ctx.underlying(pointee.ty())), TypeKind::Void))
}

/// Returns whether `from` can be cast to `to`. `implicit` selects whether the
/// caller is asking about an implicit (no `cast` keyword) conversion or an
/// explicit one; every implicit conversion is also a valid explicit one.
pub fn can_cast(ctx: &TypeContext, from: TypeUse, to: TypeUse, implicit: bool) -> bool {
    if ctx.same_type_use(from, to) {
        return true;
    }

    let from_class = classify(ctx, from);
    let to_class = classify(ctx, to);

    match (from_class, to_class) {
        (Class::Integer { bits: fb, signed: fs }, Class::Integer { bits: tb, signed: ts }) => {
            if !implicit {
                return true;
            }
            (fb == tb && fs == ts) || (tb > fb && fs == ts)
        }
        (Class::Integer { .. }, Class::Float { .. }) => !implicit,
        (Class::Integer { .. }, Class::Pointer) => !implicit,

        (Class::Float { .. }, Class::Integer { .. }) => !implicit,
        (Class::Float { bits: fb }, Class::Float { bits: tb }) => {
            if !implicit {
                return true;
            }
            tb >= fb
        }

        (Class::Pointer, Class::Integer { .. }) => !implicit,
        (Class::Pointer, Class::Pointer) => {
            if !implicit {
                return true;
            }
            is_void_pointer(ctx, from) || is_void_pointer(ctx, to)
        }

        (Class::Array, Class::Pointer) => pointee_matches_array(ctx, from, to),

        (Class::Enum { .. }, Class::Integer { .. }) => true,

        _ => false,
    }
}

fn pointee_matches_array(ctx: &TypeContext, from: TypeUse, to: TypeUse) -> bool {
    let from_id = ctx.underlying(from.ty());
    let to_id = ctx.underlying(to.ty());
    let (TypeKind::Array { element, .. }, TypeKind::Pointer { pointee }) = (ctx.kind(from_id), ctx.kind(to_id)) else {
        return false;
    };
    ctx.same_type_use(*element, *pointee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TypeContext;
    use crate::ty::IntWidth;

    #[test]
    fn same_width_same_sign_casts_implicitly() {
        let ctx = TypeContext::new();
        let a = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let b = TypeUse::unqualified(ctx.int(IntWidth::W32));
        assert!(can_cast(&ctx, a, b, true));
    }

    #[test]
    fn narrowing_int_requires_explicit_cast() {
        let ctx = TypeContext::new();
        let wide = TypeUse::unqualified(ctx.int(IntWidth::W64));
        let narrow = TypeUse::unqualified(ctx.int(IntWidth::W32));
        assert!(!can_cast(&ctx, wide, narrow, true));
        assert!(can_cast(&ctx, wide, narrow, false));
    }

    #[test]
    fn widening_same_sign_is_implicit() {
        let ctx = TypeContext::new();
        let narrow = TypeUse::unqualified(ctx.uint(IntWidth::W8));
        let wide = TypeUse::unqualified(ctx.uint(IntWidth::W32));
        assert!(can_cast(&ctx, narrow, wide, true));
    }

    #[test]
    fn sign_change_is_never_implicit() {
        let ctx = TypeContext::new();
        let signed = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let unsigned = TypeUse::unqualified(ctx.uint(IntWidth::W32));
        assert!(!can_cast(&ctx, signed, unsigned, true));
        assert!(can_cast(&ctx, signed, unsigned, false));
    }

    #[test]
    fn int_to_float_is_never_implicit() {
        let ctx = TypeContext::new();
        let i = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let f = TypeUse::unqualified(ctx.float(crate::ty::FloatWidth::W32));
        assert!(!can_cast(&ctx, i, f, true));
        assert!(can_cast(&ctx, i, f, false));
    }

    #[test]
    fn void_pointer_converts_implicitly_both_ways() {
        let mut ctx = TypeContext::new();
        let i32_use = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let void_use = TypeUse::unqualified(ctx.void());
        let int_ptr = TypeUse::unqualified(ctx.pointer(i32_use));
        let void_ptr = TypeUse::unqualified(ctx.pointer(void_use));
        assert!(can_cast(&ctx, void_ptr, int_ptr, true));
        assert!(can_cast(&ctx, int_ptr, void_ptr, true));
    }

    #[test]
    fn unrelated_pointers_need_explicit_cast() {
        let mut ctx = TypeContext::new();
        let i32_use = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let i64_use = TypeUse::unqualified(ctx.int(IntWidth::W64));
        let p1 = TypeUse::unqualified(ctx.pointer(i32_use));
        let p2 = TypeUse::unqualified(ctx.pointer(i64_use));
        assert!(!can_cast(&ctx, p1, p2, true));
        assert!(can_cast(&ctx, p1, p2, false));
    }

    #[test]
    fn array_decays_to_matching_pointer() {
        let mut ctx = TypeContext::new();
        let i8_use = TypeUse::unqualified(ctx.int(IntWidth::W8));
        let arr = TypeUse::unqualified(ctx.array(i8_use, 16));
        let ptr = TypeUse::unqualified(ctx.pointer(i8_use));
        assert!(can_cast(&ctx, arr, ptr, true));
    }

    #[test]
    fn struct_to_int_is_never_allowed() {
        let mut ctx = TypeContext::new();
        let s = ctx.declare_struct("Point", Vec::new()).unwrap();
        let s_use = TypeUse::unqualified(s);
        let i = TypeUse::unqualified(ctx.int(IntWidth::W32));
        assert!(!can_cast(&ctx, s_use, i, false));
    }
}
