//! The closed set of type variants recognized by the compiler.
//!
//! `Type` values never appear on their own in the AST or IR; every reference
//! to a type goes through a [`crate::TypeId`] handle minted by a
//! [`crate::TypeContext`], or through a [`crate::TypeUse`] when the reference
//! may carry qualifiers. This mirrors the arena-plus-index discipline used
//! for the rest of the tree: no type is ever heap-allocated on its own and
//! then linked by raw pointer.

use crate::context::TypeId;
use crate::type_use::TypeUse;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatWidth {
    W32,
    W64,
    W128,
}

impl FloatWidth {
    pub fn bits(self) -> u32 {
        match self {
            FloatWidth::W32 => 32,
            FloatWidth::W64 => 64,
            FloatWidth::W128 => 128,
        }
    }
}

/// A single enum variant's name and constant value, carried by [`Type::Enum`]
/// so the type itself is enough to describe the enumeration without reaching
/// back into the AST declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

/// A field of a struct type: just the type, since the field's name is only
/// needed when resolving an `Access` expression and is looked up from the
/// owning `StructDecl` rather than duplicated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Void,
    Bool,
    Char,
    Int(IntWidth),
    UInt(IntWidth),
    Float(FloatWidth),
    Array { element: TypeUse, size: u32 },
    Pointer { pointee: TypeUse },
    Function { ret: TypeUse, params: Vec<TypeUse> },
    Alias { name: String, underlying: TypeUse },
    Struct { name: String, fields: Vec<TypeUse> },
    Enum { name: String, underlying: TypeId, variants: Vec<EnumVariant> },
    /// An identifier seen in type position before its definition arrived.
    /// `resolved` starts `None` and is filled in place once the declaring
    /// type is found; every `NamedRef` must be resolved before lowering.
    NamedRef { name: String, resolved: Option<TypeId> },
}

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Bool | TypeKind::Char | TypeKind::Int(_) | TypeKind::UInt(_))
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Bool | TypeKind::Char | TypeKind::Int(_))
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self.kind, TypeKind::UInt(_))
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self.kind, TypeKind::Float(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, TypeKind::Function { .. })
    }

    pub fn is_named_ref(&self) -> bool {
        matches!(self.kind, TypeKind::NamedRef { .. })
    }

    /// Integer bit width for integer builtins (`Bool`/`Char` count as 1/8).
    pub fn integer_bits(&self) -> Option<u32> {
        match &self.kind {
            TypeKind::Bool => Some(1),
            TypeKind::Char => Some(8),
            TypeKind::Int(w) | TypeKind::UInt(w) => Some(w.bits()),
            _ => None,
        }
    }
}

// `TypeKind` has no `Display` impl of its own: printing a `Array`, `Pointer`
// or `Function` variant means resolving the `TypeUse`s it holds, which needs
// a `TypeContext` to look the referenced `TypeId`s back up. See
// `TypeContext::display` for the real pretty-printer.
