//! Qualified type references.

use crate::context::TypeId;
use serde::{Deserialize, Serialize};

/// Qualifier bitset. The language recognizes exactly one qualifier (`mut`),
/// but the bitset is kept open-ended rather than a plain bool so a future
/// qualifier wouldn't need to change every call site that threads a
/// `TypeUse` around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Qualifiers(u32);

impl Qualifiers {
    pub const MUT: Qualifiers = Qualifiers(1 << 0);

    pub fn empty() -> Self {
        Qualifiers(0)
    }

    pub fn contains(self, other: Qualifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Qualifiers) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for Qualifiers {
    type Output = Qualifiers;
    fn bitor(self, rhs: Qualifiers) -> Qualifiers {
        Qualifiers(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Qualifiers {
    fn bitor_assign(&mut self, rhs: Qualifiers) {
        self.0 |= rhs.0;
    }
}

/// The use of a type at some point in the AST or IR, with its qualifiers.
/// Hashed and compared by `(type identity, bitset)`, never structurally —
/// that's what makes interning worthwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeUse {
    ty: TypeId,
    quals: Qualifiers,
}

impl TypeUse {
    pub fn new(ty: TypeId, quals: Qualifiers) -> Self {
        Self { ty, quals }
    }

    pub fn unqualified(ty: TypeId) -> Self {
        Self::new(ty, Qualifiers::empty())
    }

    pub fn ty(&self) -> TypeId {
        self.ty
    }

    pub fn qualifiers(&self) -> Qualifiers {
        self.quals
    }

    pub fn is_qualified(&self) -> bool {
        !self.quals.is_empty()
    }

    pub fn is_mut(&self) -> bool {
        self.quals.contains(Qualifiers::MUT)
    }

    pub fn with_mut(mut self) -> Self {
        self.quals.insert(Qualifiers::MUT);
        self
    }

    /// Returns the same type with all qualifiers cleared. Used by the one
    /// explicit-cast path that is allowed to strip `mut`.
    pub fn without_qualifiers(self) -> Self {
        Self::unqualified(self.ty)
    }
}
