//! The statim type system: a closed set of type variants, an interning
//! context that hands out [`TypeId`]s for them, qualified references to
//! those ids ([`TypeUse`]), and the cast lattice that governs implicit and
//! explicit conversions between them.
//!
//! This crate is shared by every later stage — the AST carries `TypeUse`s
//! resolved against a single [`TypeContext`], the IR's instruction results
//! are typed the same way, and codegen asks the context for sizes and
//! alignments when laying out the stack and constant pool.

pub mod cast;
pub mod context;
pub mod layout;
pub mod ty;
pub mod type_use;

pub use cast::can_cast;
pub use context::{TypeContext, TypeId};
pub use ty::{EnumVariant, FloatWidth, IntWidth, Type, TypeKind};
pub use type_use::{Qualifiers, TypeUse};
