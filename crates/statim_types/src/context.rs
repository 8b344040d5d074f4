//! The interning arena every type flows through.
//!
//! Types are never compared or hashed structurally once they're in the
//! context: two requests for `*mut i32` always return the same [`TypeId`],
//! so callers can compare `TypeId`s directly instead of walking trees. This
//! is the arena-plus-index idiom used for the rest of the compiler's data
//! structures, applied to types instead of AST nodes.

use crate::ty::{EnumVariant, IntWidth, FloatWidth, Type, TypeKind};
use crate::type_use::TypeUse;
use hashbrown::HashMap;

/// An index into a [`TypeContext`]'s arena. Never valid across two different
/// contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    fn new(index: usize) -> Self {
        TypeId(index as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interning pools plus the arena backing every `TypeId`. Builtins are
/// created eagerly at construction so `builtin()` lookups never allocate;
/// named types (struct/enum/alias) are keyed by name and it is an error to
/// declare the same name twice.
pub struct TypeContext {
    arena: Vec<Type>,
    builtins: HashMap<BuiltinKey, TypeId>,
    arrays: HashMap<(TypeUse, u32), TypeId>,
    pointers: HashMap<TypeUse, TypeId>,
    /// Function types are never deduplicated — two structurally identical
    /// signatures from two different declarations stay distinct types, since
    /// each instance is anchored to a particular `FunctionDecl`.
    functions: Vec<TypeId>,
    aliases: HashMap<String, TypeId>,
    structs: HashMap<String, TypeId>,
    enums: HashMap<String, TypeId>,
    /// Names seen in type position before their declaration arrived. Each
    /// entry is the `TypeId` of the `NamedRef` placeholder itself, so
    /// resolution can patch the arena slot in place.
    deferred: HashMap<String, TypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BuiltinKey {
    Void,
    Bool,
    Char,
    Int(IntWidth),
    UInt(IntWidth),
    Float(FloatWidth),
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    pub fn new() -> Self {
        let mut ctx = TypeContext {
            arena: Vec::new(),
            builtins: HashMap::new(),
            arrays: HashMap::new(),
            pointers: HashMap::new(),
            functions: Vec::new(),
            aliases: HashMap::new(),
            structs: HashMap::new(),
            enums: HashMap::new(),
            deferred: HashMap::new(),
        };
        ctx.init_builtins();
        ctx
    }

    fn push(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId::new(self.arena.len());
        self.arena.push(Type { kind });
        id
    }

    fn init_builtins(&mut self) {
        let widths = [IntWidth::W8, IntWidth::W16, IntWidth::W32, IntWidth::W64];
        let fwidths = [FloatWidth::W32, FloatWidth::W64, FloatWidth::W128];

        let id = self.push(TypeKind::Void);
        self.builtins.insert(BuiltinKey::Void, id);
        let id = self.push(TypeKind::Bool);
        self.builtins.insert(BuiltinKey::Bool, id);
        let id = self.push(TypeKind::Char);
        self.builtins.insert(BuiltinKey::Char, id);

        for w in widths {
            let id = self.push(TypeKind::Int(w));
            self.builtins.insert(BuiltinKey::Int(w), id);
            let id = self.push(TypeKind::UInt(w));
            self.builtins.insert(BuiltinKey::UInt(w), id);
        }
        for w in fwidths {
            let id = self.push(TypeKind::Float(w));
            self.builtins.insert(BuiltinKey::Float(w), id);
        }
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.arena[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.get(id).kind
    }

    // -- builtins ---------------------------------------------------------

    pub fn void(&self) -> TypeId {
        self.builtins[&BuiltinKey::Void]
    }

    pub fn bool(&self) -> TypeId {
        self.builtins[&BuiltinKey::Bool]
    }

    pub fn char(&self) -> TypeId {
        self.builtins[&BuiltinKey::Char]
    }

    pub fn int(&self, width: IntWidth) -> TypeId {
        self.builtins[&BuiltinKey::Int(width)]
    }

    pub fn uint(&self, width: IntWidth) -> TypeId {
        self.builtins[&BuiltinKey::UInt(width)]
    }

    pub fn float(&self, width: FloatWidth) -> TypeId {
        self.builtins[&BuiltinKey::Float(width)]
    }

    // -- composite, interned ------------------------------------------------

    pub fn array(&mut self, element: TypeUse, size: u32) -> TypeId {
        if let Some(&id) = self.arrays.get(&(element, size)) {
            return id;
        }
        let id = self.push(TypeKind::Array { element, size });
        self.arrays.insert((element, size), id);
        id
    }

    pub fn pointer(&mut self, pointee: TypeUse) -> TypeId {
        if let Some(&id) = self.pointers.get(&pointee) {
            return id;
        }
        let id = self.push(TypeKind::Pointer { pointee });
        self.pointers.insert(pointee, id);
        id
    }

    /// Creates a fresh function type. Unlike the other composite pools this
    /// never deduplicates: every `FunctionDecl` gets its own `TypeId` even if
    /// its signature matches another declaration's exactly.
    pub fn function(&mut self, ret: TypeUse, params: Vec<TypeUse>) -> TypeId {
        let id = self.push(TypeKind::Function { ret, params });
        self.functions.push(id);
        id
    }

    // -- named, declared once -----------------------------------------------

    /// Declares a new alias. Returns `None` if the name is already taken by
    /// another alias, struct or enum.
    pub fn declare_alias(&mut self, name: impl Into<String>, underlying: TypeUse) -> Option<TypeId> {
        let name = name.into();
        if self.name_taken(&name) {
            return None;
        }
        let id = self.push(TypeKind::Alias { name: name.clone(), underlying });
        self.aliases.insert(name, id);
        Some(id)
    }

    /// Declares a struct with its fields already known. Use
    /// [`TypeContext::declare_struct_shell`] plus [`TypeContext::fill_struct_fields`]
    /// when the field types reference the struct itself (recursive pointers).
    pub fn declare_struct(&mut self, name: impl Into<String>, fields: Vec<TypeUse>) -> Option<TypeId> {
        let name = name.into();
        if self.name_taken(&name) {
            return None;
        }
        let id = self.push(TypeKind::Struct { name: name.clone(), fields });
        self.structs.insert(name, id);
        Some(id)
    }

    /// Reserves a struct's `TypeId` with no fields yet, so a pointer to the
    /// struct can be formed before its field list is known.
    pub fn declare_struct_shell(&mut self, name: impl Into<String>) -> Option<TypeId> {
        self.declare_struct(name, Vec::new())
    }

    pub fn fill_struct_fields(&mut self, id: TypeId, fields: Vec<TypeUse>) {
        match &mut self.arena[id.index()].kind {
            TypeKind::Struct { fields: slot, .. } => *slot = fields,
            _ => panic!("fill_struct_fields called on a non-struct TypeId"),
        }
    }

    pub fn declare_enum(&mut self, name: impl Into<String>, underlying: TypeId, variants: Vec<EnumVariant>) -> Option<TypeId> {
        let name = name.into();
        if self.name_taken(&name) {
            return None;
        }
        let id = self.push(TypeKind::Enum { name: name.clone(), underlying, variants });
        self.enums.insert(name, id);
        Some(id)
    }

    fn name_taken(&self, name: &str) -> bool {
        self.aliases.contains_key(name) || self.structs.contains_key(name) || self.enums.contains_key(name)
    }

    pub fn lookup_named(&self, name: &str) -> Option<TypeId> {
        self.aliases.get(name).or_else(|| self.structs.get(name)).or_else(|| self.enums.get(name)).copied()
    }

    /// Returns the `TypeId` of a `NamedRef` placeholder for `name`, creating
    /// one (unresolved) if this is the first time the name was mentioned in
    /// type position.
    pub fn named_ref(&mut self, name: impl Into<String>) -> TypeId {
        let name = name.into();
        if let Some(&id) = self.deferred.get(&name) {
            return id;
        }
        let id = self.push(TypeKind::NamedRef { name: name.clone(), resolved: None });
        self.deferred.insert(name, id);
        id
    }

    /// Patches every outstanding `NamedRef` whose name now has a declaration.
    /// Returns the names that are still unresolved, which is a hard error
    /// before lowering can start.
    pub fn resolve_deferred(&mut self) -> Vec<String> {
        let mut unresolved = Vec::new();
        for (name, placeholder) in self.deferred.clone() {
            let resolved = self.lookup_named(&name);
            match resolved {
                Some(target) => {
                    if let TypeKind::NamedRef { resolved, .. } = &mut self.arena[placeholder.index()].kind {
                        *resolved = Some(target);
                    }
                }
                None => unresolved.push(name),
            }
        }
        unresolved
    }

    /// Follows `Alias` and resolved `NamedRef` chains down to the first
    /// non-alias type. Used wherever the spec asks for comparison or
    /// operator applicability "through aliases".
    pub fn underlying(&self, id: TypeId) -> TypeId {
        match &self.get(id).kind {
            TypeKind::Alias { underlying, .. } => self.underlying(underlying.ty()),
            TypeKind::NamedRef { resolved: Some(target), .. } => self.underlying(*target),
            _ => id,
        }
    }

    /// Structural type equality with alias/named-ref look-through, ignoring
    /// qualifiers — the comparison spec §4.1 calls for when deciding whether
    /// two `TypeUse`s name "the same type".
    pub fn same_type(&self, a: TypeId, b: TypeId) -> bool {
        let (a, b) = (self.underlying(a), self.underlying(b));
        if a == b {
            return true;
        }
        match (&self.get(a).kind, &self.get(b).kind) {
            (TypeKind::Array { element: ea, size: sa }, TypeKind::Array { element: eb, size: sb }) => {
                sa == sb && self.same_type_use(*ea, *eb)
            }
            (TypeKind::Pointer { pointee: pa }, TypeKind::Pointer { pointee: pb }) => self.same_type_use(*pa, *pb),
            (TypeKind::Function { ret: ra, params: pa }, TypeKind::Function { ret: rb, params: pb }) => {
                pa.len() == pb.len()
                    && self.same_type_use(*ra, *rb)
                    && pa.iter().zip(pb.iter()).all(|(x, y)| self.same_type_use(*x, *y))
            }
            _ => false,
        }
    }

    pub fn same_type_use(&self, a: TypeUse, b: TypeUse) -> bool {
        self.same_type(a.ty(), b.ty())
    }

    /// Pretty-prints a `TypeUse`, resolving nested references through this
    /// context. Mirrors `TypeUse::to_string()` in the reference compiler,
    /// which could do this inline because its types carried direct pointers.
    pub fn display(&self, tu: TypeUse) -> String {
        let prefix = if tu.is_mut() { "mut " } else { "" };
        format!("{prefix}{}", self.display_type(tu.ty()))
    }

    fn display_type(&self, id: TypeId) -> String {
        match &self.get(id).kind {
            TypeKind::Void => "void".to_string(),
            TypeKind::Bool => "bool".to_string(),
            TypeKind::Char => "char".to_string(),
            TypeKind::Int(w) => format!("i{}", w.bits()),
            TypeKind::UInt(w) => format!("u{}", w.bits()),
            TypeKind::Float(w) => format!("f{}", w.bits()),
            TypeKind::Array { element, size } => format!("[{size}]{}", self.display(*element)),
            TypeKind::Pointer { pointee } => format!("*{}", self.display(*pointee)),
            TypeKind::Function { ret, params } => {
                let params = params.iter().map(|p| self.display(*p)).collect::<Vec<_>>().join(", ");
                format!("func({params}) -> {}", self.display(*ret))
            }
            TypeKind::Alias { name, .. } => name.clone(),
            TypeKind::Struct { name, .. } => name.clone(),
            TypeKind::Enum { name, .. } => name.clone(),
            TypeKind::NamedRef { name, .. } => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_singletons() {
        let ctx = TypeContext::new();
        assert_eq!(ctx.int(IntWidth::W32), ctx.int(IntWidth::W32));
        assert_ne!(ctx.int(IntWidth::W32), ctx.int(IntWidth::W64));
    }

    #[test]
    fn pointer_types_intern() {
        let mut ctx = TypeContext::new();
        let i32_use = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let p1 = ctx.pointer(i32_use);
        let p2 = ctx.pointer(i32_use);
        assert_eq!(p1, p2);
    }

    #[test]
    fn array_types_key_on_size() {
        let mut ctx = TypeContext::new();
        let i8_use = TypeUse::unqualified(ctx.int(IntWidth::W8));
        let a4 = ctx.array(i8_use, 4);
        let a8 = ctx.array(i8_use, 8);
        assert_ne!(a4, a8);
    }

    #[test]
    fn function_types_never_dedup() {
        let mut ctx = TypeContext::new();
        let void_use = TypeUse::unqualified(ctx.void());
        let f1 = ctx.function(void_use, Vec::new());
        let f2 = ctx.function(void_use, Vec::new());
        assert_ne!(f1, f2, "function types are a bag, not a pool");
    }

    #[test]
    fn duplicate_struct_name_rejected() {
        let mut ctx = TypeContext::new();
        assert!(ctx.declare_struct("Point", Vec::new()).is_some());
        assert!(ctx.declare_struct("Point", Vec::new()).is_none());
    }

    #[test]
    fn named_ref_resolves_once_declared() {
        let mut ctx = TypeContext::new();
        let r = ctx.named_ref("Point");
        assert!(ctx.resolve_deferred().contains(&"Point".to_string()));

        ctx.declare_struct("Point", Vec::new());
        let unresolved = ctx.resolve_deferred();
        assert!(unresolved.is_empty());
        match &ctx.kind(r) {
            TypeKind::NamedRef { resolved, .. } => assert!(resolved.is_some()),
            _ => panic!("expected NamedRef"),
        }
    }

    #[test]
    fn alias_looks_through_to_underlying() {
        let mut ctx = TypeContext::new();
        let i32_use = TypeUse::unqualified(ctx.int(IntWidth::W32));
        let alias = ctx.declare_alias("MyInt", i32_use).unwrap();
        assert!(ctx.same_type(alias, ctx.int(IntWidth::W32)));
    }
}
