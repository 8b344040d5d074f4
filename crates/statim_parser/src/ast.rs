//! The AST node set (spec §3.2): declarations, statements, and expressions,
//! plus the arena (`Ast`) that owns every node of one translation unit.
//!
//! Node shapes are grounded in `original_source/stmc/include/stmc/tree/
//! {Decl,Expr,Stmt}.hpp`: the same fields survive, but ownership moves from
//! `new`'d pointers threaded through a `Context` to indices into flat
//! per-kind `Vec`s owned by the `Ast`. Every non-owning edge the original
//! modeled with a raw pointer (a `DeclRef`'s resolved declaration, an
//! `Access`'s resolved field) becomes an `Option<DeclId>`/`Option<FieldId>`
//! set once symbol resolution runs.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use statim_common::SourceSpan;
use statim_types::TypeUse;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(DeclId);
arena_id!(StmtId);
arena_id!(ExprId);

/// Owns every declaration, statement and expression node of one
/// translation unit. Indices (`DeclId`/`StmtId`/`ExprId`) are the only way
/// other nodes refer to a node owned here; there is no way to free a single
/// node early, matching the "freed as a unit on translation-unit drop"
/// ownership rule.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Ast {
    decls: Vec<Decl>,
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn push_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn push_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.index()]
    }
}

// ---------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub enum Decl {
    TranslationUnit(TranslationUnitDecl),
    Load(LoadDecl),
    Variable(VariableDecl),
    Parameter(ParameterDecl),
    Function(FunctionDecl),
    Field(FieldDecl),
    Variant(VariantDecl),
    Alias(AliasDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
}

impl Decl {
    pub fn span(&self) -> &SourceSpan {
        match self {
            Decl::TranslationUnit(d) => &d.span,
            Decl::Load(d) => &d.span,
            Decl::Variable(d) => &d.span,
            Decl::Parameter(d) => &d.span,
            Decl::Function(d) => &d.span,
            Decl::Field(d) => &d.span,
            Decl::Variant(d) => &d.span,
            Decl::Alias(d) => &d.span,
            Decl::Struct(d) => &d.span,
            Decl::Enum(d) => &d.span,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::Variable(d) => Some(&d.name),
            Decl::Parameter(d) => Some(&d.name),
            Decl::Function(d) => Some(&d.name),
            Decl::Field(d) => Some(&d.name),
            Decl::Variant(d) => Some(&d.name),
            Decl::Alias(d) => Some(&d.name),
            Decl::Struct(d) => Some(&d.name),
            Decl::Enum(d) => Some(&d.name),
            Decl::TranslationUnit(_) | Decl::Load(_) => None,
        }
    }
}

/// The root-of-ownership container for one input source file. Owns every
/// declaration reachable from the translation unit, directly or
/// transitively, plus the type-interning context those declarations'
/// `TypeUse`s were minted from.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranslationUnitDecl {
    pub span: SourceSpan,
    pub file: String,
    pub decls: Vec<DeclId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadDecl {
    pub span: SourceSpan,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VariableDecl {
    pub span: SourceSpan,
    pub name: String,
    pub ty: TypeUse,
    pub init: Option<ExprId>,
    /// `true` for a file-scope (global) variable, `false` for a local
    /// declared by a `Decl` statement inside a function body.
    pub is_global: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterDecl {
    pub span: SourceSpan,
    pub name: String,
    pub ty: TypeUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    External,
    Internal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub span: SourceSpan,
    pub name: String,
    pub ret: TypeUse,
    pub params: Vec<DeclId>,
    pub body: Option<StmtId>,
    pub linkage: Linkage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FieldDecl {
    pub span: SourceSpan,
    pub name: String,
    pub ty: TypeUse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VariantDecl {
    pub span: SourceSpan,
    pub name: String,
    pub ty: TypeUse,
    pub value: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AliasDecl {
    pub span: SourceSpan,
    pub name: String,
    pub underlying: TypeUse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StructDecl {
    pub span: SourceSpan,
    pub name: String,
    pub fields: Vec<DeclId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnumDecl {
    pub span: SourceSpan,
    pub name: String,
    pub underlying: TypeUse,
    pub variants: Vec<DeclId>,
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub enum Stmt {
    Block(BlockStmt),
    Decl(DeclStmt),
    Ret(RetStmt),
    If(IfStmt),
    While(WhileStmt),
    Break(SourceSpan),
    Continue(SourceSpan),
    Asm(AsmStmt),
    Expr(ExprId),
}

impl Stmt {
    pub fn span<'a>(&'a self, ast: &'a Ast) -> SourceSpan {
        match self {
            Stmt::Block(s) => s.span.clone(),
            Stmt::Decl(s) => s.span.clone(),
            Stmt::Ret(s) => s.span.clone(),
            Stmt::If(s) => s.span.clone(),
            Stmt::While(s) => s.span.clone(),
            Stmt::Break(s) | Stmt::Continue(s) => s.clone(),
            Stmt::Asm(s) => s.span.clone(),
            Stmt::Expr(e) => ast.expr(*e).span().clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockStmt {
    pub span: SourceSpan,
    pub stmts: Vec<StmtId>,
}

/// A local-variable declaration statement; the declaration itself lives in
/// the `Ast`'s decl arena (as `Decl::Variable` with `is_global = false`) so
/// `DeclRef` resolution doesn't need a separate local-vs-global case split.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeclStmt {
    pub span: SourceSpan,
    pub decl: DeclId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetStmt {
    pub span: SourceSpan,
    pub value: Option<ExprId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IfStmt {
    pub span: SourceSpan,
    pub cond: ExprId,
    pub then_branch: StmtId,
    pub else_branch: Option<StmtId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WhileStmt {
    pub span: SourceSpan,
    pub cond: ExprId,
    pub body: StmtId,
}

/// One line of an inline-asm template paired with its constraint string, as
/// parsed by the instruction selector (spec §4.4's `select_inline_asm`
/// contract): `asm("template lines...", "constraints")(args...)`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AsmStmt {
    pub span: SourceSpan,
    pub template: String,
    pub constraints: String,
    pub args: Vec<ExprId>,
}

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Neg,
    Not,
    BitNot,
    AddressOf,
    Dereference,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Expr {
    pub span: SourceSpan,
    pub ty: TypeUse,
    pub kind: ExprKind,
}

impl Expr {
    pub fn span(&self) -> &SourceSpan {
        &self.span
    }

    /// §3.2 lvalue rule: a `DeclRef` to a variable/parameter, an `Access`, a
    /// `Subscript`, or a dereference.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::DeclRef(_) | ExprKind::Access(_) | ExprKind::Subscript(_) => true,
            ExprKind::UnaryOp(u) => u.op == UnaryOperator::Dereference,
            _ => false,
        }
    }

    /// §3.2 constantness rule.
    pub fn is_constant(&self, ast: &Ast) -> bool {
        match &self.kind {
            ExprKind::BoolLit(_)
            | ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::CharLit(_)
            | ExprKind::StringLit(_)
            | ExprKind::NullLit
            | ExprKind::Sizeof(_) => true,
            ExprKind::Cast(c) => ast.expr(c.operand).is_constant(ast),
            ExprKind::Paren(inner) => ast.expr(*inner).is_constant(ast),
            ExprKind::BinaryOp(b) => ast.expr(b.lhs).is_constant(ast) && ast.expr(b.rhs).is_constant(ast),
            ExprKind::UnaryOp(u) => u.op == UnaryOperator::AddressOf || ast.expr(u.operand).is_constant(ast),
            _ => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub enum ExprKind {
    BoolLit(bool),
    IntLit(u64),
    FloatLit(f64),
    CharLit(char),
    StringLit(String),
    NullLit,
    BinaryOp(BinaryOpExpr),
    UnaryOp(UnaryOpExpr),
    Cast(CastExpr),
    Paren(ExprId),
    Sizeof(TypeUse),
    Access(AccessExpr),
    Subscript(SubscriptExpr),
    DeclRef(DeclRefExpr),
    Call(CallExpr),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BinaryOpExpr {
    pub op: BinaryOperator,
    pub lhs: ExprId,
    pub rhs: ExprId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnaryOpExpr {
    pub op: UnaryOperator,
    pub operand: ExprId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CastExpr {
    pub target: TypeUse,
    pub operand: ExprId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessExpr {
    pub base: ExprId,
    pub field: String,
    /// Resolved by `statim_sema`; `None` until name resolution runs.
    pub resolved_field: Option<DeclId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptExpr {
    pub base: ExprId,
    pub index: ExprId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeclRefExpr {
    pub name: String,
    /// Resolved by `statim_sema`; `None` until name resolution runs.
    pub resolved: Option<DeclId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: ExprId,
    pub args: SmallVec<[ExprId; 4]>,
}
