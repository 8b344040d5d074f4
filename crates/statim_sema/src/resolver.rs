//! Single-pass name resolution and bottom-up type checking.
//!
//! Registers every top-level function/global/struct name, then walks each
//! function body resolving `DeclRef`/`Access` against the scope stack and
//! the struct field lists, filling in every `Expr::ty` along the way. This
//! is the minimum the lowerer's precondition (spec §4.2) needs — not a full
//! flow analysis, mirroring the reference compiler's stated split between
//! its semantic-analysis stage and its lowering stage.

use hashbrown::HashMap;
use statim_common::SourceSpan;
use statim_parser::{Ast, BinaryOperator, Decl, DeclId, ExprId, ExprKind, Stmt, StmtId, UnaryOperator};
use statim_types::{can_cast, IntWidth, TypeContext, TypeKind, TypeUse};

use crate::error::{SemaError, SemaResult};
use crate::scope::ScopeStack;

pub struct Sema<'a> {
    ast: &'a mut Ast,
    types: &'a mut TypeContext,
    scopes: ScopeStack,
    structs: HashMap<String, DeclId>,
    loop_depth: u32,
}

impl<'a> Sema<'a> {
    pub fn new(ast: &'a mut Ast, types: &'a mut TypeContext) -> Self {
        Self { ast, types, scopes: ScopeStack::new(), structs: HashMap::new(), loop_depth: 0 }
    }

    /// Resolves and type-checks the translation unit rooted at `root`. `root`
    /// must be the `DeclId` of its `TranslationUnitDecl`, as returned by
    /// `statim_parser::Parser::parse_translation_unit`.
    pub fn check(&mut self, root: DeclId) -> SemaResult<()> {
        let top_decls = match self.ast.decl(root) {
            Decl::TranslationUnit(tu) => tu.decls.clone(),
            _ => panic!("Sema::check must be called with the TranslationUnitDecl's id"),
        };
        log::debug!("resolving {} top-level declaration(s)", top_decls.len());

        for &id in &top_decls {
            match self.ast.decl(id) {
                Decl::Function(f) => {
                    if self.scopes.lookup(&f.name).is_some() {
                        return Err(SemaError::DuplicateFunction { name: f.name.clone(), span: f.span.clone() });
                    }
                    self.scopes.define(f.name.clone(), id);
                }
                Decl::Variable(v) if v.is_global => self.scopes.define(v.name.clone(), id),
                Decl::Struct(s) => {
                    self.structs.insert(s.name.clone(), id);
                }
                _ => {}
            }
        }

        for &id in &top_decls {
            let global = match self.ast.decl(id) {
                Decl::Variable(v) if v.is_global => Some((v.ty, v.init, v.span.clone())),
                _ => None,
            };
            if let Some((ty, Some(init), span)) = global {
                let init_ty = self.resolve_expr(init)?;
                self.expect_assignable(ty, init_ty, &span)?;
            }
        }

        for &id in &top_decls {
            if matches!(self.ast.decl(id), Decl::Function(_)) {
                self.check_function(id)?;
            }
        }

        Ok(())
    }

    fn check_function(&mut self, id: DeclId) -> SemaResult<()> {
        let (name, ret, params, body, span) = match self.ast.decl(id) {
            Decl::Function(f) => (f.name.clone(), f.ret, f.params.clone(), f.body, f.span.clone()),
            _ => unreachable!(),
        };

        if name == "main" {
            let underlying = self.types.underlying(ret.ty());
            let is_i64 = matches!(self.types.kind(underlying), TypeKind::Int(IntWidth::W64));
            if !is_i64 {
                return Err(SemaError::InvalidMainSignature { span: span.clone() });
            }
        }

        let Some(body) = body else {
            return Ok(()); // extern declaration; nothing further to check
        };

        self.scopes.push();
        for &p_id in &params {
            if let Decl::Parameter(p) = self.ast.decl(p_id) {
                self.scopes.define(p.name.clone(), p_id);
            }
        }
        self.check_stmt(body, ret)?;
        self.scopes.pop();

        if !self.is_void(ret) && !self.ends_in_return(body) {
            return Err(SemaError::MissingReturn { name, span });
        }
        Ok(())
    }

    /// Conservative trailing-return check per spec §4.2: only the
    /// textually-last statement is inspected, not every control-flow path.
    fn ends_in_return(&self, id: StmtId) -> bool {
        match self.ast.stmt(id) {
            Stmt::Ret(_) => true,
            Stmt::Block(b) => b.stmts.last().is_some_and(|&last| self.ends_in_return(last)),
            _ => false,
        }
    }

    fn is_void(&self, ty: TypeUse) -> bool {
        matches!(self.types.kind(self.types.underlying(ty.ty())), TypeKind::Void)
    }

    // -- statements ----------------------------------------------------

    fn check_stmt(&mut self, id: StmtId, ret_ty: TypeUse) -> SemaResult<()> {
        let span = self.ast.stmt(id).span(self.ast);

        enum Shape {
            Block(Vec<StmtId>),
            Decl(DeclId),
            Ret(Option<ExprId>),
            If { cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId> },
            While { cond: ExprId, body: StmtId },
            Break,
            Continue,
            Asm(Vec<ExprId>),
            Expr(ExprId),
        }

        let shape = match self.ast.stmt(id) {
            Stmt::Block(b) => Shape::Block(b.stmts.clone()),
            Stmt::Decl(d) => Shape::Decl(d.decl),
            Stmt::Ret(r) => Shape::Ret(r.value),
            Stmt::If(s) => Shape::If { cond: s.cond, then_branch: s.then_branch, else_branch: s.else_branch },
            Stmt::While(s) => Shape::While { cond: s.cond, body: s.body },
            Stmt::Break(_) => Shape::Break,
            Stmt::Continue(_) => Shape::Continue,
            Stmt::Asm(s) => Shape::Asm(s.args.clone()),
            Stmt::Expr(e) => Shape::Expr(*e),
        };

        match shape {
            Shape::Block(stmts) => {
                self.scopes.push();
                for s in stmts {
                    self.check_stmt(s, ret_ty)?;
                }
                self.scopes.pop();
            }
            Shape::Decl(decl_id) => {
                let (name, ty, init) = match self.ast.decl(decl_id) {
                    Decl::Variable(v) => (v.name.clone(), v.ty, v.init),
                    _ => unreachable!(),
                };
                if let Some(init_id) = init {
                    let init_ty = self.resolve_expr(init_id)?;
                    self.expect_assignable(ty, init_ty, &span)?;
                }
                self.scopes.define(name, decl_id);
            }
            Shape::Ret(value) => match value {
                Some(e) => {
                    let ty = self.resolve_expr(e)?;
                    self.expect_assignable(ret_ty, ty, &span)?;
                }
                None if !self.is_void(ret_ty) => {
                    return Err(SemaError::TypeMismatch {
                        expected: self.types.display(ret_ty),
                        found: self.types.display(TypeUse::unqualified(self.types.void())),
                        span,
                    });
                }
                None => {}
            },
            Shape::If { cond, then_branch, else_branch } => {
                let cty = self.resolve_expr(cond)?;
                self.expect_scalar(cty, &span)?;
                self.check_stmt(then_branch, ret_ty)?;
                if let Some(e) = else_branch {
                    self.check_stmt(e, ret_ty)?;
                }
            }
            Shape::While { cond, body } => {
                let cty = self.resolve_expr(cond)?;
                self.expect_scalar(cty, &span)?;
                self.loop_depth += 1;
                self.check_stmt(body, ret_ty)?;
                self.loop_depth -= 1;
            }
            Shape::Break => {
                if self.loop_depth == 0 {
                    return Err(SemaError::BreakOutsideLoop { span });
                }
            }
            Shape::Continue => {
                if self.loop_depth == 0 {
                    return Err(SemaError::ContinueOutsideLoop { span });
                }
            }
            Shape::Asm(args) => {
                for a in args {
                    self.resolve_expr(a)?;
                }
            }
            Shape::Expr(e) => {
                self.resolve_expr(e)?;
            }
        }
        Ok(())
    }

    // -- expressions -----------------------------------------------------

    fn resolve_expr(&mut self, id: ExprId) -> SemaResult<TypeUse> {
        let span = self.ast.expr(id).span().clone();
        let existing_ty = self.ast.expr(id).ty;

        enum Shape {
            Literal,
            Binary { op: BinaryOperator, lhs: ExprId, rhs: ExprId },
            Unary { op: UnaryOperator, operand: ExprId },
            Cast { target: TypeUse, operand: ExprId },
            Paren(ExprId),
            Access { base: ExprId, field: String },
            Subscript { base: ExprId, index: ExprId },
            DeclRef(String),
            Call { callee: ExprId, args: Vec<ExprId> },
        }

        let shape = match &self.ast.expr(id).kind {
            ExprKind::BoolLit(_)
            | ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::CharLit(_)
            | ExprKind::StringLit(_)
            | ExprKind::NullLit
            | ExprKind::Sizeof(_) => Shape::Literal,
            ExprKind::BinaryOp(b) => Shape::Binary { op: b.op, lhs: b.lhs, rhs: b.rhs },
            ExprKind::UnaryOp(u) => Shape::Unary { op: u.op, operand: u.operand },
            ExprKind::Cast(c) => Shape::Cast { target: c.target, operand: c.operand },
            ExprKind::Paren(inner) => Shape::Paren(*inner),
            ExprKind::Access(a) => Shape::Access { base: a.base, field: a.field.clone() },
            ExprKind::Subscript(s) => Shape::Subscript { base: s.base, index: s.index },
            ExprKind::DeclRef(d) => Shape::DeclRef(d.name.clone()),
            ExprKind::Call(c) => Shape::Call { callee: c.callee, args: c.args.to_vec() },
        };

        let ty = match shape {
            Shape::Literal => existing_ty,
            Shape::Binary { op, lhs, rhs } => self.check_binary(op, lhs, rhs, &span)?,
            Shape::Unary { op, operand } => self.check_unary(op, operand, &span)?,
            Shape::Cast { target, operand } => {
                let oty = self.resolve_expr(operand)?;
                if !can_cast(self.types, oty, target, false) {
                    return Err(SemaError::TypeMismatch {
                        expected: self.types.display(target),
                        found: self.types.display(oty),
                        span,
                    });
                }
                target
            }
            Shape::Paren(inner) => self.resolve_expr(inner)?,
            Shape::Access { base, field } => self.check_access(id, base, &field, &span)?,
            Shape::Subscript { base, index } => self.check_subscript(base, index, &span)?,
            Shape::DeclRef(name) => self.check_decl_ref(id, &name, &span)?,
            Shape::Call { callee, args } => self.check_call(callee, &args, &span)?,
        };

        self.ast.expr_mut(id).ty = ty;
        Ok(ty)
    }

    fn check_binary(&mut self, op: BinaryOperator, lhs: ExprId, rhs: ExprId, span: &SourceSpan) -> SemaResult<TypeUse> {
        let lty = self.resolve_expr(lhs)?;
        let rty = self.resolve_expr(rhs)?;

        if op == BinaryOperator::Assign {
            if !self.ast.expr(lhs).is_lvalue() {
                return Err(SemaError::NotAnLvalue { span: span.clone() });
            }
            self.expect_assignable(lty, rty, span)?;
            return Ok(lty);
        }

        use BinaryOperator::*;
        match op {
            Add | Sub | Mul | Div | Rem | And | Or | Xor | Shl | Shr => {
                self.expect_scalar(lty, span)?;
                self.expect_scalar(rty, span)?;
                if can_cast(self.types, rty, lty, true) {
                    Ok(lty)
                } else if can_cast(self.types, lty, rty, true) {
                    Ok(rty)
                } else {
                    Err(SemaError::TypeMismatch { expected: self.types.display(lty), found: self.types.display(rty), span: span.clone() })
                }
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                self.expect_scalar(lty, span)?;
                self.expect_scalar(rty, span)?;
                if !(can_cast(self.types, rty, lty, true) || can_cast(self.types, lty, rty, true)) {
                    return Err(SemaError::TypeMismatch { expected: self.types.display(lty), found: self.types.display(rty), span: span.clone() });
                }
                Ok(TypeUse::unqualified(self.types.bool()))
            }
            LogicalAnd | LogicalOr => {
                self.expect_scalar(lty, span)?;
                self.expect_scalar(rty, span)?;
                Ok(TypeUse::unqualified(self.types.bool()))
            }
            Assign => unreachable!("handled above"),
        }
    }

    fn check_unary(&mut self, op: UnaryOperator, operand: ExprId, span: &SourceSpan) -> SemaResult<TypeUse> {
        let oty = self.resolve_expr(operand)?;
        match op {
            UnaryOperator::Neg | UnaryOperator::Not | UnaryOperator::BitNot => {
                self.expect_scalar(oty, span)?;
                Ok(oty)
            }
            UnaryOperator::AddressOf => {
                if !self.ast.expr(operand).is_lvalue() {
                    return Err(SemaError::NotAnLvalue { span: span.clone() });
                }
                let ptr = self.types.pointer(oty);
                Ok(TypeUse::unqualified(ptr))
            }
            UnaryOperator::Dereference => {
                let underlying = self.types.underlying(oty.ty());
                match self.types.kind(underlying) {
                    TypeKind::Pointer { pointee } => Ok(*pointee),
                    _ => Err(SemaError::TypeMismatch { expected: "pointer".into(), found: self.types.display(oty), span: span.clone() }),
                }
            }
        }
    }

    fn check_access(&mut self, id: ExprId, base: ExprId, field: &str, span: &SourceSpan) -> SemaResult<TypeUse> {
        let base_ty = self.resolve_expr(base)?;
        let struct_id = self.types.underlying(base_ty.ty());
        let name = match self.types.kind(struct_id) {
            TypeKind::Struct { name, .. } => name.clone(),
            _ => return Err(SemaError::TypeMismatch { expected: "struct".into(), found: self.types.display(base_ty), span: span.clone() }),
        };

        let struct_decl_id = *self
            .structs
            .get(&name)
            .unwrap_or_else(|| panic!("interned struct type '{name}' has no matching StructDecl"));
        let fields = match self.ast.decl(struct_decl_id) {
            Decl::Struct(s) => s.fields.clone(),
            _ => unreachable!(),
        };

        for f_id in fields {
            let (fname, fty) = match self.ast.decl(f_id) {
                Decl::Field(f) => (f.name.clone(), f.ty),
                _ => unreachable!(),
            };
            if fname == field {
                if let ExprKind::Access(a) = &mut self.ast.expr_mut(id).kind {
                    a.resolved_field = Some(f_id);
                }
                return Ok(fty);
            }
        }
        Err(SemaError::UnresolvedField { field: field.to_string(), span: span.clone() })
    }

    fn check_subscript(&mut self, base: ExprId, index: ExprId, span: &SourceSpan) -> SemaResult<TypeUse> {
        let base_ty = self.resolve_expr(base)?;
        let index_ty = self.resolve_expr(index)?;
        self.expect_integer(index_ty, span)?;

        let underlying = self.types.underlying(base_ty.ty());
        match self.types.kind(underlying) {
            TypeKind::Array { element, .. } => Ok(*element),
            TypeKind::Pointer { pointee } => Ok(*pointee),
            _ => Err(SemaError::TypeMismatch { expected: "array or pointer".into(), found: self.types.display(base_ty), span: span.clone() }),
        }
    }

    fn check_decl_ref(&mut self, id: ExprId, name: &str, span: &SourceSpan) -> SemaResult<TypeUse> {
        let decl_id = self.scopes.lookup(name).ok_or_else(|| SemaError::UnresolvedIdent { name: name.to_string(), span: span.clone() })?;
        let ty = match self.ast.decl(decl_id) {
            Decl::Variable(v) => v.ty,
            Decl::Parameter(p) => p.ty,
            Decl::Function(_) => return Err(SemaError::NotCallable { name: name.to_string(), span: span.clone() }),
            _ => unreachable!(),
        };
        if let ExprKind::DeclRef(d) = &mut self.ast.expr_mut(id).kind {
            d.resolved = Some(decl_id);
        }
        Ok(ty)
    }

    fn check_call(&mut self, callee: ExprId, args: &[ExprId], span: &SourceSpan) -> SemaResult<TypeUse> {
        let name = match &self.ast.expr(callee).kind {
            ExprKind::DeclRef(d) => d.name.clone(),
            _ => return Err(SemaError::NotCallable { name: "<expression>".to_string(), span: span.clone() }),
        };
        let decl_id = self.scopes.lookup(&name).ok_or_else(|| SemaError::UnresolvedIdent { name: name.clone(), span: span.clone() })?;
        let (params, ret) = match self.ast.decl(decl_id) {
            Decl::Function(f) => (f.params.clone(), f.ret),
            _ => return Err(SemaError::NotCallable { name, span: span.clone() }),
        };

        if params.len() != args.len() {
            return Err(SemaError::ArgumentCountMismatch { name, expected: params.len(), found: args.len(), span: span.clone() });
        }
        for (&p_id, &a_id) in params.iter().zip(args.iter()) {
            let p_ty = match self.ast.decl(p_id) {
                Decl::Parameter(p) => p.ty,
                _ => unreachable!(),
            };
            let a_ty = self.resolve_expr(a_id)?;
            self.expect_assignable(p_ty, a_ty, span)?;
        }

        if let ExprKind::DeclRef(d) = &mut self.ast.expr_mut(callee).kind {
            d.resolved = Some(decl_id);
        }
        self.ast.expr_mut(callee).ty = ret;

        Ok(ret)
    }

    // -- shared type-rule helpers -----------------------------------------

    fn expect_assignable(&self, target: TypeUse, value: TypeUse, span: &SourceSpan) -> SemaResult<()> {
        if can_cast(self.types, value, target, true) {
            Ok(())
        } else {
            Err(SemaError::TypeMismatch { expected: self.types.display(target), found: self.types.display(value), span: span.clone() })
        }
    }

    fn expect_scalar(&self, ty: TypeUse, span: &SourceSpan) -> SemaResult<()> {
        let underlying = self.types.underlying(ty.ty());
        let is_scalar = matches!(
            self.types.kind(underlying),
            TypeKind::Bool | TypeKind::Char | TypeKind::Int(_) | TypeKind::UInt(_) | TypeKind::Float(_) | TypeKind::Pointer { .. } | TypeKind::Enum { .. }
        );
        if is_scalar {
            Ok(())
        } else {
            Err(SemaError::NonScalarCondition { found: self.types.display(ty), span: span.clone() })
        }
    }

    fn expect_integer(&self, ty: TypeUse, span: &SourceSpan) -> SemaResult<()> {
        let underlying = self.types.underlying(ty.ty());
        let is_integer = matches!(self.types.kind(underlying), TypeKind::Bool | TypeKind::Char | TypeKind::Int(_) | TypeKind::UInt(_));
        if is_integer {
            Ok(())
        } else {
            Err(SemaError::TypeMismatch { expected: "integer".into(), found: self.types.display(ty), span: span.clone() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statim_lexer::Lexer;
    use statim_parser::Parser;
    use statim_types::TypeContext;

    fn check(src: &str) -> SemaResult<()> {
        let mut types = TypeContext::new();
        let tokens = Lexer::new("test.stm", src).tokenize().unwrap();
        let (mut ast, root) = Parser::new("test.stm", tokens, &mut types).parse_translation_unit().unwrap();
        Sema::new(&mut ast, &mut types).check(root)
    }

    #[test]
    fn resolves_parameter_and_call() {
        let result = check(
            "func add(a: i32, b: i32) -> i32 { return a + b; } \
             func main() -> i64 { return cast<i64>(add(1, 2)); }",
        );
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn rejects_unresolved_identifier() {
        let result = check("func f() -> i32 { return missing; }");
        assert!(matches!(result, Err(SemaError::UnresolvedIdent { .. })));
    }

    #[test]
    fn rejects_duplicate_function() {
        let result = check("func f() -> void {} func f() -> void {}");
        assert!(matches!(result, Err(SemaError::DuplicateFunction { .. })));
    }

    #[test]
    fn rejects_assignment_to_non_lvalue() {
        let result = check("func f() -> void { 1 + 1 = 2; }");
        assert!(matches!(result, Err(SemaError::NotAnLvalue { .. })));
    }

    #[test]
    fn rejects_break_outside_loop() {
        let result = check("func f() -> void { break; }");
        assert!(matches!(result, Err(SemaError::BreakOutsideLoop { .. })));
    }

    #[test]
    fn accepts_break_inside_while() {
        let result = check("func f() -> void { while (true) { break; } }");
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn rejects_missing_return() {
        let result = check("func f() -> i32 { var x: i32 = 1; }");
        assert!(matches!(result, Err(SemaError::MissingReturn { .. })));
    }

    #[test]
    fn rejects_non_i64_main() {
        let result = check("func main() -> i32 { return 0; }");
        assert!(matches!(result, Err(SemaError::InvalidMainSignature { .. })));
    }

    #[test]
    fn resolves_struct_field_access() {
        let result = check(
            "struct Point { x: i32, y: i32 } \
             func f(p: Point) -> i32 { return p.x + p.y; }",
        );
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn rejects_unknown_field() {
        let result = check("struct Point { x: i32 } func f(p: Point) -> i32 { return p.z; }");
        assert!(matches!(result, Err(SemaError::UnresolvedField { .. })));
    }

    #[test]
    fn rejects_narrowing_without_explicit_cast() {
        let result = check("func f(x: i64) -> i32 { return x; }");
        assert!(matches!(result, Err(SemaError::TypeMismatch { .. })));
    }
}
