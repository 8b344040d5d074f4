//! AST-to-IR lowering (spec §4.3): a two-phase pass that turns a
//! `statim_sema`-checked `Ast` into a `Cfg`.
//!
//! The declare phase mints every function/global signature up front so
//! forward references (a function calling one declared later in the file)
//! resolve without a second pass over top-level declarations. The define
//! phase then walks each function body, threading the "current insertion
//! block" through statement and expression lowering alike — short-circuit
//! `&&`/`||` needs to open new blocks mid-expression, so the same
//! `block: &mut BlockId` convention statements use covers expressions too.
//!
//! By the time a checked `Ast` reaches here every `Expr::ty` is already
//! resolved and every `DeclRef`/`Access` already carries its target
//! `DeclId`, so lowering never infers a type or a name — it only reads them.

use hashbrown::HashMap;
use statim_common::{Diagnostics, SourceSpan};
use statim_parser::{
    Ast, AsmStmt, BinaryOperator, BinaryOpExpr, Decl, DeclId, ExprId, ExprKind, IfStmt, Linkage, Stmt, StmtId,
    UnaryOperator, UnaryOpExpr, WhileStmt,
};
use statim_types::{can_cast, layout, IntWidth, TypeContext, TypeKind, TypeUse};

use crate::builder::Builder;
use crate::cfg::Cfg;
use crate::error::{LoweringError, LoweringResult};
use crate::function::{Function, Global};
use crate::instr::{FCmpOp, ICmpOp};
use crate::value::{BlockId, Constant, FunctionId, GlobalId, LocalId, Value, ValueKind};

/// Lowers every declaration reachable from `top` into `cfg`. `cfg` must
/// already carry the `TypeContext` the `Ast` was checked against.
pub fn lower(ast: &Ast, top: &[DeclId], mut cfg: Cfg, diags: &mut Diagnostics) -> LoweringResult<Cfg> {
    let mut lowerer = Lowerer {
        ast,
        diags,
        decl_function: HashMap::new(),
        decl_global: HashMap::new(),
        field_index: HashMap::new(),
        string_pool: HashMap::new(),
    };
    lowerer.declare(&mut cfg, top);
    lowerer.define_globals(&mut cfg, top);
    lowerer.define_functions(&mut cfg, top)?;

    if lowerer.diags.has_errors() {
        return Err(LoweringError::Unsupported {
            what: "one or more declarations failed to lower".to_string(),
            span: SourceSpan::synthetic(),
        });
    }
    Ok(cfg)
}

struct Lowerer<'a> {
    ast: &'a Ast,
    diags: &'a mut Diagnostics,
    decl_function: HashMap<DeclId, FunctionId>,
    decl_global: HashMap<DeclId, GlobalId>,
    /// A `FieldDecl`'s `DeclId` to its ordinal within the owning struct.
    field_index: HashMap<DeclId, usize>,
    /// Dedupes identical string literals onto a single synthesized global.
    string_pool: HashMap<String, GlobalId>,
}

#[derive(Default)]
struct FnState {
    decl_local: HashMap<DeclId, LocalId>,
    loop_stack: Vec<LoopCtx>,
}

struct LoopCtx {
    break_block: BlockId,
    continue_block: BlockId,
}

impl<'a> Lowerer<'a> {
    /// Runs a single builder-mediated edit against `fid`'s function without
    /// holding a `Builder` across any call back into `self` — `cfg` is
    /// destructured so `types` and `functions` borrow independently.
    fn with_builder<T>(&mut self, cfg: &mut Cfg, fid: FunctionId, block: BlockId, f: impl FnOnce(&mut Builder, &TypeContext) -> T) -> T {
        let Cfg { types, functions, .. } = cfg;
        let func = &mut functions[fid.0 as usize];
        let mut b = Builder::new(func);
        b.position_at_end(block);
        f(&mut b, &*types)
    }

    // -- declare phase ----------------------------------------------------

    fn declare(&mut self, cfg: &mut Cfg, top: &[DeclId]) {
        for &id in top {
            if let Decl::Struct(s) = self.ast.decl(id) {
                for (i, &f) in s.fields.iter().enumerate() {
                    self.field_index.insert(f, i);
                }
            }
        }

        for &id in top {
            match self.ast.decl(id) {
                Decl::Function(f) => {
                    let params: Vec<TypeUse> = f
                        .params
                        .iter()
                        .map(|&p| match self.ast.decl(p) {
                            Decl::Parameter(pd) => pd.ty,
                            _ => unreachable!("FunctionDecl.params only ever holds Parameter ids"),
                        })
                        .collect();
                    let func_ty = cfg.types.function(f.ret, params.clone());
                    let fid = FunctionId(cfg.functions.len() as u32);
                    let func = Function::new(fid, f.name.clone(), func_ty, f.ret, params, f.linkage);
                    cfg.push_function(func);
                    self.decl_function.insert(id, fid);
                }
                Decl::Variable(v) if v.is_global => {
                    let gid = GlobalId(cfg.globals.len() as u32);
                    let global = Global { id: gid, name: v.name.clone(), ty: v.ty, linkage: Linkage::External, initializer: Constant::Null, read_only: false };
                    cfg.push_global(global);
                    self.decl_global.insert(id, gid);
                }
                _ => {}
            }
        }
    }

    // -- global initializers ----------------------------------------------

    fn define_globals(&mut self, cfg: &mut Cfg, top: &[DeclId]) {
        for &id in top {
            let Decl::Variable(v) = self.ast.decl(id) else { continue };
            if !v.is_global {
                continue;
            }
            let gid = self.decl_global[&id];
            let init = match v.init {
                Some(e) => match self.eval_global_const(cfg, e) {
                    Some(c) => c,
                    None => {
                        self.diags.error(format!("initializer for global '{}' is not a compile-time constant", v.name), v.span.clone());
                        Constant::Null
                    }
                },
                None => default_constant_for(&cfg.types, v.ty),
            };
            cfg.global_mut(gid).initializer = init;
        }
    }

    fn eval_global_const(&mut self, cfg: &Cfg, id: ExprId) -> Option<Constant> {
        let expr = self.ast.expr(id);
        match &expr.kind {
            ExprKind::BoolLit(b) => Some(Constant::Int(*b as i64)),
            ExprKind::IntLit(v) => Some(Constant::Int(*v as i64)),
            ExprKind::FloatLit(v) => Some(Constant::FP(*v)),
            ExprKind::CharLit(c) => Some(Constant::Int(*c as i64)),
            ExprKind::StringLit(s) => Some(Constant::String(s.clone())),
            ExprKind::NullLit => Some(Constant::Null),
            ExprKind::Paren(inner) => self.eval_global_const(cfg, *inner),
            ExprKind::Sizeof(tu) => Some(Constant::Int(layout::size_of(&cfg.types, tu.ty()) as i64)),
            ExprKind::Cast(c) => self.eval_global_const(cfg, c.operand),
            ExprKind::UnaryOp(u) if u.op == UnaryOperator::Neg => match self.eval_global_const(cfg, u.operand)? {
                Constant::Int(v) => Some(Constant::Int(-v)),
                Constant::FP(v) => Some(Constant::FP(-v)),
                _ => None,
            },
            ExprKind::UnaryOp(u) if u.op == UnaryOperator::BitNot => match self.eval_global_const(cfg, u.operand)? {
                Constant::Int(v) => Some(Constant::Int(!v)),
                _ => None,
            },
            _ => None,
        }
    }

    // -- function bodies ----------------------------------------------------

    fn define_functions(&mut self, cfg: &mut Cfg, top: &[DeclId]) -> LoweringResult<()> {
        for &id in top {
            let Decl::Function(f) = self.ast.decl(id) else { continue };
            let Some(body) = f.body else { continue };
            let fid = self.decl_function[&id];
            let params = f.params.clone();
            let ret = f.ret;
            self.lower_function(cfg, fid, &params, body, ret)?;
        }
        Ok(())
    }

    fn lower_function(&mut self, cfg: &mut Cfg, fid: FunctionId, params: &[DeclId], body: StmtId, ret: TypeUse) -> LoweringResult<()> {
        let mut fctx = FnState::default();
        let entry = cfg.function_mut(fid).push_block();

        for (i, &p_id) in params.iter().enumerate() {
            let (name, pty) = match self.ast.decl(p_id) {
                Decl::Parameter(p) => (p.name.clone(), p.ty),
                _ => unreachable!(),
            };
            let local_id = cfg.function_mut(fid).alloc_local(Some(name), pty);
            fctx.decl_local.insert(p_id, local_id);
            let arg_val = Value::argument(i as u32, pty);
            let addr = Value::local(local_id, pty);
            self.with_builder(cfg, fid, entry, |b, types| b.build_store(arg_val, addr, types));
        }

        let mut block = entry;
        self.lower_stmt(cfg, fid, &mut fctx, &mut block, body)?;

        if !cfg.function(fid).block(block).has_terminator() {
            self.with_builder(cfg, fid, block, |b, _| b.build_return(None));
        }
        let _ = ret;

        cfg.function_mut(fid).prune_unreachable_blocks();
        Ok(())
    }

    // -- statements ----------------------------------------------------

    fn lower_stmt(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, stmt_id: StmtId) -> LoweringResult<()> {
        let stmt = self.ast.stmt(stmt_id);
        match stmt {
            Stmt::Block(b) => {
                let stmts = b.stmts.clone();
                for s in stmts {
                    self.lower_stmt(cfg, fid, fctx, block, s)?;
                }
            }
            Stmt::Decl(d) => {
                let decl_id = d.decl;
                let (name, ty, init) = match self.ast.decl(decl_id) {
                    Decl::Variable(v) => (v.name.clone(), v.ty, v.init),
                    _ => unreachable!("DeclStmt always points at a Variable"),
                };
                let local_id = cfg.function_mut(fid).alloc_local(Some(name), ty);
                fctx.decl_local.insert(decl_id, local_id);
                if let Some(init_id) = init {
                    let value = self.lower_expr(cfg, fid, fctx, block, init_id)?;
                    let value = self.lower_cast(cfg, fid, *block, value, ty);
                    let addr = Value::local(local_id, ty);
                    self.with_builder(cfg, fid, *block, |b, types| b.build_store(value, addr, types));
                }
            }
            Stmt::Ret(r) => {
                let value = match r.value {
                    Some(e) => {
                        let v = self.lower_expr(cfg, fid, fctx, block, e)?;
                        let ret_ty = cfg.function(fid).ret;
                        Some(self.lower_cast(cfg, fid, *block, v, ret_ty))
                    }
                    None => None,
                };
                self.with_builder(cfg, fid, *block, |b, _| b.build_return(value));
                *block = cfg.function_mut(fid).push_block();
            }
            Stmt::If(s) => {
                let s = clone_if(s);
                self.lower_if(cfg, fid, fctx, block, &s)?;
            }
            Stmt::While(s) => {
                let s = clone_while(s);
                self.lower_while(cfg, fid, fctx, block, &s)?;
            }
            Stmt::Break(span) => {
                let span = span.clone();
                let target = fctx
                    .loop_stack
                    .last()
                    .map(|l| l.break_block)
                    .ok_or_else(|| LoweringError::Unsupported { what: "break outside a loop".to_string(), span: span.clone() })?;
                let void_ty = TypeUse::unqualified(cfg.types.void());
                self.with_builder(cfg, fid, *block, |b, _| b.build_jump(target, void_ty, fid));
                *block = cfg.function_mut(fid).push_block();
            }
            Stmt::Continue(span) => {
                let span = span.clone();
                let target = fctx
                    .loop_stack
                    .last()
                    .map(|l| l.continue_block)
                    .ok_or_else(|| LoweringError::Unsupported { what: "continue outside a loop".to_string(), span: span.clone() })?;
                let void_ty = TypeUse::unqualified(cfg.types.void());
                self.with_builder(cfg, fid, *block, |b, _| b.build_jump(target, void_ty, fid));
                *block = cfg.function_mut(fid).push_block();
            }
            Stmt::Asm(a) => {
                let AsmStmt { template, constraints, args, .. } = clone_asm(a);
                let mut values = Vec::with_capacity(args.len());
                for a_id in args {
                    values.push(self.lower_expr(cfg, fid, fctx, block, a_id)?);
                }
                self.with_builder(cfg, fid, *block, |b, _| b.build_inline_asm(template, constraints, values));
            }
            Stmt::Expr(e) => {
                self.lower_expr(cfg, fid, fctx, block, *e)?;
            }
        }
        Ok(())
    }

    fn lower_if(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, s: &IfStmt) -> LoweringResult<()> {
        let cond_val = self.lower_expr(cfg, fid, fctx, block, s.cond)?;
        let cond_bool = self.coerce_bool(cfg, fid, *block, cond_val);
        let void_ty = TypeUse::unqualified(cfg.types.void());

        let then_blk = cfg.function_mut(fid).push_block();
        let merge_blk = cfg.function_mut(fid).push_block();
        let else_blk = s.else_branch.map(|_| cfg.function_mut(fid).push_block());
        let false_target = else_blk.unwrap_or(merge_blk);

        self.with_builder(cfg, fid, *block, |b, _| b.build_branch_if(cond_bool, void_ty, then_blk, false_target, fid));

        let mut then_cur = then_blk;
        self.lower_stmt(cfg, fid, fctx, &mut then_cur, s.then_branch)?;
        if !cfg.function(fid).block(then_cur).has_terminator() {
            self.with_builder(cfg, fid, then_cur, |b, _| b.build_jump(merge_blk, void_ty, fid));
        }

        if let (Some(else_id), Some(else_blk)) = (s.else_branch, else_blk) {
            let mut else_cur = else_blk;
            self.lower_stmt(cfg, fid, fctx, &mut else_cur, else_id)?;
            if !cfg.function(fid).block(else_cur).has_terminator() {
                self.with_builder(cfg, fid, else_cur, |b, _| b.build_jump(merge_blk, void_ty, fid));
            }
        }

        *block = merge_blk;
        Ok(())
    }

    fn lower_while(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, s: &WhileStmt) -> LoweringResult<()> {
        let void_ty = TypeUse::unqualified(cfg.types.void());
        let cond_blk = cfg.function_mut(fid).push_block();
        let body_blk = cfg.function_mut(fid).push_block();
        let merge_blk = cfg.function_mut(fid).push_block();

        if !cfg.function(fid).block(*block).has_terminator() {
            self.with_builder(cfg, fid, *block, |b, _| b.build_jump(cond_blk, void_ty, fid));
        }

        let mut cond_cur = cond_blk;
        let cond_val = self.lower_expr(cfg, fid, fctx, &mut cond_cur, s.cond)?;
        let cond_bool = self.coerce_bool(cfg, fid, cond_cur, cond_val);
        self.with_builder(cfg, fid, cond_cur, |b, _| b.build_branch_if(cond_bool, void_ty, body_blk, merge_blk, fid));

        fctx.loop_stack.push(LoopCtx { break_block: merge_blk, continue_block: cond_blk });
        let mut body_cur = body_blk;
        let body_result = self.lower_stmt(cfg, fid, fctx, &mut body_cur, s.body);
        fctx.loop_stack.pop();
        body_result?;

        if !cfg.function(fid).block(body_cur).has_terminator() {
            self.with_builder(cfg, fid, body_cur, |b, _| b.build_jump(cond_blk, void_ty, fid));
        }

        *block = merge_blk;
        Ok(())
    }

    // -- expressions ------------------------------------------------------

    fn lower_expr(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, expr_id: ExprId) -> LoweringResult<Value> {
        let expr = self.ast.expr(expr_id);
        let ty = expr.ty;
        let span = expr.span().clone();

        let value = match &expr.kind {
            ExprKind::BoolLit(v) => Value::constant(Constant::Int(*v as i64), ty),
            ExprKind::IntLit(v) => Value::constant(Constant::Int(*v as i64), ty),
            ExprKind::FloatLit(v) => Value::constant(Constant::FP(*v), ty),
            ExprKind::CharLit(c) => Value::constant(Constant::Int(*c as i64), ty),
            ExprKind::NullLit => Value::constant(Constant::Null, ty),
            ExprKind::StringLit(s) => {
                let s = s.clone();
                let gval = self.lower_string_literal(cfg, &s);
                Value::new(gval.kind, ty)
            }
            ExprKind::Sizeof(target) => {
                let sz = layout::size_of(&cfg.types, target.ty());
                Value::constant(Constant::Int(sz as i64), ty)
            }
            ExprKind::Paren(inner) => return self.lower_expr(cfg, fid, fctx, block, *inner),
            ExprKind::Cast(c) => {
                let (operand, target) = (c.operand, c.target);
                let v = self.lower_expr(cfg, fid, fctx, block, operand)?;
                self.lower_cast(cfg, fid, *block, v, target)
            }
            ExprKind::UnaryOp(u) if u.op == UnaryOperator::Dereference => {
                let addr = self.lower_lvalue(cfg, fid, fctx, block, expr_id)?;
                self.with_builder(cfg, fid, *block, |b, types| b.build_load(ty, addr, types))
            }
            ExprKind::UnaryOp(u) => {
                let u = clone_unary(u);
                self.lower_unary(cfg, fid, fctx, block, &u, ty)?
            }
            ExprKind::BinaryOp(b) => {
                let b = clone_binary(b);
                self.lower_binary(cfg, fid, fctx, block, &b, ty)?
            }
            ExprKind::DeclRef(_) | ExprKind::Access(_) | ExprKind::Subscript(_) => {
                let addr = self.lower_lvalue(cfg, fid, fctx, block, expr_id)?;
                let underlying = cfg.types.underlying(ty.ty());
                if matches!(cfg.types.kind(underlying), TypeKind::Array { .. }) {
                    addr
                } else {
                    self.with_builder(cfg, fid, *block, |b, types| b.build_load(ty, addr, types))
                }
            }
            ExprKind::Call(c) => {
                let callee = c.callee;
                let args: Vec<ExprId> = c.args.iter().copied().collect();
                self.lower_call(cfg, fid, fctx, block, callee, &args, ty, &span)?
            }
        };
        Ok(value)
    }

    fn lower_unary(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, u: &UnaryOpExpr, ty: TypeUse) -> LoweringResult<Value> {
        match u.op {
            UnaryOperator::AddressOf => {
                let addr = self.lower_lvalue(cfg, fid, fctx, block, u.operand)?;
                Ok(Value::new(addr.kind, ty))
            }
            UnaryOperator::Neg => {
                let v = self.lower_expr(cfg, fid, fctx, block, u.operand)?;
                let underlying = cfg.types.underlying(v.ty.ty());
                let is_float = cfg.types.get(underlying).is_floating_point();
                Ok(self.with_builder(cfg, fid, *block, |b, _| if is_float { b.build_fneg(v) } else { b.build_ineg(v) }))
            }
            UnaryOperator::BitNot => {
                let v = self.lower_expr(cfg, fid, fctx, block, u.operand)?;
                Ok(self.with_builder(cfg, fid, *block, |b, _| b.build_not(v)))
            }
            UnaryOperator::Not => {
                let v = self.lower_expr(cfg, fid, fctx, block, u.operand)?;
                let bool_val = self.coerce_bool(cfg, fid, *block, v);
                let bool_ty = TypeUse::unqualified(cfg.types.bool());
                Ok(self.with_builder(cfg, fid, *block, |b, _| {
                    let f = Builder::const_bool(false, bool_ty);
                    b.build_icmp(ICmpOp::Eq, bool_val, f, bool_ty)
                }))
            }
            UnaryOperator::Dereference => unreachable!("dereference is routed through lower_lvalue by the caller"),
        }
    }

    fn lower_binary(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, b: &BinaryOpExpr, ty: TypeUse) -> LoweringResult<Value> {
        use BinaryOperator::*;
        match b.op {
            Assign => {
                let addr = self.lower_lvalue(cfg, fid, fctx, block, b.lhs)?;
                let rhs = self.lower_expr(cfg, fid, fctx, block, b.rhs)?;
                let rhs = self.lower_cast(cfg, fid, *block, rhs, addr.ty);
                self.with_builder(cfg, fid, *block, |bd, types| bd.build_store(rhs.clone(), addr, types));
                Ok(rhs)
            }
            LogicalAnd => self.lower_logical(cfg, fid, fctx, block, b.lhs, b.rhs, true),
            LogicalOr => self.lower_logical(cfg, fid, fctx, block, b.lhs, b.rhs, false),
            _ => {
                let lhs = self.lower_expr(cfg, fid, fctx, block, b.lhs)?;
                let rhs = self.lower_expr(cfg, fid, fctx, block, b.rhs)?;
                Ok(self.lower_arith(cfg, fid, *block, b.op, lhs, rhs, ty))
            }
        }
    }

    fn lower_arith(&mut self, cfg: &mut Cfg, fid: FunctionId, block: BlockId, op: BinaryOperator, lhs: Value, rhs: Value, result_ty: TypeUse) -> Value {
        use BinaryOperator::*;

        let operand_ty = self.common_operand_type(cfg, lhs.ty, rhs.ty);
        let lhs = self.lower_cast(cfg, fid, block, lhs, operand_ty);
        let rhs = self.lower_cast(cfg, fid, block, rhs, operand_ty);

        let underlying = cfg.types.underlying(operand_ty.ty());
        let t = cfg.types.get(underlying);
        let is_float = t.is_floating_point();
        let is_unsigned = t.is_unsigned_integer();

        self.with_builder(cfg, fid, block, |b, _| match op {
            Add => if is_float { b.build_fadd(lhs, rhs) } else { b.build_iadd(lhs, rhs) },
            Sub => if is_float { b.build_fsub(lhs, rhs) } else { b.build_isub(lhs, rhs) },
            Mul => {
                if is_float {
                    b.build_fmul(lhs, rhs)
                } else if is_unsigned {
                    b.build_umul(lhs, rhs)
                } else {
                    b.build_smul(lhs, rhs)
                }
            }
            Div => {
                if is_float {
                    b.build_fdiv(lhs, rhs)
                } else if is_unsigned {
                    b.build_udiv(lhs, rhs)
                } else {
                    b.build_sdiv(lhs, rhs)
                }
            }
            Rem => if is_unsigned { b.build_urem(lhs, rhs) } else { b.build_srem(lhs, rhs) },
            And => b.build_and(lhs, rhs),
            Or => b.build_or(lhs, rhs),
            Xor => b.build_xor(lhs, rhs),
            Shl => b.build_shl(lhs, rhs),
            Shr => if is_unsigned { b.build_lshr(lhs, rhs) } else { b.build_ashr(lhs, rhs) },
            Eq => if is_float { b.build_fcmp(FCmpOp::Oeq, lhs, rhs, result_ty) } else { b.build_icmp(ICmpOp::Eq, lhs, rhs, result_ty) },
            Ne => if is_float { b.build_fcmp(FCmpOp::One, lhs, rhs, result_ty) } else { b.build_icmp(ICmpOp::Ne, lhs, rhs, result_ty) },
            Lt => {
                if is_float {
                    b.build_fcmp(FCmpOp::Olt, lhs, rhs, result_ty)
                } else if is_unsigned {
                    b.build_icmp(ICmpOp::Ult, lhs, rhs, result_ty)
                } else {
                    b.build_icmp(ICmpOp::Slt, lhs, rhs, result_ty)
                }
            }
            Le => {
                if is_float {
                    b.build_fcmp(FCmpOp::Ole, lhs, rhs, result_ty)
                } else if is_unsigned {
                    b.build_icmp(ICmpOp::Ule, lhs, rhs, result_ty)
                } else {
                    b.build_icmp(ICmpOp::Sle, lhs, rhs, result_ty)
                }
            }
            Gt => {
                if is_float {
                    b.build_fcmp(FCmpOp::Ogt, lhs, rhs, result_ty)
                } else if is_unsigned {
                    b.build_icmp(ICmpOp::Ugt, lhs, rhs, result_ty)
                } else {
                    b.build_icmp(ICmpOp::Sgt, lhs, rhs, result_ty)
                }
            }
            Ge => {
                if is_float {
                    b.build_fcmp(FCmpOp::Oge, lhs, rhs, result_ty)
                } else if is_unsigned {
                    b.build_icmp(ICmpOp::Uge, lhs, rhs, result_ty)
                } else {
                    b.build_icmp(ICmpOp::Sge, lhs, rhs, result_ty)
                }
            }
            Assign | LogicalAnd | LogicalOr => unreachable!("handled by lower_binary"),
        })
    }

    /// The type both operands are promoted to before an arithmetic op or
    /// comparison runs — whichever of the two implicitly accepts the other,
    /// mirroring the rule `statim_sema`'s `check_binary` type-checks against.
    fn common_operand_type(&self, cfg: &Cfg, lty: TypeUse, rty: TypeUse) -> TypeUse {
        if can_cast(&cfg.types, rty, lty, true) {
            lty
        } else {
            rty
        }
    }

    fn lower_logical(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, lhs_id: ExprId, rhs_id: ExprId, is_and: bool) -> LoweringResult<Value> {
        let bool_ty = TypeUse::unqualified(cfg.types.bool());
        let void_ty = TypeUse::unqualified(cfg.types.void());

        let lhs_val = self.lower_expr(cfg, fid, fctx, block, lhs_id)?;
        let lhs_bool = self.coerce_bool(cfg, fid, *block, lhs_val);
        let lhs_end = *block;

        let rhs_blk = cfg.function_mut(fid).push_block();
        let merge_blk = cfg.function_mut(fid).push_block();
        let (true_target, false_target) = if is_and { (rhs_blk, merge_blk) } else { (merge_blk, rhs_blk) };
        self.with_builder(cfg, fid, lhs_end, |b, _| b.build_branch_if(lhs_bool, void_ty, true_target, false_target, fid));

        let short_circuit_value = Builder::const_bool(!is_and, bool_ty);
        let phi = self.with_builder(cfg, fid, merge_blk, |b, _| {
            let phi = b.build_phi(bool_ty);
            b.add_incoming(phi.clone(), merge_blk, lhs_end, short_circuit_value);
            phi
        });

        let mut rhs_cur = rhs_blk;
        let rhs_val = self.lower_expr(cfg, fid, fctx, &mut rhs_cur, rhs_id)?;
        let rhs_bool = self.coerce_bool(cfg, fid, rhs_cur, rhs_val);
        self.with_builder(cfg, fid, rhs_cur, |b, _| {
            b.build_jump(merge_blk, void_ty, fid);
            b.add_incoming(phi.clone(), merge_blk, rhs_cur, rhs_bool);
        });

        *block = merge_blk;
        Ok(phi)
    }

    fn lower_call(
        &mut self,
        cfg: &mut Cfg,
        fid: FunctionId,
        fctx: &mut FnState,
        block: &mut BlockId,
        callee_id: ExprId,
        arg_ids: &[ExprId],
        ret_ty: TypeUse,
        span: &SourceSpan,
    ) -> LoweringResult<Value> {
        let callee_expr = self.ast.expr(callee_id);
        let callee_val = match &callee_expr.kind {
            ExprKind::DeclRef(d) => {
                let decl_id = d.resolved.ok_or_else(|| LoweringError::UnresolvedReference { span: span.clone() })?;
                let target_fid = *self
                    .decl_function
                    .get(&decl_id)
                    .ok_or_else(|| LoweringError::UnresolvedReference { span: span.clone() })?;
                let func_ty = cfg.function(target_fid).ty;
                Value::function(target_fid, TypeUse::unqualified(func_ty))
            }
            _ => return Err(LoweringError::Unsupported { what: "indirect calls are not supported".to_string(), span: span.clone() }),
        };

        if arg_ids.len() > 6 {
            return Err(LoweringError::TooManyArguments { span: span.clone() });
        }

        let mut args = Vec::with_capacity(arg_ids.len());
        for &a in arg_ids {
            args.push(self.lower_expr(cfg, fid, fctx, block, a)?);
        }

        let underlying = cfg.types.underlying(ret_ty.ty());
        let is_void = matches!(cfg.types.kind(underlying), TypeKind::Void);
        let result = self.with_builder(cfg, fid, *block, |b, _| b.build_call(if is_void { None } else { Some(ret_ty) }, callee_val, args));
        Ok(result.unwrap_or_else(|| Value::constant(Constant::Null, TypeUse::unqualified(cfg.types.void()))))
    }

    // -- lvalues ------------------------------------------------------------

    fn lower_lvalue(&mut self, cfg: &mut Cfg, fid: FunctionId, fctx: &mut FnState, block: &mut BlockId, expr_id: ExprId) -> LoweringResult<Value> {
        let expr = self.ast.expr(expr_id);
        let result_ty = expr.ty;
        let span = expr.span().clone();

        match &expr.kind {
            ExprKind::DeclRef(d) => {
                let decl_id = d.resolved.ok_or_else(|| LoweringError::UnresolvedReference { span: span.clone() })?;
                self.lvalue_for_decl(fctx, decl_id, result_ty, &span)
            }
            ExprKind::Access(a) => {
                let (base, field_decl) = (a.base, a.resolved_field.ok_or_else(|| LoweringError::UnresolvedReference { span: span.clone() })?);
                let base_addr = self.lower_lvalue(cfg, fid, fctx, block, base)?;
                let idx = *self.field_index.get(&field_decl).expect("resolved field always has a known ordinal") as i64;
                let idx_ty = TypeUse::unqualified(cfg.types.int(IntWidth::W64));
                let idx_val = Builder::const_int(idx_ty, idx);
                Ok(self.with_builder(cfg, fid, *block, |b, _| b.build_access_ptr(result_ty, base_addr, idx_val)))
            }
            ExprKind::Subscript(s) => {
                let (base, index) = (s.base, s.index);
                let base_underlying = cfg.types.underlying(self.ast.expr(base).ty.ty());
                let base_val = if matches!(cfg.types.kind(base_underlying), TypeKind::Array { .. }) {
                    self.lower_lvalue(cfg, fid, fctx, block, base)?
                } else {
                    self.lower_expr(cfg, fid, fctx, block, base)?
                };
                let idx_val = self.lower_expr(cfg, fid, fctx, block, index)?;
                Ok(self.with_builder(cfg, fid, *block, |b, _| b.build_access_ptr(result_ty, base_val, idx_val)))
            }
            ExprKind::UnaryOp(u) if u.op == UnaryOperator::Dereference => {
                let ptr_val = self.lower_expr(cfg, fid, fctx, block, u.operand)?;
                Ok(Value::new(ptr_val.kind, result_ty))
            }
            ExprKind::Paren(inner) => self.lower_lvalue(cfg, fid, fctx, block, *inner),
            _ => Err(LoweringError::Unsupported { what: "expression used as an lvalue is not one".to_string(), span }),
        }
    }

    fn lvalue_for_decl(&mut self, fctx: &FnState, decl_id: DeclId, ty: TypeUse, span: &SourceSpan) -> LoweringResult<Value> {
        if let Some(&local_id) = fctx.decl_local.get(&decl_id) {
            return Ok(Value::local(local_id, ty));
        }
        if let Some(&gid) = self.decl_global.get(&decl_id) {
            return Ok(Value::global(gid, ty));
        }
        Err(LoweringError::UnresolvedReference { span: span.clone() })
    }

    fn lower_string_literal(&mut self, cfg: &mut Cfg, s: &str) -> Value {
        if let Some(&gid) = self.string_pool.get(s) {
            let ty = cfg.global(gid).ty;
            return Value::global(gid, ty);
        }
        let char_ty = TypeUse::unqualified(cfg.types.char());
        let arr_ty = cfg.types.array(char_ty, s.len() as u32 + 1);
        let tu = TypeUse::unqualified(arr_ty);
        let name = format!(".Lstr.{}", self.string_pool.len());
        let gid = GlobalId(cfg.globals.len() as u32);
        let global = Global { id: gid, name, ty: tu, linkage: Linkage::Internal, initializer: Constant::String(s.to_string()), read_only: true };
        cfg.push_global(global);
        self.string_pool.insert(s.to_string(), gid);
        Value::global(gid, tu)
    }

    // -- casts --------------------------------------------------------------

    fn coerce_bool(&mut self, cfg: &mut Cfg, fid: FunctionId, block: BlockId, value: Value) -> Value {
        let bool_ty = TypeUse::unqualified(cfg.types.bool());
        if cfg.types.same_type_use(value.ty, bool_ty) {
            return value;
        }
        let underlying = cfg.types.underlying(value.ty.ty());
        let is_float = cfg.types.get(underlying).is_floating_point();
        self.with_builder(cfg, fid, block, |b, _| {
            if is_float {
                let zero = Builder::const_fp(value.ty, 0.0);
                b.build_fcmp(FCmpOp::One, value, zero, bool_ty)
            } else {
                let zero = Builder::const_zero_int(value.ty);
                b.build_icmp(ICmpOp::Ne, value, zero, bool_ty)
            }
        })
    }

    /// Lowers one value from its current type to `to`. Array-to-pointer decay
    /// and the `Local`/`Global`/instruction-address relabeling `&`/`*` rely on
    /// are handled by reinterpreting the same `ValueKind` with a new `TypeUse`
    /// rather than emitting a conversion instruction; everything else goes
    /// through the matching `SExt`/`ZExt`/`FExt`/`ITrunc`/`FTrunc`/`SI2FP`/
    /// `UI2FP`/`FP2SI`/`FP2UI`/`P2I`/`I2P`/`Reinterpret` opcode.
    fn lower_cast(&mut self, cfg: &mut Cfg, fid: FunctionId, block: BlockId, value: Value, to: TypeUse) -> Value {
        let from = value.ty;
        if cfg.types.same_type_use(from, to) {
            return Value::new(value.kind, to);
        }

        let from_underlying = cfg.types.underlying(from.ty());
        if matches!(cfg.types.kind(from_underlying), TypeKind::Array { .. }) {
            return Value::new(value.kind, to);
        }

        let (from_bits, from_signed, from_float, from_ptr) = scalar_info(&cfg.types, from);
        let (to_bits, to_signed, to_float, to_ptr) = scalar_info(&cfg.types, to);

        self.with_builder(cfg, fid, block, |b, _| {
            if from_ptr && to_ptr {
                b.build_reinterpret(to, value)
            } else if from_ptr {
                b.build_p2i(to, value)
            } else if to_ptr {
                b.build_i2p(to, value)
            } else if from_float && to_float {
                match to_bits.cmp(&from_bits) {
                    std::cmp::Ordering::Greater => b.build_fext(to, value),
                    std::cmp::Ordering::Less => b.build_ftrunc(to, value),
                    std::cmp::Ordering::Equal => b.build_reinterpret(to, value),
                }
            } else if from_float {
                if to_signed { b.build_fp2si(to, value) } else { b.build_fp2ui(to, value) }
            } else if to_float {
                if from_signed { b.build_si2fp(to, value) } else { b.build_ui2fp(to, value) }
            } else {
                match to_bits.cmp(&from_bits) {
                    std::cmp::Ordering::Greater => if from_signed { b.build_sext(to, value) } else { b.build_zext(to, value) },
                    std::cmp::Ordering::Less => b.build_itrunc(to, value),
                    std::cmp::Ordering::Equal => b.build_reinterpret(to, value),
                }
            }
        })
    }
}

/// `(bits, signed, is_float, is_pointer)` for any scalar `TypeUse` the cast
/// lowering needs to pick an opcode for. Enums classify as their declared
/// underlying integer type, matching `statim_types::cast`'s own lattice.
fn scalar_info(ctx: &TypeContext, tu: TypeUse) -> (u32, bool, bool, bool) {
    let id = ctx.underlying(tu.ty());
    let t = ctx.get(id);
    if let Some(bits) = t.integer_bits() {
        return (bits, t.is_signed_integer(), false, false);
    }
    if t.is_floating_point() {
        let bits = match &t.kind {
            TypeKind::Float(w) => w.bits(),
            _ => unreachable!(),
        };
        return (bits, true, true, false);
    }
    if t.is_pointer() {
        return (layout::POINTER_BITS, false, false, true);
    }
    if let TypeKind::Enum { underlying, .. } = &t.kind {
        let ut = ctx.get(*underlying);
        return (ut.integer_bits().unwrap_or(32), ut.is_signed_integer(), false, false);
    }
    (0, false, false, false)
}

fn default_constant_for(ctx: &TypeContext, tu: TypeUse) -> Constant {
    let id = ctx.underlying(tu.ty());
    match ctx.kind(id) {
        TypeKind::Float(_) => Constant::FP(0.0),
        TypeKind::Pointer { .. } => Constant::Null,
        _ => Constant::Int(0),
    }
}

// Small helpers that copy a statement's payload out from behind `self.ast`'s
// borrow before a recursive `&mut self` call needs to follow — the structs
// themselves aren't `Copy`, but every field lowering reads from them is.

fn clone_if(s: &IfStmt) -> IfStmt {
    IfStmt { span: s.span.clone(), cond: s.cond, then_branch: s.then_branch, else_branch: s.else_branch }
}

fn clone_while(s: &WhileStmt) -> WhileStmt {
    WhileStmt { span: s.span.clone(), cond: s.cond, body: s.body }
}

fn clone_asm(s: &AsmStmt) -> AsmStmt {
    AsmStmt { span: s.span.clone(), template: s.template.clone(), constraints: s.constraints.clone(), args: s.args.clone() }
}

fn clone_unary(u: &UnaryOpExpr) -> UnaryOpExpr {
    UnaryOpExpr { op: u.op, operand: u.operand }
}

fn clone_binary(b: &BinaryOpExpr) -> BinaryOpExpr {
    BinaryOpExpr { op: b.op, lhs: b.lhs, rhs: b.rhs }
}
