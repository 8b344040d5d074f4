//! The IR builder: the single mutator of one `Function`'s instruction
//! streams (spec §5: "the builder mutates exactly one insertion point at a
//! time").
//!
//! Method shapes and invariants are grounded in `original_source/spbe/
//! source/graph/InstrBuilder.cpp`'s `build_*` family, adapted from
//! `assert`-on-violation to the arena/`TypeUse` discipline used throughout
//! this workspace. Each `build_*` call both appends (or prepends) the new
//! instruction at the current insertion point and returns the `Value`
//! referencing its result, so callers chain builder calls the way the
//! reference implementation's callers chain raw-pointer-returning ones.

use statim_types::{TypeContext, TypeUse};

use crate::function::Function;
use crate::instr::{FCmpOp, ICmpOp, InstrData, Instruction, Opcode};
use crate::value::{BlockId, Constant, FunctionId, Value, ValueId, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    Append,
    Prepend,
}

/// The insertion point: `(block, mode)`, changed atomically per
/// `position_at_end`/`position_at_start` call (spec §5).
pub struct Builder<'f> {
    func: &'f mut Function,
    insert: Option<BlockId>,
    mode: InsertMode,
}

impl<'f> Builder<'f> {
    pub fn new(func: &'f mut Function) -> Self {
        Self { func, insert: None, mode: InsertMode::Append }
    }

    pub fn position_at_end(&mut self, block: BlockId) {
        self.insert = Some(block);
        self.mode = InsertMode::Append;
    }

    pub fn position_at_start(&mut self, block: BlockId) {
        self.insert = Some(block);
        self.mode = InsertMode::Prepend;
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.insert
    }

    pub fn append_block(&mut self) -> BlockId {
        self.func.push_block()
    }

    fn insert_raw(&mut self, inst: Instruction) {
        let Some(block) = self.insert else { return };
        match self.mode {
            InsertMode::Append => self.func.block_mut(block).push(inst),
            InsertMode::Prepend => self.func.block_mut(block).prepend(inst),
        }
    }

    fn emit(&mut self, opcode: Opcode, result_ty: Option<TypeUse>, operands: Vec<Value>) -> Option<Value> {
        let result = result_ty.map(|_| self.func.fresh_value());
        let inst = Instruction::new(opcode, result, result_ty, operands);
        self.insert_raw(inst);
        result.zip(result_ty).map(|(id, ty)| Value::instr(id, ty))
    }

    fn void(&mut self, opcode: Opcode, operands: Vec<Value>) {
        let inst = Instruction::new(opcode, None, None, operands);
        self.insert_raw(inst);
    }

    // -- memory -------------------------------------------------------------

    pub fn build_load(&mut self, ty: TypeUse, src: Value, types: &TypeContext) -> Value {
        let align = statim_types::layout::align_of(types, ty.ty());
        self.build_aligned_load(ty, src, align)
    }

    pub fn build_aligned_load(&mut self, ty: TypeUse, src: Value, align: u32) -> Value {
        let result = self.func.fresh_value();
        let inst = Instruction::new(Opcode::Load, Some(result), Some(ty), vec![src]).with_data(InstrData::Align(align));
        self.insert_raw(inst);
        Value::instr(result, ty)
    }

    pub fn build_store(&mut self, value: Value, dst: Value, types: &TypeContext) {
        let align = statim_types::layout::align_of(types, value.ty.ty());
        self.build_aligned_store(value, dst, align);
    }

    pub fn build_aligned_store(&mut self, value: Value, dst: Value, align: u32) {
        let inst = Instruction::new(Opcode::Store, None, None, vec![value, dst]).with_data(InstrData::Align(align));
        self.insert_raw(inst);
    }

    /// `base + index * size(element)`. `ty` is the resulting pointer type.
    pub fn build_access_ptr(&mut self, ty: TypeUse, base: Value, index: Value) -> Value {
        self.emit(Opcode::AccessPtr, Some(ty), vec![base, index]).expect("AccessPtr always produces a value")
    }

    // -- control flow ---------------------------------------------------

    pub fn build_select(&mut self, cond: Value, tvalue: Value, fvalue: Value) -> Value {
        let ty = tvalue.ty;
        self.emit(Opcode::Select, Some(ty), vec![cond, tvalue, fvalue]).expect("Select always produces a value")
    }

    /// Wires `(then, else)` as the current block's successors (and the
    /// current block as a predecessor of both) before emitting the
    /// terminator, mirroring `InstrBuilder::build_brif`.
    pub fn build_branch_if(&mut self, cond: Value, void_ty: TypeUse, then_blk: BlockId, else_blk: BlockId, func_id: FunctionId) {
        if let Some(cur) = self.insert {
            self.func.block_mut(cur).succs.push(then_blk);
            self.func.block_mut(cur).succs.push(else_blk);
            self.func.block_mut(then_blk).preds.push(cur);
            self.func.block_mut(else_blk).preds.push(cur);
        }
        let then_addr = Value::constant(Constant::BlockAddress(func_id, then_blk), void_ty);
        let else_addr = Value::constant(Constant::BlockAddress(func_id, else_blk), void_ty);
        self.void(Opcode::BranchIf, vec![cond, then_addr, else_addr]);
    }

    pub fn build_jump(&mut self, dst: BlockId, void_ty: TypeUse, func_id: FunctionId) {
        if let Some(cur) = self.insert {
            self.func.block_mut(cur).succs.push(dst);
            self.func.block_mut(dst).preds.push(cur);
        }
        let addr = Value::constant(Constant::BlockAddress(func_id, dst), void_ty);
        self.void(Opcode::Jump, vec![addr]);
    }

    /// Starts a `Phi` with no incoming edges yet; use [`Builder::add_incoming`]
    /// to wire each `(predecessor, value)` pair once every branch into the
    /// owning block is known.
    pub fn build_phi(&mut self, ty: TypeUse) -> Value {
        self.emit(Opcode::Phi, Some(ty), Vec::new()).expect("Phi always produces a value")
    }

    pub fn add_incoming(&mut self, phi: Value, block: BlockId, pred: BlockId, value: Value) {
        let ValueKind::Instruction(phi_id) = phi.kind else { panic!("add_incoming target is not a Phi result") };
        let bb = self.func.block_mut(block);
        let inst = bb
            .instrs
            .iter_mut()
            .find(|i| i.opcode == Opcode::Phi && i.result == Some(phi_id))
            .expect("Phi instruction not found in the given block");
        inst.operands.push(Value::phi_operand(pred, value));
    }

    pub fn build_return(&mut self, value: Option<Value>) {
        self.void(Opcode::Return, value.into_iter().collect());
    }

    pub fn build_abort(&mut self) {
        self.void(Opcode::Abort, Vec::new());
    }

    pub fn build_unreachable(&mut self) {
        self.void(Opcode::Unreachable, Vec::new());
    }

    pub fn build_call(&mut self, ret: Option<TypeUse>, callee: Value, args: Vec<Value>) -> Option<Value> {
        let mut operands = vec![callee];
        operands.extend(args);
        self.emit(Opcode::Call, ret, operands)
    }

    // -- comparisons ----------------------------------------------------

    pub fn build_icmp(&mut self, op: ICmpOp, lhs: Value, rhs: Value, bool_ty: TypeUse) -> Value {
        self.emit(Opcode::ICmp(op), Some(bool_ty), vec![lhs, rhs]).expect("ICmp always produces a value")
    }

    pub fn build_fcmp(&mut self, op: FCmpOp, lhs: Value, rhs: Value, bool_ty: TypeUse) -> Value {
        self.emit(Opcode::FCmp(op), Some(bool_ty), vec![lhs, rhs]).expect("FCmp always produces a value")
    }

    // -- arithmetic -------------------------------------------------------

    fn binop(&mut self, opcode: Opcode, lhs: Value, rhs: Value) -> Value {
        let ty = lhs.ty;
        self.emit(opcode, Some(ty), vec![lhs, rhs]).expect("binary op always produces a value")
    }

    pub fn build_iadd(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::IAdd, lhs, rhs)
    }
    pub fn build_fadd(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::FAdd, lhs, rhs)
    }
    pub fn build_isub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::ISub, lhs, rhs)
    }
    pub fn build_fsub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::FSub, lhs, rhs)
    }
    pub fn build_smul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::SMul, lhs, rhs)
    }
    pub fn build_umul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::UMul, lhs, rhs)
    }
    pub fn build_fmul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::FMul, lhs, rhs)
    }
    pub fn build_sdiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::SDiv, lhs, rhs)
    }
    pub fn build_udiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::UDiv, lhs, rhs)
    }
    pub fn build_fdiv(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::FDiv, lhs, rhs)
    }
    pub fn build_srem(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::SRem, lhs, rhs)
    }
    pub fn build_urem(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::URem, lhs, rhs)
    }
    pub fn build_and(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::BitAnd, lhs, rhs)
    }
    pub fn build_or(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::BitOr, lhs, rhs)
    }
    pub fn build_xor(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::BitXor, lhs, rhs)
    }
    pub fn build_shl(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::Shl, lhs, rhs)
    }
    pub fn build_lshr(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::LShr, lhs, rhs)
    }
    pub fn build_ashr(&mut self, lhs: Value, rhs: Value) -> Value {
        self.binop(Opcode::AShr, lhs, rhs)
    }

    pub fn build_not(&mut self, value: Value) -> Value {
        let ty = value.ty;
        self.emit(Opcode::Not, Some(ty), vec![value]).expect("Not always produces a value")
    }
    pub fn build_ineg(&mut self, value: Value) -> Value {
        let ty = value.ty;
        self.emit(Opcode::INeg, Some(ty), vec![value]).expect("INeg always produces a value")
    }
    pub fn build_fneg(&mut self, value: Value) -> Value {
        let ty = value.ty;
        self.emit(Opcode::FNeg, Some(ty), vec![value]).expect("FNeg always produces a value")
    }

    // -- conversions ------------------------------------------------------

    fn convert(&mut self, opcode: Opcode, ty: TypeUse, value: Value) -> Value {
        self.emit(opcode, Some(ty), vec![value]).expect("conversion op always produces a value")
    }

    pub fn build_sext(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::SExt, ty, value)
    }
    pub fn build_zext(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::ZExt, ty, value)
    }
    pub fn build_fext(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::FExt, ty, value)
    }
    pub fn build_itrunc(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::ITrunc, ty, value)
    }
    pub fn build_ftrunc(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::FTrunc, ty, value)
    }
    pub fn build_si2fp(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::SI2FP, ty, value)
    }
    pub fn build_ui2fp(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::UI2FP, ty, value)
    }
    pub fn build_fp2si(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::FP2SI, ty, value)
    }
    pub fn build_fp2ui(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::FP2UI, ty, value)
    }
    pub fn build_p2i(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::P2I, ty, value)
    }
    pub fn build_i2p(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::I2P, ty, value)
    }
    pub fn build_reinterpret(&mut self, ty: TypeUse, value: Value) -> Value {
        self.convert(Opcode::Reinterpret, ty, value)
    }

    pub fn build_inline_asm(&mut self, template: String, constraints: String, args: Vec<Value>) {
        let inst =
            Instruction::new(Opcode::InlineAsm, None, None, args).with_data(InstrData::InlineAsm { template, constraints });
        self.insert_raw(inst);
    }

    /// Integer-or-pointer zero of `ty`'s width, used by implicit boolean
    /// reduction and default-initialization (spec §4.3).
    pub fn const_zero_int(ty: TypeUse) -> Value {
        Value::constant(Constant::Int(0), ty)
    }

    pub fn const_int(ty: TypeUse, value: i64) -> Value {
        Value::constant(Constant::Int(value), ty)
    }

    pub fn const_fp(ty: TypeUse, value: f64) -> Value {
        Value::constant(Constant::FP(value), ty)
    }

    pub fn const_bool(value: bool, bool_ty: TypeUse) -> Value {
        Value::constant(Constant::Int(value as i64), bool_ty)
    }

    pub fn const_null(ty: TypeUse) -> Value {
        Value::constant(Constant::Null, ty)
    }

    pub fn const_string(ty: TypeUse, s: String) -> Value {
        Value::constant(Constant::String(s), ty)
    }
}
