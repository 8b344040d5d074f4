//! IR functions and globals: the units `CFG` owns directly (spec §3.3/§5).

use serde::{Deserialize, Serialize};
use statim_parser::Linkage;
use statim_types::{TypeId, TypeUse};

use crate::block::BasicBlock;
use crate::value::{BlockId, Constant, FunctionId, LocalId, ValueId};

/// A stack-allocated local (spec §3.3 glossary: "stack slot"). `ty` is the
/// type of the value stored there — the `Local` itself behaves as a pointer
/// to `ty` wherever it appears as a `Value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Local {
    pub id: LocalId,
    pub name: Option<String>,
    pub ty: TypeUse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Global {
    pub id: GlobalDef,
    pub name: String,
    pub ty: TypeUse,
    pub linkage: Linkage,
    pub initializer: Constant,
    /// File-scope `variable` declarations in this language are always
    /// mutable, so only string-literal-backed globals synthesized by the
    /// lowerer (spec §4.3) are read-only.
    pub read_only: bool,
}

pub type GlobalDef = crate::value::GlobalId;

/// One function: an owned list of basic blocks, each owning its own
/// instructions, plus the locals and per-function id counters the builder
/// needs (spec §3.3: "each function owns a linked list of BasicBlocks").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    /// The `Function` signature `TypeId` minted by `statim_types` for this
    /// declaration (spec §4.3 declare phase).
    pub ty: TypeId,
    pub params: Vec<TypeUse>,
    pub ret: TypeUse,
    pub linkage: Linkage,
    pub locals: Vec<Local>,
    pub blocks: Vec<BasicBlock>,
    pub entry: Option<BlockId>,

    next_value: u32,
    next_block: u32,
    next_local: u32,
}

impl Function {
    pub fn new(id: FunctionId, name: impl Into<String>, ty: TypeId, ret: TypeUse, params: Vec<TypeUse>, linkage: Linkage) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
            params,
            ret,
            linkage,
            locals: Vec::new(),
            blocks: Vec::new(),
            entry: None,
            next_value: 1,
            next_block: 0,
            next_local: 0,
        }
    }

    /// Mints a fresh, non-zero def id for an instruction result (spec §3.3:
    /// "unique non-zero result id within its function").
    pub fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    pub fn push_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.push(BasicBlock::new(id));
        if self.entry.is_none() {
            self.entry = Some(id);
        }
        id
    }

    pub fn alloc_local(&mut self, name: Option<String>, ty: TypeUse) -> LocalId {
        let id = LocalId(self.next_local);
        self.next_local += 1;
        self.locals.push(Local { id, name, ty });
        id
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.0 as usize]
    }

    /// Drops blocks with no predecessors other than the entry block — the
    /// lowerer's "discard merge-block if it has no predecessors" rule
    /// (spec §4.3), applied generically to any dead block left behind by a
    /// statement that always falls off the end (e.g. both arms of an `if`
    /// returning).
    pub fn prune_unreachable_blocks(&mut self) {
        let entry = self.entry;
        let keep: Vec<bool> = self
            .blocks
            .iter()
            .map(|b| Some(b.id) == entry || b.has_preds())
            .collect();

        if keep.iter().all(|k| *k) {
            return;
        }

        let dead: smallvec::SmallVec<[BlockId; 4]> = self
            .blocks
            .iter()
            .zip(keep.iter())
            .filter(|(_, k)| !**k)
            .map(|(b, _)| b.id)
            .collect();

        for block in &mut self.blocks {
            block.preds.retain(|p| !dead.contains(p));
            block.succs.retain(|s| !dead.contains(s));
        }

        self.blocks.retain(|b| Some(b.id) == entry || b.has_preds());
    }
}
