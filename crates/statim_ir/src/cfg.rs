//! The whole-program IR value graph (spec §3.3): the type-interning context,
//! the global table, and every function, in declaration order.

use crate::function::{Function, Global};
use crate::value::{FunctionId, GlobalId};
use statim_types::TypeContext;

/// Not `Serialize`/`Deserialize`-derived like the rest of the IR: `types`
/// owns the whole interning arena, and nothing downstream of lowering needs
/// to round-trip a `Cfg` through a wire format.
pub struct Cfg {
    pub file: String,
    pub types: TypeContext,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Cfg {
    pub fn new(file: impl Into<String>, types: TypeContext) -> Self {
        Self { file: file.into(), types, globals: Vec::new(), functions: Vec::new() }
    }

    pub fn push_global(&mut self, global: Global) -> GlobalId {
        let id = global.id;
        self.globals.push(global);
        id
    }

    pub fn push_function(&mut self, function: Function) -> FunctionId {
        let id = function.id;
        self.functions.push(function);
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0 as usize]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut Global {
        &mut self.globals[id.0 as usize]
    }

    pub fn find_function(&self, name: &str) -> Option<FunctionId> {
        self.functions.iter().find(|f| f.name == name).map(|f| f.id)
    }

    pub fn find_global(&self, name: &str) -> Option<GlobalId> {
        self.globals.iter().find(|g| g.name == name).map(|g| g.id)
    }
}
