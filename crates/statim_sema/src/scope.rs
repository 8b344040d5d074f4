//! A single-pass scope stack: file scope (functions, global variables)
//! with a function scope (parameters) and nested block scopes (locals)
//! pushed on top, each shadowing outer bindings of the same name.

use hashbrown::HashMap;
use statim_parser::DeclId;

#[derive(Default)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, DeclId>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { frames: vec![HashMap::new()] }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn define(&mut self, name: impl Into<String>, id: DeclId) {
        self.frames.last_mut().expect("scope stack is never empty").insert(name.into(), id);
    }

    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        self.frames.iter().rev().find_map(|frame| frame.get(name).copied())
    }
}
