use std::collections::HashMap;

use crate::source::Span;
use crate::value::{Kind, SymbolId, Value};

/// Interned symbol table. Each unique symbol name maps to a unique SymbolId,
/// so comparing ids is comparing names.
pub struct SymbolTable {
    name_to_id: HashMap<String, SymbolId>,
    id_to_name: Vec<String>,
}

/// Well-known symbol IDs, pre-interned at startup.
/// These must match the order of interning in SymbolTable::new().
pub mod sym {
    use crate::value::SymbolId;

    pub const QUOTE: SymbolId = SymbolId(0);
}

impl SymbolTable {
    /// Create a new symbol table with all well-known symbols pre-interned.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            name_to_id: HashMap::new(),
            id_to_name: Vec::new(),
        };
        for name in ["quote"] {
            table.intern(name);
        }
        table
    }

    /// Intern a symbol name. Returns the existing ID if already interned,
    /// or creates a new one.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = SymbolId(self.id_to_name.len() as u32);
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.push(name.to_string());
        id
    }

    /// Build the value a name denotes. `nil` and `t` are never symbols:
    /// they become the Nil and True markers.
    pub fn make(&mut self, name: &str, span: Span) -> Value {
        match name {
            "nil" => Value::nil(span),
            "t" => Value::truth(span),
            _ => Value::new(Kind::Symbol(self.intern(name)), span),
        }
    }

    /// Look up a symbol name by its ID.
    pub fn name(&self, id: SymbolId) -> &str {
        &self.id_to_name[id.0 as usize]
    }

    /// Look up a symbol ID by name, without interning.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.name_to_id.get(name).copied()
    }

    /// Total number of interned symbols.
    pub fn count(&self) -> usize {
        self.id_to_name.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
