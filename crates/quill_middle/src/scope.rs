//! Nested lexical scopes and the symbols declared in them.
//!
//! Level 0 holds the built-ins, level 1 the globals and level 2 the
//! parameters and locals of one function. Stack addresses are computed per
//! scope on first use and recomputed after any new declaration.

use std::cell::OnceCell;
use std::collections::HashMap;

use quill_diagnostic::Location;
use quill_ir::builtins::{self, Builtin};
use quill_ir::Type;
use quill_utils::declare_key_type;
use quill_utils::keyvec::KeyVec;

declare_key_type! {
    pub struct ScopeId;
}

declare_key_type! {
    pub struct SymbolId;
}

pub const BUILTIN_LEVEL: usize = 0;
pub const GLOBAL_LEVEL: usize = 1;
pub const LOCAL_LEVEL: usize = 2;

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub scope: ScopeId,
    pub kind: SymbolKind,
    /// `None` for built-ins.
    pub location: Option<Location>,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    Constant {
        ty: Type,
        value: bool,
    },
    Variable {
        ty: Type,
    },
    Parameter {
        ty: Type,
        by_ref: bool,
    },
    Function {
        ret: Type,
        params: Vec<SymbolId>,
        scope: ScopeId,
    },
    Predefined(&'static Builtin),
}

impl Symbol {
    /// The type of the value this symbol names, if it names one.
    pub fn value_type(&self) -> Option<&Type> {
        match &self.kind {
            SymbolKind::Constant { ty, .. }
            | SymbolKind::Variable { ty }
            | SymbolKind::Parameter { ty, .. } => Some(ty),
            SymbolKind::Function { .. } | SymbolKind::Predefined(_) => None,
        }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Variable { .. } | SymbolKind::Parameter { .. }
        )
    }

    pub fn is_by_ref(&self) -> bool {
        matches!(self.kind, SymbolKind::Parameter { by_ref: true, .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    addresses: HashMap<SymbolId, i64>,
    pub locals_size: usize,
    pub params_size: usize,
}

impl Layout {
    pub fn address(&self, symbol: SymbolId) -> Option<i64> {
        self.addresses.get(&symbol).copied()
    }

    /// Address of a function's result slot, relative to its frame base.
    pub fn return_address(&self) -> i64 {
        -(self.params_size as i64) - 2
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub level: usize,
    pub symbols: Vec<SymbolId>,
    lookup: HashMap<String, SymbolId>,
    layout: OnceCell<Layout>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, level: usize) -> Self {
        Self {
            parent,
            level,
            symbols: vec![],
            lookup: HashMap::new(),
            layout: OnceCell::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scopes {
    pub scopes: KeyVec<ScopeId, Scope>,
    pub symbols: KeyVec<SymbolId, Symbol>,

    builtins: ScopeId,
    global: ScopeId,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    /// A global scope whose parent holds `true`, `false` and the built-in functions.
    pub fn new() -> Self {
        let mut scopes = KeyVec::new();
        let builtin_scope = scopes.insert(Scope::new(None, BUILTIN_LEVEL));
        let global = scopes.insert(Scope::new(Some(builtin_scope), GLOBAL_LEVEL));

        let mut this = Self {
            scopes,
            symbols: KeyVec::new(),

            builtins: builtin_scope,
            global,
        };

        for (name, value) in [("true", true), ("false", false)] {
            let kind = SymbolKind::Constant {
                ty: Type::Bool,
                value,
            };
            this.insert(builtin_scope, name, kind, None);
        }

        for builtin in builtins::BUILTINS {
            this.insert(builtin_scope, builtin.name, SymbolKind::Predefined(builtin), None);
        }

        this
    }

    pub fn builtins(&self) -> ScopeId {
        self.builtins
    }

    pub fn global(&self) -> ScopeId {
        self.global
    }

    pub fn push_scope(&mut self, parent: ScopeId) -> ScopeId {
        let level = self.scopes[parent].level + 1;
        self.scopes.insert(Scope::new(Some(parent), level))
    }

    /// Declares `name` in `scope`. Returns `None` if the scope already declares it.
    pub fn insert(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: SymbolKind,
        location: Option<Location>,
    ) -> Option<SymbolId> {
        if self.scopes[scope].lookup.contains_key(name) {
            return None;
        }

        let id = self.symbols.insert(Symbol {
            name: name.to_owned(),
            scope,
            kind,
            location,
        });

        let scope = &mut self.scopes[scope];
        scope.symbols.push(id);
        scope.lookup.insert(name.to_owned(), id);
        scope.layout.take();

        Some(id)
    }

    /// Replaces the kind of an existing symbol, e.g. to record an inferred type.
    pub fn update(&mut self, symbol: SymbolId, kind: SymbolKind) {
        let scope = self.symbols[symbol].scope;
        self.symbols[symbol].kind = kind;
        self.scopes[scope].layout.take();
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope].lookup.get(name).copied()
    }

    /// Resolves `name` innermost scope first.
    pub fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<SymbolId> {
        loop {
            if let Some(symbol) = self.lookup_local(scope, name) {
                return Some(symbol);
            }
            scope = self.scopes[scope].parent?;
        }
    }

    pub fn symbol(&self, symbol: SymbolId) -> &Symbol {
        &self.symbols[symbol]
    }

    pub fn level_of(&self, symbol: SymbolId) -> usize {
        self.scopes[self.symbols[symbol].scope].level
    }

    pub fn layout(&self, scope: ScopeId) -> &Layout {
        let scope = &self.scopes[scope];
        scope
            .layout
            .get_or_init(|| compute_layout(&self.symbols, &scope.symbols))
    }

    /// The stack address of a variable or parameter: absolute for globals,
    /// relative to the frame base otherwise.
    pub fn address(&self, symbol: SymbolId) -> Option<i64> {
        self.layout(self.symbols[symbol].scope).address(symbol)
    }
}

fn compute_layout(symbols: &KeyVec<SymbolId, Symbol>, in_scope: &[SymbolId]) -> Layout {
    let mut layout = Layout::default();

    let params: Vec<SymbolId> = in_scope
        .iter()
        .copied()
        .filter(|&id| matches!(symbols[id].kind, SymbolKind::Parameter { .. }))
        .collect();

    // every parameter takes one cell: a value or an address
    layout.params_size = params.len();
    for (i, &id) in params.iter().enumerate() {
        let address = i as i64 - layout.params_size as i64 - 1;
        layout.addresses.insert(id, address);
    }

    let mut next = 1;
    for &id in in_scope {
        if let SymbolKind::Variable { ty } = &symbols[id].kind {
            layout.addresses.insert(id, next as i64);
            next += ty.cells();
        }
    }
    layout.locals_size = next - 1;

    layout
}
