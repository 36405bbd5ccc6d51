//! Lexically nested name -> symbol scopes. This is the *static* counterpart of the
//! interpreter's runtime `Environment`: same nesting shape, resolved once
//! during binding rather than re-walked on every evaluation.

use rustc_hash::FxHashMap;
use tsz_common::Atom;

use crate::symbol::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    Block,
    Class,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    symbols: FxHashMap<Atom, SymbolId>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Scope {
            kind,
            parent,
            symbols: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn get_own(&self, name: Atom) -> Option<SymbolId> {
        self.symbols.get(&name).copied()
    }

    pub fn declare_own(&mut self, name: Atom, id: SymbolId) {
        self.symbols.insert(name, id);
    }
}

/// Arena of `Scope`s addressed by `ScopeId`, mirroring `tsz-parser`'s
/// `NodeArena`/`NodeIndex` idiom.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    #[must_use]
    pub fn new() -> Self {
        ScopeArena::default()
    }

    pub fn push(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("scope arena overflow"));
        self.scopes.push(Scope::new(kind, parent));
        id
    }

    #[must_use]
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// Walk outward from `scope` through `parent` links looking for `name`.
    #[must_use]
    pub fn resolve(&self, scope: ScopeId, name: Atom) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(sym) = s.get_own(name) {
                return Some(sym);
            }
            current = s.parent;
        }
        None
    }

    /// Nearest enclosing scope of kind `Function`, `Global`, or `Module`
    /// (where `var` declarations hoist to).
    #[must_use]
    pub fn nearest_var_scope(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        loop {
            let s = self.get(current);
            match s.kind {
                ScopeKind::Function | ScopeKind::Global | ScopeKind::Module => return current,
                _ => match s.parent {
                    Some(p) => current = p,
                    None => return current,
                },
            }
        }
    }
}
