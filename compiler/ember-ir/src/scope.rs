use ember_diagnostics::ice;
use ember_span::Span;
use std::collections::BTreeMap;

/// Handle to a [`BlockContext`] in a [`ScopeArena`].
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub usize);

/// Handle to a local binding in a [`ScopeArena`].
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub usize);

/// One lexical scope.
///
/// The parent is an index into the owning arena rather than a reference, so scopes can be created
/// and looked up freely while the executable that owns them is being built.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct BlockContext {
    pub parent: Option<ScopeId>,
    /// Code in a compile-time scope, and in every scope below it, must fold completely.
    pub comptime: bool,
    names: BTreeMap<String, LocalId>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrLocalStorage {
    /// The local lives in SSA values and is rebound on assignment.
    Value,
    /// The local has its address taken and lives in memory.
    Memory,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone)]
pub struct IrLocal {
    pub name: String,
    pub mutable: bool,
    pub storage: IrLocalStorage,
    pub span: Span,
}

/// Arena of the scopes and locals of one executable.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    scopes: Vec<BlockContext>,
    locals: Vec<IrLocal>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            locals: Vec::new(),
        }
    }

    /// Create a scope without a parent.
    pub fn new_root(&mut self, comptime: bool) -> ScopeId {
        self.push(BlockContext {
            parent: None,
            comptime,
            names: BTreeMap::new(),
        })
    }

    /// Create a scope nested in `parent`.
    pub fn new_child(&mut self, parent: ScopeId, comptime: bool) -> ScopeId {
        self.push(BlockContext {
            parent: Some(parent),
            comptime,
            names: BTreeMap::new(),
        })
    }

    fn push(&mut self, scope: BlockContext) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(scope);
        id
    }

    pub fn get(&self, scope: ScopeId) -> &BlockContext {
        self.scopes
            .get(scope.0)
            .unwrap_or_else(|| ice!(format!("scope {} does not exist", scope.0)))
    }

    pub fn local(&self, local: LocalId) -> &IrLocal {
        self.locals
            .get(local.0)
            .unwrap_or_else(|| ice!(format!("local {} does not exist", local.0)))
    }

    /// Declare a local in `scope`, shadowing any binding of the same name.
    pub fn declare(&mut self, scope: ScopeId, local: IrLocal) -> LocalId {
        let id = LocalId(self.locals.len());
        let name = local.name.clone();
        self.locals.push(local);
        match self.scopes.get_mut(scope.0) {
            Some(s) => s.names.insert(name, id),
            None => ice!(format!("scope {} does not exist", scope.0)),
        };
        id
    }

    /// Find the nearest binding of `name`, walking up the parent chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<LocalId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if let Some(local) = scope.names.get(name) {
                return Some(*local);
            }
            current = scope.parent;
        }
        None
    }

    /// Determine if `scope` or any of its ancestors is a compile-time scope.
    pub fn is_comptime(&self, scope: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if scope.comptime {
                return true;
            }
            current = scope.parent;
        }
        false
    }

    /// Get every binding visible from `scope`, with shadowed bindings omitted.
    pub fn visible_locals(&self, scope: ScopeId) -> Vec<LocalId> {
        let mut seen = BTreeMap::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            for (name, local) in &scope.names {
                seen.entry(name.as_str()).or_insert(*local);
            }
            current = scope.parent;
        }
        let mut locals = seen.into_values().collect::<Vec<_>>();
        locals.sort();
        locals
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::{IrLocal, IrLocalStorage, ScopeArena};
    use ember_macros::{assert_none, assert_some};
    use ember_span::Span;

    fn local(name: &str) -> IrLocal {
        IrLocal {
            name: name.to_string(),
            mutable: false,
            storage: IrLocalStorage::Value,
            span: Span::empty(),
        }
    }

    #[test]
    fn test_lookup_walks_parent_chain_and_shadows() {
        let mut arena = ScopeArena::new();
        let root = arena.new_root(false);
        let outer_x = arena.declare(root, local("x"));
        let child = arena.new_child(root, false);
        assert_eq!(assert_some!(arena.lookup(child, "x")), outer_x);
        let inner_x = arena.declare(child, local("x"));
        assert_eq!(assert_some!(arena.lookup(child, "x")), inner_x);
        assert_eq!(assert_some!(arena.lookup(root, "x")), outer_x);
        assert_none!(arena.lookup(child, "y"));
        assert_eq!(arena.visible_locals(child), vec![inner_x]);
    }

    #[test]
    fn test_comptime_is_inherited() {
        let mut arena = ScopeArena::new();
        let root = arena.new_root(false);
        let comptime = arena.new_child(root, true);
        let nested = arena.new_child(comptime, false);
        assert!(!arena.is_comptime(root));
        assert!(arena.is_comptime(comptime));
        assert!(arena.is_comptime(nested));
        assert_eq!(arena.len(), 3);
    }
}
