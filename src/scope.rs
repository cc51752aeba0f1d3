//! Lexically nested symbol tables for variables and units.
//!
//! Scopes live in a [`ScopeRegistry`] arena and refer to each other by
//! [`ScopeId`]. Lookups search the scope itself, then its includes
//! (depth-first, own bindings only, never revisiting a scope), then the parent.
use crate::ast::Node;
use crate::units::{NamedUnit, UnitCatalog, UnitOrdinals, UnitsTable};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct Scope {
    id: ScopeId,
    label: String,
    parent: Option<ScopeId>,
    /// Identifier -> its active `VariableDefinition` node.
    variables: HashMap<String, Arc<Node>>,
    units: UnitsTable,
    includes: Vec<(String, ScopeId)>,
    children: u32,
}

impl Scope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn variable(&self, name: &str) -> Option<&Arc<Node>> {
        self.variables.get(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.keys().map(String::as_str)
    }

    pub fn units(&self) -> &UnitsTable {
        &self.units
    }

    pub fn includes(&self) -> &[(String, ScopeId)] {
        &self.includes
    }
}

#[derive(Debug)]
pub struct ScopeRegistry {
    scopes: Vec<Scope>,
    /// Shared by every scope's unit table.
    ordinals: UnitOrdinals,
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeRegistry {
    pub fn new() -> Self {
        let ordinals = UnitOrdinals::default();
        let root = Scope {
            id: ScopeId(0),
            label: "root".to_string(),
            units: UnitsTable::with_ordinals(ordinals.clone()),
            ..Scope::default()
        };
        Self { scopes: vec![root], ordinals }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// A genuinely new child scope. Its label is `parent/label`, or
    /// `parent/<n>` with a per-parent counter when no label is given.
    pub fn new_scope(&mut self, parent: ScopeId, label: Option<&str>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        let parent_scope = &mut self.scopes[parent.index()];
        parent_scope.children += 1;
        let suffix = match label {
            Some(label) => label.to_string(),
            None => parent_scope.children.to_string(),
        };
        let label = format!("{}/{}", parent_scope.label, suffix);
        let units = UnitsTable::with_ordinals(self.ordinals.clone());
        self.scopes.push(Scope { id, label, parent: Some(parent), units, ..Scope::default() });
        id
    }

    /// Resets a scope to empty while keeping its identity, parent and
    /// includes, so graphs keyed by its id stay meaningful.
    pub fn fresh(&mut self, id: ScopeId) {
        let scope = &mut self.scopes[id.index()];
        scope.variables.clear();
        scope.units = UnitsTable::with_ordinals(self.ordinals.clone());
    }

    pub fn clear_variables(&mut self, id: ScopeId) {
        self.scopes[id.index()].variables.clear();
    }

    pub fn add_include(&mut self, scope: ScopeId, name: &str, included: ScopeId) {
        let includes = &mut self.scopes[scope.index()].includes;
        includes.retain(|(n, _)| n != name);
        includes.push((name.to_string(), included));
    }

    pub fn find_include(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.lookup_order(scope)
            .into_iter()
            .find_map(|id| self.get(id).includes.iter().find(|(n, _)| n == name).map(|(_, s)| *s))
    }

    /// Scopes in lookup order: self, includes depth-first, then the parent's
    /// own lookup order.
    pub fn lookup_order(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            self.collect_with_includes(id, &mut seen, &mut order);
            current = self.get(id).parent;
        }
        order
    }

    fn collect_with_includes(&self, id: ScopeId, seen: &mut HashSet<ScopeId>, order: &mut Vec<ScopeId>) {
        if !seen.insert(id) {
            return;
        }
        order.push(id);
        for (_, included) in &self.get(id).includes {
            self.collect_with_includes(*included, seen, order);
        }
    }

    pub fn find_scope_with_variable(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.lookup_order(scope).into_iter().find(|id| self.get(*id).variables.contains_key(name))
    }

    pub fn find_variable(&self, scope: ScopeId, name: &str) -> Option<&Arc<Node>> {
        let owner = self.find_scope_with_variable(scope, name)?;
        self.get(owner).variables.get(name)
    }

    /// Like [`Self::find_scope_with_variable`] but ignores `scope`'s own table.
    pub fn find_outer_scope_with_variable(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.lookup_order(scope)
            .into_iter()
            .skip(1)
            .find(|id| self.get(*id).variables.contains_key(name))
    }

    pub fn find_scope_with_unit(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        self.lookup_order(scope).into_iter().find(|id| self.get(*id).units.contains(name))
    }

    pub fn find_unit(&self, scope: ScopeId, name: &str) -> Option<Arc<NamedUnit>> {
        let owner = self.find_scope_with_unit(scope, name)?;
        self.get(owner).units.get(name)
    }

    pub fn set_variable(&mut self, scope: ScopeId, name: &str, definition: Arc<Node>) {
        self.scopes[scope.index()].variables.insert(name.to_string(), definition);
    }

    pub fn remove_variable(&mut self, scope: ScopeId, name: &str) -> Option<Arc<Node>> {
        self.scopes[scope.index()].variables.remove(name)
    }

    pub fn units_mut(&mut self, scope: ScopeId) -> &mut UnitsTable {
        &mut self.scopes[scope.index()].units
    }

    /// Every unit and scheme visible from `scope`; inner definitions shadow
    /// outer ones of the same name.
    pub fn catalog(&self, scope: ScopeId) -> UnitCatalog {
        let mut catalog = UnitCatalog::new();
        for id in self.lookup_order(scope) {
            let units = &self.get(id).units;
            catalog.extend(units.units(), units.schemes());
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeId, NodeKind};

    fn definition(id: u32, value: f64) -> Arc<Node> {
        Arc::new(Node::new(NodeId(id), NodeKind::Number { value, unit_literal: None }))
    }

    #[test]
    fn test_lookup_prefers_self_then_includes_then_parent() {
        let mut reg = ScopeRegistry::new();
        let root = reg.root();
        let doc = reg.new_scope(root, Some("doc"));
        let lib = reg.new_scope(root, Some("lib"));
        reg.add_include(doc, "lib", lib);

        reg.set_variable(root, "x", definition(1, 1.0));
        reg.set_variable(lib, "x", definition(2, 2.0));
        assert_eq!(reg.find_scope_with_variable(doc, "x"), Some(lib));

        reg.set_variable(doc, "x", definition(3, 3.0));
        assert_eq!(reg.find_scope_with_variable(doc, "x"), Some(doc));
        assert_eq!(reg.find_outer_scope_with_variable(doc, "x"), Some(lib));
        assert_eq!(reg.find_variable(doc, "x").map(|n| n.id), Some(NodeId(3)));
        assert_eq!(reg.get(doc).label(), "root/doc");
    }

    #[test]
    fn test_include_cycles_terminate() {
        let mut reg = ScopeRegistry::new();
        let root = reg.root();
        let a = reg.new_scope(root, None);
        let b = reg.new_scope(root, None);
        reg.add_include(a, "b", b);
        reg.add_include(b, "a", a);
        assert_eq!(reg.lookup_order(a), vec![a, b, root]);
        assert_eq!(reg.find_variable(a, "missing"), None);
        assert_eq!(reg.get(a).label(), "root/1");
        assert_eq!(reg.get(b).label(), "root/2");
    }

    #[test]
    fn test_included_scope_parents_are_not_searched() {
        let mut reg = ScopeRegistry::new();
        let root = reg.root();
        let lib_parent = reg.new_scope(root, Some("libs"));
        let lib = reg.new_scope(lib_parent, Some("lib"));
        let doc = reg.new_scope(root, Some("doc"));
        reg.add_include(doc, "lib", lib);
        reg.set_variable(lib_parent, "hidden", definition(1, 1.0));
        assert_eq!(reg.find_scope_with_variable(doc, "hidden"), None);
        assert_eq!(reg.find_include(doc, "lib"), Some(lib));
    }

    #[test]
    fn test_fresh_keeps_identity() {
        let mut reg = ScopeRegistry::new();
        let root = reg.root();
        let doc = reg.new_scope(root, Some("doc"));
        let lib = reg.new_scope(root, Some("lib"));
        reg.add_include(doc, "lib", lib);
        reg.set_variable(doc, "x", definition(1, 1.0));
        reg.units_mut(doc).add_base_unit("m", "Length");

        reg.fresh(doc);
        let scope = reg.get(doc);
        assert_eq!(scope.id(), doc);
        assert!(scope.variable("x").is_none());
        assert!(scope.units().is_empty());
        assert_eq!(scope.includes().len(), 1);
    }

    #[test]
    fn test_units_resolve_through_chain() {
        let mut reg = ScopeRegistry::new();
        let root = reg.root();
        reg.units_mut(root).add_base_unit("m", "Length");
        let doc = reg.new_scope(root, None);
        reg.units_mut(doc).add_base_unit("furlong", "Length");
        assert_eq!(reg.find_scope_with_unit(doc, "m"), Some(root));
        assert!(reg.find_unit(root, "furlong").is_none());
        assert_eq!(reg.catalog(doc).units().len(), 2);
    }

    #[test]
    fn test_unit_ordinals_are_per_registry() {
        let declare = || {
            let mut reg = ScopeRegistry::new();
            let root = reg.root();
            let m = reg.units_mut(root).add_base_unit("m", "Length");
            let doc = reg.new_scope(root, None);
            let furlong = reg.units_mut(doc).add_base_unit("furlong", "Length");
            reg.fresh(doc);
            let again = reg.units_mut(doc).add_base_unit("furlong", "Length");
            (m.ordinal(), furlong.ordinal(), again.ordinal())
        };
        assert_eq!(declare(), (0, 1, 2));
        assert_eq!(declare(), declare());
    }
}
