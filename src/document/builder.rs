//! Builds and incrementally updates a document's [`DependencyGraph`].
//!
//! Every build or update runs in two phases. *Discovery* records, per
//! statement, which bindings it references and which binding it defines.
//! *Wiring* then visits only the bindings touched by discovery and decides
//! which statement actively defines each one. It keeps the shadowed
//! statements around in the navigation graph and links a use-site binding to
//! the outer scope that provides it when no local statement does. The
//! resulting binding changes are handed back to the caller, which owns the
//! scope tables.
use super::graph::{BindingId, BindingKind, DependencyGraph, EdgeKind, GraphKey, StatementId};
use super::topology::dependents_of;
use crate::ast::Node;
use crate::scope::ScopeRegistry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// What the caller must do to its scope tables after a build or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChange {
    /// `statement` is now the active definition of `binding`.
    Set { binding: BindingId, statement: StatementId },
    /// No statement in the document defines `binding` any more.
    Remove { binding: BindingId },
}

/// Result of a graph build or update.
#[derive(Debug, Clone, Default)]
pub struct GraphDelta {
    /// Every key that must be re-evaluated: the edited statement, whatever
    /// depended on it before the edit and whatever depends on it after.
    pub keys: BTreeSet<GraphKey>,
    /// Set when the edit introduced a binding the document had never seen,
    /// or touched a unit definition. Line-level bookkeeping is then unsafe
    /// until the whole document is parsed again.
    pub document_needs_reparse: Option<BindingId>,
    pub changes: Vec<BindingChange>,
    /// Statements this update removed from the execution graph as obsolete.
    pub dropped: BTreeSet<StatementId>,
}

impl GraphDelta {
    pub fn statements(&self) -> impl Iterator<Item = &StatementId> + '_ {
        self.keys.iter().filter_map(GraphKey::as_statement)
    }
}

/// The binding a statement defines, if any.
pub fn definition_binding(node: &Node) -> Option<BindingId> {
    if let Some((name, scope)) = node.defined_variable() {
        return Some(BindingId::variable(scope, name));
    }
    node.defined_unit().map(|(name, scope)| BindingId::unit(scope, name))
}

pub struct GraphBuilder<'g> {
    graph: &'g mut DependencyGraph,
    scopes: &'g ScopeRegistry,
    overwrite: bool,
    defs: BTreeMap<BindingId, BTreeSet<StatementId>>,
    refs: BTreeMap<BindingId, BTreeSet<StatementId>>,
    stale: BTreeSet<BindingId>,
    reactivated: BTreeSet<StatementId>,
    dropped: BTreeSet<StatementId>,
    changes: Vec<BindingChange>,
}

impl<'g> GraphBuilder<'g> {
    /// `overwrite` selects REPL semantics: shadowed definitions leave the
    /// execution graph entirely instead of staying as dead nodes.
    pub fn new(graph: &'g mut DependencyGraph, scopes: &'g ScopeRegistry, overwrite: bool) -> Self {
        Self {
            graph,
            scopes,
            overwrite,
            defs: BTreeMap::new(),
            refs: BTreeMap::new(),
            stale: BTreeSet::new(),
            reactivated: BTreeSet::new(),
            dropped: BTreeSet::new(),
            changes: Vec::new(),
        }
    }

    /// Builds the graphs for a whole document. The graph is expected to be
    /// empty; statements must be given in written order.
    pub fn build_initial_graph(mut self, statements: &[(StatementId, Arc<Node>)]) -> GraphDelta {
        for (id, node) in statements {
            self.discover(id, node);
        }
        self.wire();
        debug!(
            statements = statements.len(),
            nodes = self.graph.execution.node_count(),
            edges = self.graph.execution.edge_count(),
            "Built dependency graph"
        );
        GraphDelta {
            keys: self.graph.execution.keys().cloned().collect(),
            document_needs_reparse: None,
            changes: self.changes,
            dropped: self.dropped,
        }
    }

    /// Replaces statement `id`'s node `old` with `new`. `None` on the old side
    /// is an insertion, on the new side a removal.
    pub fn update_graph(mut self, id: &StatementId, old: Option<&Arc<Node>>, new: Option<&Arc<Node>>) -> GraphDelta {
        let key = GraphKey::from(id.clone());
        let old_def = old.and_then(|n| definition_binding(n));
        let new_def = new.and_then(|n| definition_binding(n));

        let mut reparse = new_def
            .as_ref()
            .filter(|b| !self.graph.navigation.contains(&GraphKey::from((*b).clone())))
            .cloned();
        let touches_unit = old.into_iter().chain(new).any(|n| n.defined_unit().is_some());
        if touches_unit && reparse.is_none() {
            reparse = new_def.clone().or_else(|| old_def.clone());
        }

        let mut keys = BTreeSet::new();
        if old.is_some() && (new.is_none() || old_def != new_def) {
            // Capture the cascade before the statement's edges disappear.
            keys.extend(dependents_of(&self.graph.execution, &[key.clone()]));
            self.graph.execution.remove_node(&key);
            self.graph.navigation.remove_node(&key);
            if let Some(binding) = old_def {
                self.stale.insert(binding);
            }
        } else {
            self.graph.execution.remove_outgoing(&key, &[EdgeKind::References]);
            self.graph.navigation.remove_outgoing(&key, &[EdgeKind::References]);
        }

        if let Some(node) = new {
            self.discover(id, node);
        }
        self.wire();

        keys.insert(key.clone());
        let mut starts = vec![key];
        starts.extend(self.reactivated.iter().cloned().map(GraphKey::from));
        keys.extend(dependents_of(&self.graph.execution, &starts));

        debug!(statement = %id, cascade = keys.len(), reparse = ?reparse, "Updated dependency graph");
        GraphDelta { keys, document_needs_reparse: reparse, changes: self.changes, dropped: self.dropped }
    }

    fn discover(&mut self, id: &StatementId, node: &Arc<Node>) {
        let statement = GraphKey::from(id.clone());
        self.graph.execution.ensure_node(&statement);
        self.graph.navigation.ensure_node(&statement);
        if !node.is_parseable() {
            return;
        }

        for (name, scope) in node.identifiers() {
            let binding = BindingId::variable(scope, name);
            let target = GraphKey::from(binding.clone());
            self.graph.execution.add_edge(&statement, &target, EdgeKind::References);
            self.graph.navigation.add_edge(&statement, &target, EdgeKind::References);
            self.refs.entry(binding).or_default().insert(id.clone());
        }

        if let Some(binding) = definition_binding(node) {
            let source = GraphKey::from(binding.clone());
            // Wiring decides which candidate the execution graph sees.
            self.graph.navigation.add_edge(&source, &statement, EdgeKind::Defines);
            self.graph.execution.ensure_node(&source);
            self.defs.entry(binding).or_default().insert(id.clone());
        }
    }

    fn wire(&mut self) {
        let touched: BTreeSet<BindingId> = self
            .defs
            .keys()
            .chain(self.refs.keys())
            .chain(self.stale.iter())
            .cloned()
            .collect();
        for binding in &touched {
            self.wire_binding(binding);
        }
    }

    fn wire_binding(&mut self, binding: &BindingId) {
        let key = GraphKey::from(binding.clone());
        let candidates: Vec<StatementId> = self
            .graph
            .navigation
            .outgoing(&key, &[EdgeKind::Defines, EdgeKind::Obsolete])
            .into_iter()
            .filter_map(|k| k.as_statement().cloned())
            .collect();
        match candidates.last() {
            Some(active) => {
                let active = active.clone();
                self.activate(binding, &key, &active, &candidates);
            }
            None => self.inherit(binding, &key),
        }
    }

    /// Wires `active` as the definition of `binding`; the remaining candidates
    /// become obsolete.
    fn activate(&mut self, binding: &BindingId, key: &GraphKey, active: &StatementId, candidates: &[StatementId]) {
        let active_key = GraphKey::from(active.clone());
        if !self.graph.execution.contains(&active_key) {
            // Dropped earlier as obsolete; restore its references.
            self.graph.execution.ensure_node(&active_key);
            for dependency in self.graph.navigation.outgoing(&active_key, &[EdgeKind::References]) {
                self.graph.execution.add_edge(&active_key, &dependency, EdgeKind::References);
            }
            self.reactivated.insert(active.clone());
            self.dropped.remove(active);
        }

        self.graph.execution.remove_outgoing(key, &[EdgeKind::Defines, EdgeKind::Inherits]);
        self.graph.execution.add_edge(key, &active_key, EdgeKind::Defines);
        self.graph
            .navigation
            .remove_outgoing(key, &[EdgeKind::Defines, EdgeKind::Obsolete, EdgeKind::Inherits]);

        for candidate in candidates {
            let candidate_key = GraphKey::from(candidate.clone());
            if candidate == active {
                self.graph.navigation.add_edge(key, &candidate_key, EdgeKind::Defines);
                continue;
            }
            self.graph.navigation.add_edge(key, &candidate_key, EdgeKind::Obsolete);
            if self.overwrite && self.graph.execution.remove_node(&candidate_key) {
                self.dropped.insert(candidate.clone());
            }
        }

        self.changes.push(BindingChange::Set { binding: binding.clone(), statement: active.clone() });
    }

    /// No statement defines `binding`: fall back to whichever outer scope
    /// provides the name.
    fn inherit(&mut self, binding: &BindingId, key: &GraphKey) {
        let was_stale = self.stale.contains(binding);
        assert!(
            !self.defs.contains_key(binding) || was_stale,
            "binding {} was defined in this update but has no defining statement",
            binding
        );

        if binding.kind == BindingKind::Variable {
            let owns = self.scopes.get(binding.scope).variable(&binding.identifier).is_some();
            if owns && !was_stale {
                return;
            }
            self.graph.execution.remove_outgoing(key, &[EdgeKind::Inherits]);
            self.graph.navigation.remove_outgoing(key, &[EdgeKind::Inherits]);
            if let Some(outer) = self.scopes.find_outer_scope_with_variable(binding.scope, &binding.identifier) {
                let outer_key = GraphKey::from(BindingId::variable(outer, &binding.identifier));
                self.graph.execution.add_edge(key, &outer_key, EdgeKind::Inherits);
                self.graph.navigation.add_edge(key, &outer_key, EdgeKind::Inherits);
            }
        }

        if was_stale {
            self.changes.push(BindingChange::Remove { binding: binding.clone() });
        }
    }
}
