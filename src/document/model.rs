//! A document: ordered statements, their dependency graph and the scope their
//! definitions live in.
use super::builder::{BindingChange, GraphBuilder, GraphDelta};
use super::graph::{BindingId, BindingKind, DependencyGraph, EdgeKind, GraphKey, StatementId};
use super::statement::{Position, Statement};
use super::topology::{dependents_of, order_of, overall_order};
use crate::ast::{parse_document, Node, NodeId, ParsedLine, Parser};
use crate::environment::Environment;
use crate::error::DocumentError;
use crate::evaluate::{evaluate_node_with, Evaluation, KnownDefinitions};
use crate::scope::ScopeId;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// How far the graph and the statements' line bookkeeping can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentState {
    /// Consistent with the current text.
    Ok,
    /// Bindings are valid but other statements' positions may be stale.
    Unknown,
    /// A reparse and batch update are required before further interactive
    /// updates can be trusted.
    Invalid,
}

#[derive(Debug)]
pub struct DocumentModel {
    id: String,
    scope: ScopeId,
    graph: DependencyGraph,
    statements: HashMap<StatementId, Statement>,
    ids_in_written_order: Vec<StatementId>,
    state: DocumentState,
    last_updated: Vec<StatementId>,
    next_seq: u64,
}

impl DocumentModel {
    /// A new, empty document with its own scope under the root scope.
    pub fn new(env: &mut Environment, id: &str) -> Self {
        let root = env.scopes.root();
        let scope = env.scopes.new_scope(root, Some(id));
        Self::with_scope(id, scope)
    }

    pub fn with_scope(id: &str, scope: ScopeId) -> Self {
        Self {
            id: id.to_string(),
            scope,
            graph: DependencyGraph::new(),
            statements: HashMap::new(),
            ids_in_written_order: Vec::new(),
            state: DocumentState::Ok,
            last_updated: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn ids(&self) -> &[StatementId] {
        &self.ids_in_written_order
    }

    pub fn statement(&self, id: &StatementId) -> Option<&Statement> {
        self.statements.get(id)
    }

    /// Statements in written order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> + '_ {
        self.ids_in_written_order.iter().filter_map(|id| self.statements.get(id))
    }

    /// The statements re-evaluated by the latest interactive update.
    pub fn last_updated(&self) -> &[StatementId] {
        &self.last_updated
    }

    fn next_id(&mut self) -> StatementId {
        self.next_seq += 1;
        StatementId(format!("{}:{:06}", self.id, self.next_seq))
    }

    /// Replaces the whole document with `nodes`, already parsed into this
    /// document's scope. Returns the statement ids in evaluation order.
    pub fn batch_update(&mut self, env: &mut Environment, nodes: Vec<Arc<Node>>) -> Vec<StatementId> {
        let mut offset = 0;
        let entries = nodes
            .into_iter()
            .enumerate()
            .map(|(idx, node)| {
                let len = node.to_string().len();
                let position = Position {
                    document_id: self.id.clone(),
                    line_first: idx + 1,
                    line_last: idx + 1,
                    offset_first: offset,
                    offset_last: offset + len,
                };
                offset += len + 1;
                (node, position)
            })
            .collect();
        self.rebuild(env, entries)
    }

    pub fn batch_update_lines(&mut self, env: &mut Environment, lines: Vec<ParsedLine>) -> Vec<StatementId> {
        let entries = lines
            .into_iter()
            .map(|line| {
                let position = Position {
                    document_id: self.id.clone(),
                    line_first: line.line,
                    line_last: line.line,
                    offset_first: line.offset_first,
                    offset_last: line.offset_last,
                };
                (line.node, position)
            })
            .collect();
        self.rebuild(env, entries)
    }

    /// Parses `text` into a freshly emptied scope and batch-updates from it.
    pub fn load_text(&mut self, env: &mut Environment, text: &str) -> Vec<StatementId> {
        env.scopes.fresh(self.scope);
        let lines = parse_document(env, self.scope, text);
        self.batch_update_lines(env, lines)
    }

    fn rebuild(&mut self, env: &mut Environment, entries: Vec<(Arc<Node>, Position)>) -> Vec<StatementId> {
        env.scopes.clear_variables(self.scope);
        self.graph = DependencyGraph::new();
        self.statements.clear();
        self.ids_in_written_order.clear();
        self.last_updated.clear();

        let mut nodes = Vec::with_capacity(entries.len());
        for (node, position) in entries {
            let id = self.next_id();
            nodes.push((id.clone(), node.clone()));
            self.statements.insert(id.clone(), Statement::new(id.clone(), node, self.scope, position));
            self.ids_in_written_order.push(id);
        }

        let overwrite = env.prefs.overwrite_existing_definitions;
        let delta = GraphBuilder::new(&mut self.graph, &env.scopes, overwrite).build_initial_graph(&nodes);
        self.apply_changes(env, &delta.changes);

        let order: Vec<StatementId> = overall_order(&self.graph.execution)
            .into_iter()
            .filter_map(|key| key.as_statement().cloned())
            .filter(|id| self.statements.contains_key(id))
            .collect();
        self.evaluate_in_order(env, &order);
        self.state = DocumentState::Ok;
        debug!(document = %self.id, statements = nodes.len(), evaluated = order.len(), "Batch update");
        order
    }

    /// Replaces statement `id` with `node`, or removes it when `node` is
    /// `None`. An unknown id with a node appends a new statement. Returns the
    /// re-evaluated statements in evaluation order.
    pub fn interactive_update(
        &mut self,
        env: &mut Environment,
        id: &StatementId,
        node: Option<Arc<Node>>,
    ) -> Result<Vec<StatementId>, DocumentError> {
        if node.is_none() && !self.statements.contains_key(id) {
            return Err(DocumentError::UnknownStatement(id.to_string()));
        }
        Ok(self.apply_update(env, id, node))
    }

    /// Parses `text` as a new last line of the document.
    pub fn append_statement(&mut self, env: &mut Environment, text: &str) -> (StatementId, Vec<StatementId>) {
        let id = self.next_id();
        let node = self.parse(env, text);
        let cascade = self.apply_update(env, &id, Some(node));
        (id, cascade)
    }

    pub fn edit_statement(
        &mut self,
        env: &mut Environment,
        id: &StatementId,
        text: &str,
    ) -> Result<Vec<StatementId>, DocumentError> {
        if !self.statements.contains_key(id) {
            return Err(DocumentError::UnknownStatement(id.to_string()));
        }
        let node = self.parse(env, text);
        Ok(self.apply_update(env, id, Some(node)))
    }

    pub fn remove_statement(&mut self, env: &mut Environment, id: &StatementId) -> Result<Vec<StatementId>, DocumentError> {
        self.interactive_update(env, id, None)
    }

    fn parse(&self, env: &mut Environment, text: &str) -> Arc<Node> {
        let mut parser = Parser::new(env, self.scope);
        match parser.parse_statement(text) {
            Ok(node) => node,
            Err(e) => parser.unparsed(text, e),
        }
    }

    fn apply_update(&mut self, env: &mut Environment, id: &StatementId, node: Option<Arc<Node>>) -> Vec<StatementId> {
        let old = self.statements.get(id).map(|s| s.node().clone());
        let overwrite = env.prefs.overwrite_existing_definitions;
        let delta = GraphBuilder::new(&mut self.graph, &env.scopes, overwrite).update_graph(id, old.as_ref(), node.as_ref());

        match node {
            Some(node) => match self.statements.get_mut(id) {
                Some(statement) => statement.replace_node(node),
                None => {
                    let position = self.position_after_last(&node);
                    self.statements.insert(id.clone(), Statement::new(id.clone(), node, self.scope, position));
                    self.ids_in_written_order.push(id.clone());
                }
            },
            None => {
                self.statements.remove(id);
                self.ids_in_written_order.retain(|i| i != id);
            }
        }
        self.apply_changes(env, &delta.changes);

        if let Some(binding) = &delta.document_needs_reparse {
            warn!(document = %self.id, binding = %binding, "Document needs reparse");
            self.state = DocumentState::Invalid;
        } else if self.state != DocumentState::Invalid {
            self.state = DocumentState::Unknown;
        }

        let mut cascade = self.cascade_order(&delta);
        cascade.retain(|s| s == id || !delta.dropped.contains(s));
        for dropped in delta.dropped.iter().filter(|s| *s != id) {
            if let Some(statement) = self.statements.get_mut(dropped) {
                statement.clear_evaluation();
            }
        }
        self.evaluate_in_order(env, &cascade);
        self.mark_updated(&cascade);
        cascade
    }

    /// Re-evaluates whatever depends on `bindings`, typically bindings of an
    /// included document that just changed.
    pub fn propagate_external(&mut self, env: &Environment, bindings: &[BindingId]) -> Vec<StatementId> {
        let starts: Vec<GraphKey> = bindings.iter().cloned().map(GraphKey::from).collect();
        let keys = dependents_of(&self.graph.execution, &starts);
        let cascade = self.cascade_order(&GraphDelta { keys, ..GraphDelta::default() });
        self.evaluate_in_order(env, &cascade);
        self.mark_updated(&cascade);
        cascade
    }

    /// The statement currently defining `binding`.
    pub fn active_definition(&self, binding: &BindingId) -> Option<StatementId> {
        self.graph
            .navigation
            .outgoing(&GraphKey::from(binding.clone()), &[EdgeKind::Defines])
            .into_iter()
            .find_map(|k| k.as_statement().cloned())
    }

    /// Every statement defining `binding`, paired with whether it is active.
    pub fn definitions_of(&self, binding: &BindingId) -> Vec<(StatementId, bool)> {
        let key = GraphKey::from(binding.clone());
        let active = self.active_definition(binding);
        self.graph
            .navigation
            .outgoing(&key, &[EdgeKind::Defines, EdgeKind::Obsolete])
            .into_iter()
            .filter_map(|k| k.as_statement().cloned())
            .map(|id| {
                let is_active = active.as_ref() == Some(&id);
                (id, is_active)
            })
            .collect()
    }

    /// The binding `name` resolves to when used in `scope`, following
    /// inherited definitions outwards.
    pub fn resolve_identifier(&self, scope: ScopeId, name: &str) -> Option<BindingId> {
        let mut key = GraphKey::from(BindingId::variable(scope, name));
        if !self.graph.navigation.contains(&key) {
            return None;
        }
        let mut seen = BTreeSet::new();
        while seen.insert(key.clone()) {
            match self.graph.navigation.outgoing(&key, &[EdgeKind::Inherits]).into_iter().next() {
                Some(outer) => key = outer,
                None => break,
            }
        }
        key.as_binding().cloned()
    }

    fn apply_changes(&self, env: &mut Environment, changes: &[BindingChange]) {
        for change in changes {
            match change {
                BindingChange::Set { binding, statement } if binding.kind == BindingKind::Variable => {
                    if let Some(statement) = self.statements.get(statement) {
                        env.scopes.set_variable(binding.scope, &binding.identifier, statement.node().clone());
                    }
                }
                BindingChange::Remove { binding } if binding.kind == BindingKind::Variable => {
                    env.scopes.remove_variable(binding.scope, &binding.identifier);
                }
                _ => {}
            }
        }
    }

    fn cascade_order(&self, delta: &GraphDelta) -> Vec<StatementId> {
        order_of(&self.graph.execution, &delta.keys)
            .into_iter()
            .filter_map(|key| key.as_statement().cloned())
            .filter(|id| self.statements.contains_key(id))
            .collect()
    }

    /// Evaluates `order` front to back. A definition evaluated earlier in the
    /// pass, or untouched by it, hands its value to the statements using it.
    fn evaluate_in_order(&mut self, env: &Environment, order: &[StatementId]) {
        let pending: HashSet<&StatementId> = order.iter().collect();
        let mut settled: HashMap<NodeId, StatementId> = self
            .statements
            .values()
            .filter(|s| !pending.contains(s.id()) && s.node().defined_variable().is_some())
            .map(|s| (s.node().id, s.id().clone()))
            .collect();

        for id in order {
            let Some(statement) = self.statements.get(id) else { continue };
            let (scope, node) = (statement.scope(), statement.node().clone());
            let known = SettledDefinitions { statements: &self.statements, by_node: &settled };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluate_node_with(env, scope, &node, &known)));
            let Some(statement) = self.statements.get_mut(id) else { continue };
            match outcome {
                Ok(evaluation) => statement.set_evaluation(evaluation),
                Err(_) => {
                    error!(document = %self.id, statement = %id, "Evaluation panicked");
                    statement.mark_failed();
                }
            }
            if node.defined_variable().is_some() {
                settled.insert(node.id, id.clone());
            }
        }
    }

    fn mark_updated(&mut self, cascade: &[StatementId]) {
        for id in self.last_updated.drain(..) {
            if let Some(statement) = self.statements.get_mut(&id) {
                statement.updated = false;
            }
        }
        for id in cascade {
            if let Some(statement) = self.statements.get_mut(id) {
                statement.updated = true;
            }
        }
        self.last_updated = cascade.to_vec();
    }

    fn position_after_last(&self, node: &Node) -> Position {
        let last = self.statements().last().map(|s| s.position.clone()).unwrap_or_default();
        let offset_first = if self.statements.is_empty() { 0 } else { last.offset_last + 1 };
        Position {
            document_id: self.id.clone(),
            line_first: last.line_last + 1,
            line_last: last.line_last + 1,
            offset_first,
            offset_last: offset_first + node.to_string().len(),
        }
    }
}

/// Definitions whose cached evaluation is current for the pass in progress.
struct SettledDefinitions<'m> {
    statements: &'m HashMap<StatementId, Statement>,
    by_node: &'m HashMap<NodeId, StatementId>,
}

impl KnownDefinitions for SettledDefinitions<'_> {
    fn evaluation_of(&self, definition: NodeId) -> Option<&Evaluation> {
        let id = self.by_node.get(&definition)?;
        self.statements.get(id).and_then(Statement::evaluation)
    }
}
