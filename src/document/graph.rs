//! Keys, edge kinds and the keyed multigraph used for document dependencies.
//!
//! An edge `A -> B` means *A depends on B*: B is evaluated before A.
//!
//! * statement -> binding: the statement references the identifier (`References`)
//! * binding -> statement: the statement is the active definition (`Defines`)
//! * binding -> statement: a shadowed definition, navigation graph only (`Obsolete`)
//! * binding -> binding: the use-site scope inherits an outer definition (`Inherits`)
use crate::scope::ScopeId;
use petgraph::prelude::StableDiGraph;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Opaque, totally ordered statement identity. The order must follow
/// document or edit recency; the latest duplicate definition wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StatementId(pub String);

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatementId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BindingKind {
    Variable,
    Unit,
}

/// "The definition of `identifier` in `scope`", independent of which
/// statement currently provides it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BindingId {
    pub kind: BindingKind,
    pub scope: ScopeId,
    pub identifier: String,
}

impl BindingId {
    pub fn variable(scope: ScopeId, identifier: &str) -> Self {
        Self { kind: BindingKind::Variable, scope, identifier: identifier.to_string() }
    }

    pub fn unit(scope: ScopeId, identifier: &str) -> Self {
        Self { kind: BindingKind::Unit, scope, identifier: identifier.to_string() }
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            BindingKind::Variable => "variable",
            BindingKind::Unit => "unit",
        };
        write!(f, "{}:{}/{}", prefix, self.scope, self.identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GraphKey {
    Statement(StatementId),
    Binding(BindingId),
}

impl GraphKey {
    pub fn as_statement(&self) -> Option<&StatementId> {
        match self {
            GraphKey::Statement(id) => Some(id),
            GraphKey::Binding(_) => None,
        }
    }

    pub fn as_binding(&self) -> Option<&BindingId> {
        match self {
            GraphKey::Binding(b) => Some(b),
            GraphKey::Statement(_) => None,
        }
    }
}

impl From<StatementId> for GraphKey {
    fn from(id: StatementId) -> Self {
        GraphKey::Statement(id)
    }
}

impl From<BindingId> for GraphKey {
    fn from(binding: BindingId) -> Self {
        GraphKey::Binding(binding)
    }
}

impl fmt::Display for GraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphKey::Statement(id) => write!(f, "{}", id),
            GraphKey::Binding(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EdgeKind {
    References,
    Defines,
    Inherits,
    Obsolete,
}

/// A directed multigraph addressed by [`GraphKey`] rather than by index.
/// At most one edge of each kind joins a pair of keys.
#[derive(Debug, Clone, Default)]
pub struct KeyedGraph {
    graph: StableDiGraph<GraphKey, EdgeKind>,
    index: HashMap<GraphKey, NodeIndex>,
}

impl KeyedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, key: &GraphKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &GraphKey> + '_ {
        self.index.keys()
    }

    pub fn ensure_node(&mut self, key: &GraphKey) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(key.clone());
        self.index.insert(key.clone(), idx);
        idx
    }

    /// Removes the node and every edge touching it.
    pub fn remove_node(&mut self, key: &GraphKey) -> bool {
        match self.index.remove(key) {
            Some(idx) => {
                self.graph.remove_node(idx);
                true
            }
            None => false,
        }
    }

    pub fn add_edge(&mut self, from: &GraphKey, to: &GraphKey, kind: EdgeKind) {
        let a = self.ensure_node(from);
        let b = self.ensure_node(to);
        let exists = self
            .graph
            .edges_directed(a, Direction::Outgoing)
            .any(|e| e.target() == b && *e.weight() == kind);
        if !exists {
            self.graph.add_edge(a, b, kind);
        }
    }

    /// Removes `from`'s outgoing edges of the given kinds.
    pub fn remove_outgoing(&mut self, from: &GraphKey, kinds: &[EdgeKind]) {
        let Some(&a) = self.index.get(from) else { return };
        let doomed: Vec<_> = self
            .graph
            .edges_directed(a, Direction::Outgoing)
            .filter(|e| kinds.contains(e.weight()))
            .map(|e| e.id())
            .collect();
        for edge in doomed {
            self.graph.remove_edge(edge);
        }
    }

    pub fn remove_edges_between(&mut self, from: &GraphKey, to: &GraphKey) {
        let (Some(&a), Some(&b)) = (self.index.get(from), self.index.get(to)) else { return };
        let doomed: Vec<_> = self
            .graph
            .edges_directed(a, Direction::Outgoing)
            .filter(|e| e.target() == b)
            .map(|e| e.id())
            .collect();
        for edge in doomed {
            self.graph.remove_edge(edge);
        }
    }

    /// Targets of `key`'s outgoing edges of the given kinds.
    pub fn outgoing(&self, key: &GraphKey, kinds: &[EdgeKind]) -> Vec<GraphKey> {
        self.neighbours(key, kinds, Direction::Outgoing)
    }

    /// Sources of `key`'s incoming edges of the given kinds.
    pub fn incoming(&self, key: &GraphKey, kinds: &[EdgeKind]) -> Vec<GraphKey> {
        self.neighbours(key, kinds, Direction::Incoming)
    }

    fn neighbours(&self, key: &GraphKey, kinds: &[EdgeKind], direction: Direction) -> Vec<GraphKey> {
        let Some(&idx) = self.index.get(key) else { return Vec::new() };
        let mut out: Vec<GraphKey> = self
            .graph
            .edges_directed(idx, direction)
            .filter(|e| kinds.is_empty() || kinds.contains(e.weight()))
            .map(|e| {
                let other = if direction == Direction::Outgoing { e.target() } else { e.source() };
                self.graph[other].clone()
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Every edge as `(from, to, kind)`, sorted.
    pub fn edges(&self) -> Vec<(GraphKey, GraphKey, EdgeKind)> {
        let mut out: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                Some((self.graph[a].clone(), self.graph[b].clone(), self.graph[e]))
            })
            .collect();
        out.sort();
        out
    }
}

/// The two graphs of a document. `execution` holds only what evaluation
/// needs; `navigation` also keeps shadowed definitions.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub execution: KeyedGraph,
    pub navigation: KeyedGraph,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }
}
