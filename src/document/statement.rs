use super::graph::StatementId;
use crate::ast::Node;
use crate::environment::Environment;
use crate::evaluate::{evaluate_node, Evaluation};
use crate::scope::ScopeId;
use crate::value::Value;
use serde::Serialize;
use std::sync::Arc;

/// Where a statement sits in its document. Lines are 1-based and offsets are
/// byte offsets into the document text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub document_id: String,
    pub line_first: usize,
    pub line_last: usize,
    pub offset_first: usize,
    pub offset_last: usize,
}

/// One line of a document with its cached evaluation.
#[derive(Debug, Clone)]
pub struct Statement {
    id: StatementId,
    node: Arc<Node>,
    scope: ScopeId,
    pub position: Position,
    /// Set while the statement belongs to the latest interactive cascade.
    pub updated: bool,
    evaluation: Option<Evaluation>,
}

impl Statement {
    pub fn new(id: StatementId, node: Arc<Node>, scope: ScopeId, position: Position) -> Self {
        Self { id, node, scope, position, updated: false, evaluation: None }
    }

    pub fn id(&self) -> &StatementId {
        &self.id
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Swaps in a new node and drops the cached evaluation.
    pub fn replace_node(&mut self, node: Arc<Node>) {
        self.node = node;
        self.evaluation = None;
    }

    pub fn is_parseable(&self) -> bool {
        self.node.is_parseable()
    }

    /// Unparseable statements always count as erroneous.
    pub fn has_errors(&self) -> bool {
        !self.is_parseable() || self.evaluation.as_ref().is_some_and(Evaluation::has_errors)
    }

    pub fn value(&self) -> Option<&Value> {
        self.evaluation.as_ref().and_then(|e| e.value.as_ref())
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    /// The cached evaluation, computed on first use.
    pub fn evaluate(&mut self, env: &Environment) -> &Evaluation {
        let (scope, node) = (self.scope, &self.node);
        self.evaluation.get_or_insert_with(|| evaluate_node(env, scope, node))
    }

    pub fn reevaluate(&mut self, env: &Environment) -> &Evaluation {
        self.evaluation = None;
        self.evaluate(env)
    }

    pub(crate) fn set_evaluation(&mut self, evaluation: Evaluation) {
        self.evaluation = Some(evaluation);
    }

    pub(crate) fn clear_evaluation(&mut self) {
        self.evaluation = None;
    }

    /// Records an evaluation that could not complete.
    pub(crate) fn mark_failed(&mut self) {
        self.evaluation = Some(Evaluation::default());
    }
}
