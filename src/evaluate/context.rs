//! Per-evaluation state shared by the labelling and evaluation passes.
use super::error::{ErrorCode, EvalError};
use super::Evaluation;
use crate::ast::{Node, NodeId};
use crate::environment::Environment;
use crate::operators::{AngleUnits, Operator};
use crate::scope::ScopeId;
use crate::units::CompoundUnit;
use crate::value::{Value, ValueKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const RADIANS: &str = "radians";

/// Side-table annotations for one AST node.
#[derive(Debug, Clone, Default)]
pub struct LabelInfo<'a> {
    pub value_type: Option<ValueKind>,
    pub operator: Option<&'a Operator>,
    /// The `VariableDefinition` an identifier resolved to.
    pub definition: Option<Arc<Node>>,
    pub error: Option<ErrorCode>,
}

/// Evaluations already computed for definitions, consulted before walking a
/// definition's AST.
pub trait KnownDefinitions {
    fn evaluation_of(&self, definition: NodeId) -> Option<&Evaluation>;
}

pub struct EvalContext<'a> {
    pub env: &'a Environment,
    /// Scope unit catalogs and angle units are looked up in.
    pub scope: ScopeId,
    pub(crate) labels: HashMap<NodeId, LabelInfo<'a>>,
    /// Definitions currently being labelled.
    pub(crate) busy: HashSet<NodeId>,
    /// Label results of definitions already visited in this evaluation.
    pub(crate) labelled: HashMap<NodeId, Option<ValueKind>>,
    /// Values of definitions already evaluated in this evaluation.
    pub(crate) memo: HashMap<NodeId, Option<Value>>,
    pub(crate) errors: Vec<EvalError>,
    pub(crate) angles: AngleUnits,
    pub(crate) known: Option<&'a dyn KnownDefinitions>,
}

impl<'a> EvalContext<'a> {
    pub fn new(env: &'a Environment, scope: ScopeId) -> Self {
        let unit = |name: &str| env.scopes.find_unit(scope, name).map(CompoundUnit::named);
        let angles = AngleUnits { preferred: unit(&env.prefs.angle_unit), radians: unit(RADIANS) };
        Self {
            env,
            scope,
            labels: HashMap::new(),
            busy: HashSet::new(),
            labelled: HashMap::new(),
            memo: HashMap::new(),
            errors: Vec::new(),
            angles,
            known: None,
        }
    }

    pub fn with_known(mut self, known: &'a dyn KnownDefinitions) -> Self {
        self.known = Some(known);
        self
    }

    /// The already computed evaluation of `definition`, if any.
    pub fn known_evaluation(&self, definition: NodeId) -> Option<&'a Evaluation> {
        self.known.and_then(|known| known.evaluation_of(definition))
    }

    /// Records an error against `node`, and on the node's label for renderers.
    pub fn report(&mut self, code: ErrorCode, node: NodeId) {
        self.errors.push(EvalError::new(code, node));
        self.label_mut(node).error = Some(code);
    }

    pub fn label(&self, node: NodeId) -> Option<&LabelInfo<'a>> {
        self.labels.get(&node)
    }

    pub fn label_mut(&mut self, node: NodeId) -> &mut LabelInfo<'a> {
        self.labels.entry(node).or_default()
    }

    pub fn errors(&self) -> &[EvalError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
