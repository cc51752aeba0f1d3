//! First pass: resolve identifiers and operators, and compute value kinds.
use super::context::EvalContext;
use super::error::ErrorCode;
use super::Evaluation;
use crate::ast::{Node, NodeId, NodeKind};
use crate::value::ValueKind;
use std::sync::Arc;
use tracing::trace;

pub struct TypeLabeller<'c, 'a> {
    cx: &'c mut EvalContext<'a>,
}

impl<'c, 'a> TypeLabeller<'c, 'a> {
    pub fn new(cx: &'c mut EvalContext<'a>) -> Self {
        Self { cx }
    }

    /// Labels `node` and its subtree. `None` means an error was reported
    /// somewhere below; callers propagate it without reporting again.
    pub fn label(&mut self, node: &Arc<Node>) -> Option<ValueKind> {
        let kind = self.label_kind(node);
        if kind.is_some() {
            self.cx.label_mut(node.id).value_type = kind;
        }
        kind
    }

    fn label_kind(&mut self, node: &Arc<Node>) -> Option<ValueKind> {
        match &node.kind {
            NodeKind::Number { .. } => Some(ValueKind::Number),
            NodeKind::Boolean(_) => Some(ValueKind::Boolean),
            NodeKind::Parens { inner, .. } => self.label(inner),
            NodeKind::UnitConversion { inner, .. } => match self.label(inner)? {
                ValueKind::Number => Some(ValueKind::Number),
                _ => {
                    self.cx.report(ErrorCode::TypeMismatch, inner.id);
                    None
                }
            },
            NodeKind::Binary { left, right, literal } => {
                // Both sides are labelled so sibling errors all surface.
                let l = self.label(left);
                let r = self.label(right);
                let (l, r) = (l?, r?);
                let env = self.cx.env;
                match env.operators.lookup(Some(l), literal, Some(r)) {
                    Some(op) => {
                        self.cx.label_mut(node.id).operator = Some(op);
                        Some(op.returns())
                    }
                    None => {
                        self.cx.report(ErrorCode::TypeMismatch, left.id);
                        self.cx.report(ErrorCode::TypeMismatch, right.id);
                        None
                    }
                }
            }
            NodeKind::Unary { inner, literal, is_prefix } => {
                let kind = self.label(inner)?;
                let env = self.cx.env;
                let op = if *is_prefix {
                    env.operators.lookup(None, literal, Some(kind))
                } else {
                    env.operators.lookup(Some(kind), literal, None)
                };
                match op {
                    Some(op) => {
                        self.cx.label_mut(node.id).operator = Some(op);
                        Some(op.returns())
                    }
                    None => {
                        self.cx.report(ErrorCode::TypeMismatch, inner.id);
                        None
                    }
                }
            }
            NodeKind::Identifier { name, scope } => {
                let env = self.cx.env;
                let Some(definition) = env.scopes.find_variable(*scope, name).cloned() else {
                    self.cx.report(ErrorCode::NoSuchVariable, node.id);
                    return None;
                };
                self.cx.label_mut(node.id).definition = Some(definition.clone());
                if self.cx.busy.contains(&definition.id) {
                    trace!(identifier = %name, "Cycle through definition");
                    self.cx.report(ErrorCode::UncalculatedVariable, node.id);
                    self.cx.report(ErrorCode::CyclicDefinition, definition.id);
                    return None;
                }
                if let Some(kind) = self.cx.labelled.get(&definition.id) {
                    return *kind;
                }
                match self.cx.known_evaluation(definition.id) {
                    Some(known) => self.adopt(node.id, definition.id, known),
                    None => self.label(&definition),
                }
            }
            NodeKind::VariableDefinition { ast, .. } => {
                self.cx.busy.insert(node.id);
                let kind = self.label(ast);
                self.cx.busy.remove(&node.id);
                self.cx.labelled.insert(node.id, kind);
                kind
            }
            NodeKind::UnitDefinition { .. } | NodeKind::Unparsed { .. } => None,
        }
    }

    /// Takes a definition's value from an earlier evaluation instead of
    /// walking its AST. A failed definition passes its errors on once.
    fn adopt(&mut self, use_site: NodeId, definition: NodeId, known: &Evaluation) -> Option<ValueKind> {
        let kind = known.value.as_ref().map(|v| v.kind());
        if kind.is_none() {
            if known.errors.is_empty() {
                self.cx.report(ErrorCode::UncalculatedVariable, use_site);
            } else {
                self.cx.errors.extend(known.errors.iter().copied());
            }
        }
        self.cx.labelled.insert(definition, kind);
        self.cx.memo.insert(definition, known.value.clone());
        kind
    }
}
