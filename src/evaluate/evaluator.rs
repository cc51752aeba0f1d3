//! Second pass: compute values over a labelled AST.
use super::context::EvalContext;
use super::error::ErrorCode;
use crate::ast::{ConversionTarget, Node, NodeId, NodeKind};
use crate::operators::{Fault, Operand, Operator};
use crate::units::CompoundUnit;
use crate::value::Value;
use std::sync::Arc;

pub struct Evaluator<'c, 'a> {
    cx: &'c mut EvalContext<'a>,
}

impl<'c, 'a> Evaluator<'c, 'a> {
    pub fn new(cx: &'c mut EvalContext<'a>) -> Self {
        Self { cx }
    }

    /// `None` when this subtree reported an error (or, for definitions of
    /// units and unparsed text, has no value at all).
    pub fn evaluate(&mut self, node: &Arc<Node>) -> Option<Value> {
        match &node.kind {
            NodeKind::Number { value, unit_literal } => {
                Some(coerce(Value::number(*value), unit_literal.as_ref()))
            }
            NodeKind::Boolean(b) => Some(Value::boolean(*b)),
            NodeKind::Parens { inner, unit_literal } => {
                let value = self.evaluate(inner)?;
                Some(coerce(value, unit_literal.as_ref()))
            }
            NodeKind::Identifier { .. } => {
                let definition = self.cx.label(node.id)?.definition.clone()?;
                self.evaluate_definition(&definition)
            }
            NodeKind::VariableDefinition { .. } => self.evaluate_definition(node),
            NodeKind::Binary { left, right, .. } => {
                let l = self.evaluate(left);
                let r = self.evaluate(right);
                let (l, r) = (l?, r?);
                let operator = self.cx.label(node.id)?.operator;
                let Some(Operator::Binary(op)) = operator else {
                    return None;
                };
                op.apply(&l, &r)
                    .map_err(|faults| self.report_faults(&faults, node.id, left.id, right.id))
                    .ok()
            }
            NodeKind::Unary { inner, .. } => {
                let operand = self.evaluate(inner)?;
                let operator = self.cx.label(node.id)?.operator;
                let Some(Operator::Unary(op)) = operator else {
                    return None;
                };
                op.apply(&operand, &self.cx.angles)
                    .map_err(|fault| self.report_faults(&[fault], node.id, inner.id, inner.id))
                    .ok()
            }
            NodeKind::UnitConversion { inner, target } => {
                let value = self.evaluate(inner)?;
                self.convert(node.id, value, target)
            }
            NodeKind::UnitDefinition { .. } | NodeKind::Unparsed { .. } => None,
        }
    }

    fn evaluate_definition(&mut self, definition: &Arc<Node>) -> Option<Value> {
        if let Some(value) = self.cx.memo.get(&definition.id) {
            return value.clone();
        }
        let NodeKind::VariableDefinition { ast, .. } = &definition.kind else {
            return None;
        };
        let value = self.evaluate(ast);
        self.cx.memo.insert(definition.id, value.clone());
        value
    }

    fn report_faults(&mut self, faults: &[Fault], node: NodeId, left: NodeId, right: NodeId) {
        for fault in faults {
            let at = match fault.at {
                Operand::Left => left,
                Operand::Right => right,
                Operand::Operator => node,
            };
            self.cx.report(fault.code, at);
        }
    }

    fn convert(&mut self, node: NodeId, value: Value, target: &ConversionTarget) -> Option<Value> {
        let env = self.cx.env;
        let scheme = match target {
            ConversionTarget::Unit(unit) => {
                if value.unit().is_none() {
                    return Some(Value::new(value.magnitude(), Some(unit.clone()), value.kind()));
                }
                return match value.convert_to(unit) {
                    Ok(converted) => Some(converted),
                    Err(_) => {
                        self.cx.report(ErrorCode::DimensionMismatch, node);
                        None
                    }
                };
            }
            ConversionTarget::Scheme(scheme) => scheme.as_str(),
            ConversionTarget::DefaultScheme => match &env.prefs.unit_scheme {
                Some(scheme) => scheme.as_str(),
                None => return Some(value),
            },
        };
        let Some(unit) = value.unit() else { return Some(value) };
        let catalog = env.scopes.catalog(self.cx.scope);
        match unit.refactored(value.magnitude(), Some(scheme), false, &catalog) {
            Ok(refactored) => Some(Value::new(refactored.value, refactored.unit, value.kind())),
            Err(_) => Some(value),
        }
    }
}

/// Applies a written unit suffix: convert when compatible, multiply it in when
/// not, attach it to a plain number.
fn coerce(value: Value, literal: Option<&CompoundUnit>) -> Value {
    let Some(literal) = literal else { return value };
    match value.unit() {
        None => Value::new(value.magnitude(), Some(literal.clone()), value.kind()),
        Some(unit) if unit.matches_dimensions(literal) => match value.convert_to(literal) {
            Ok(converted) => converted,
            Err(_) => Value::new(value.magnitude(), Some(unit.by(literal)), value.kind()),
        },
        Some(unit) => Value::new(value.magnitude(), Some(unit.by(literal)), value.kind()),
    }
}
