//! The operator table: operators keyed by `(left kind, literal, right kind)`.
//!
//! Each operator is assembled from behaviour fragments in [`policy`]:
//! preflight checks, a unit policy, an operand preparation step and a plain
//! `f64` calculation. Operators never see the AST or the scope chain; failures
//! come back as [`Fault`]s naming the operand they belong to, and the
//! evaluator maps those onto node ids.
pub mod arithmetic;
pub mod functions;
pub mod logic;
pub mod percent;
pub mod policy;

use crate::evaluate::ErrorCode;
use crate::units::CompoundUnit;
use crate::value::{Value, ValueKind};
use policy::{Prepare, PrepareOperand, Preflight, UnaryCheck, UnaryUnits, UnitPolicy};
use std::collections::HashMap;

/// Which part of an operation a fault is reported against. For unary
/// operators the operand is `Left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Left,
    Right,
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub code: ErrorCode,
    pub at: Operand,
}

impl Fault {
    pub fn new(code: ErrorCode, at: Operand) -> Self {
        Self { code, at }
    }
}

/// Angle units in effect for trigonometry.
#[derive(Debug, Clone, Default)]
pub struct AngleUnits {
    /// Unit a plain number is read in, and inverse functions answer in.
    pub preferred: Option<CompoundUnit>,
    pub radians: Option<CompoundUnit>,
}

#[derive(Debug, Clone)]
pub struct BinaryOperator {
    pub literal: String,
    pub left: ValueKind,
    pub right: ValueKind,
    pub returns: ValueKind,
    pub preflight: Preflight,
    pub units: UnitPolicy,
    pub prepare: Prepare,
    pub calculate: fn(f64, f64) -> f64,
}

impl BinaryOperator {
    pub fn new(
        literal: &str,
        (left, right): (ValueKind, ValueKind),
        returns: ValueKind,
        calculate: fn(f64, f64) -> f64,
    ) -> Self {
        Self {
            literal: literal.to_string(),
            left,
            right,
            returns,
            preflight: Preflight::None,
            units: UnitPolicy::None,
            prepare: Prepare::None,
            calculate,
        }
    }

    pub fn preflight(mut self, preflight: Preflight) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn units(mut self, units: UnitPolicy) -> Self {
        self.units = units;
        self
    }

    pub fn prepare(mut self, prepare: Prepare) -> Self {
        self.prepare = prepare;
        self
    }

    pub fn apply(&self, left: &Value, right: &Value) -> Result<Value, Vec<Fault>> {
        self.preflight.check(left, right)?;
        let right = self.prepare.apply(left, right).map_err(|fault| vec![fault])?;
        let unit = self.units.result_unit(left, &right);
        let magnitude = (self.calculate)(left.magnitude(), right.magnitude());
        Ok(Value::new(magnitude, unit, self.returns))
    }
}

#[derive(Debug, Clone)]
pub struct UnaryOperator {
    pub literal: String,
    pub operand: ValueKind,
    pub returns: ValueKind,
    pub is_prefix: bool,
    pub checks: Vec<UnaryCheck>,
    pub units: UnaryUnits,
    pub prepare: PrepareOperand,
    pub calculate: fn(f64) -> f64,
}

impl UnaryOperator {
    pub fn prefix(literal: &str, operand: ValueKind, returns: ValueKind, calculate: fn(f64) -> f64) -> Self {
        Self {
            literal: literal.to_string(),
            operand,
            returns,
            is_prefix: true,
            checks: Vec::new(),
            units: UnaryUnits::Keep,
            prepare: PrepareOperand::None,
            calculate,
        }
    }

    pub fn postfix(literal: &str, operand: ValueKind, returns: ValueKind, calculate: fn(f64) -> f64) -> Self {
        Self { is_prefix: false, ..Self::prefix(literal, operand, returns, calculate) }
    }

    pub fn check(mut self, check: UnaryCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn units(mut self, units: UnaryUnits) -> Self {
        self.units = units;
        self
    }

    pub fn prepare(mut self, prepare: PrepareOperand) -> Self {
        self.prepare = prepare;
        self
    }

    pub fn apply(&self, operand: &Value, angles: &AngleUnits) -> Result<Value, Fault> {
        for check in &self.checks {
            check.check(operand)?;
        }
        let input = self.prepare.apply(operand, angles);
        let raw = (self.calculate)(input);
        let (magnitude, unit) = self.units.result(operand, raw, angles);
        Ok(Value::new(magnitude, unit, self.returns))
    }
}

#[derive(Debug, Clone)]
pub enum Operator {
    Binary(BinaryOperator),
    Unary(UnaryOperator),
}

impl Operator {
    pub fn literal(&self) -> &str {
        match self {
            Operator::Binary(op) => &op.literal,
            Operator::Unary(op) => &op.literal,
        }
    }

    pub fn returns(&self) -> ValueKind {
        match self {
            Operator::Binary(op) => op.returns,
            Operator::Unary(op) => op.returns,
        }
    }
}

/// `None` marks the missing side of a prefix or postfix operator.
type OperatorKey = (Option<ValueKind>, String, Option<ValueKind>);

#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    operators: HashMap<OperatorKey, Operator>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arithmetic, functions, percentages, comparisons and boolean logic.
    pub fn standard() -> Self {
        let mut table = Self::new();
        arithmetic::register(&mut table);
        functions::register(&mut table);
        percent::register(&mut table);
        logic::register(&mut table);
        table
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn add_binary(&mut self, op: BinaryOperator) {
        let key = (Some(op.left), op.literal.clone(), Some(op.right));
        self.operators.insert(key, Operator::Binary(op));
    }

    pub fn add_unary(&mut self, op: UnaryOperator) {
        let key = if op.is_prefix {
            (None, op.literal.clone(), Some(op.operand))
        } else {
            (Some(op.operand), op.literal.clone(), None)
        };
        self.operators.insert(key, Operator::Unary(op));
    }

    pub fn lookup(&self, left: Option<ValueKind>, literal: &str, right: Option<ValueKind>) -> Option<&Operator> {
        self.operators.get(&(left, literal.to_string(), right))
    }

    pub fn binary(&self, left: ValueKind, literal: &str, right: ValueKind) -> Option<&BinaryOperator> {
        match self.lookup(Some(left), literal, Some(right)) {
            Some(Operator::Binary(op)) => Some(op),
            _ => None,
        }
    }

    pub fn prefix(&self, literal: &str, operand: ValueKind) -> Option<&UnaryOperator> {
        match self.lookup(None, literal, Some(operand)) {
            Some(Operator::Unary(op)) => Some(op),
            _ => None,
        }
    }

    pub fn postfix(&self, operand: ValueKind, literal: &str) -> Option<&UnaryOperator> {
        match self.lookup(Some(operand), literal, None) {
            Some(Operator::Unary(op)) => Some(op),
            _ => None,
        }
    }

    /// Named prefix operators applied like functions (`sqrt 16`, `sin(x)`).
    pub fn is_function(&self, name: &str) -> bool {
        name != "not"
            && self.operators.keys().any(|(left, literal, _)| {
                left.is_none() && literal == name && literal.chars().all(char::is_alphabetic)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table() -> OperatorTable {
        OperatorTable::standard()
    }

    #[rstest]
    #[case(ValueKind::Number, "+", ValueKind::Number, true)]
    #[case(ValueKind::Number, "+", ValueKind::Percent, true)]
    #[case(ValueKind::Percent, "of", ValueKind::Number, true)]
    #[case(ValueKind::Boolean, "and", ValueKind::Boolean, true)]
    #[case(ValueKind::Boolean, "+", ValueKind::Number, false)]
    #[case(ValueKind::Number, "and", ValueKind::Number, false)]
    fn test_binary_lookup(
        #[case] left: ValueKind,
        #[case] literal: &str,
        #[case] right: ValueKind,
        #[case] found: bool,
    ) {
        assert_eq!(table().binary(left, literal, right).is_some(), found);
    }

    #[test]
    fn test_prefix_and_postfix_are_distinct_keys() {
        let table = table();
        assert!(table.prefix("-", ValueKind::Number).is_some());
        assert!(table.postfix(ValueKind::Number, "-").is_none());
        assert!(table.postfix(ValueKind::Number, "!").is_some());
        assert!(table.postfix(ValueKind::Number, "%").is_some());
    }

    #[rstest]
    #[case("sqrt", true)]
    #[case("sin", true)]
    #[case("log", true)]
    #[case("not", false)]
    #[case("x", false)]
    fn test_is_function(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(table().is_function(name), expected);
    }

    #[test]
    fn test_divide_by_zero_reports_divisor() {
        let table = table();
        let div = table.binary(ValueKind::Number, "/", ValueKind::Number).unwrap();
        let faults = div.apply(&Value::number(1.0), &Value::number(0.0)).unwrap_err();
        assert_eq!(faults, vec![Fault::new(ErrorCode::DivideByZero, Operand::Right)]);
    }

    #[test]
    fn test_custom_operator_composes_fragments() {
        let mut table = OperatorTable::new();
        table.add_binary(
            BinaryOperator::new("max", (ValueKind::Number, ValueKind::Number), ValueKind::Number, f64::max)
                .preflight(Preflight::SameDimensions)
                .units(UnitPolicy::SameAsLeft)
                .prepare(Prepare::ConvertToLeft),
        );
        assert_eq!(table.len(), 1);
        let max = table.binary(ValueKind::Number, "max", ValueKind::Number).unwrap();
        let value = max.apply(&Value::number(2.0), &Value::number(5.0)).unwrap();
        assert_eq!(value.magnitude(), 5.0);
    }
}
