//! Behaviour fragments composed into operators at registration time.
use super::{AngleUnits, Fault, Operand};
use crate::evaluate::ErrorCode;
use crate::units::CompoundUnit;
use crate::value::Value;

const ANGLE: &str = "Angle";

fn is_integer(x: f64) -> bool {
    x.is_finite() && x.fract() == 0.0
}

/// Checks run on evaluated operands before a binary operator computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    None,
    /// Operands with units must share a dimension; a unitless operand is fine.
    SameDimensions,
    NonZeroDivisor,
    /// `^`: dimensionless exponent, no fractional powers of negatives, and
    /// fractional powers of units only when the unit divides evenly.
    Power,
}

impl Preflight {
    pub fn check(&self, left: &Value, right: &Value) -> Result<(), Vec<Fault>> {
        match self {
            Preflight::None => Ok(()),
            Preflight::SameDimensions => match (left.unit(), right.unit()) {
                (Some(l), Some(r)) if !l.matches_dimensions(r) => Err(vec![
                    Fault::new(ErrorCode::DimensionMismatch, Operand::Left),
                    Fault::new(ErrorCode::DimensionMismatch, Operand::Right),
                ]),
                _ => Ok(()),
            },
            Preflight::NonZeroDivisor if right.magnitude() == 0.0 => {
                Err(vec![Fault::new(ErrorCode::DivideByZero, Operand::Right)])
            }
            Preflight::NonZeroDivisor => Ok(()),
            Preflight::Power => check_power(left, right).map_err(|fault| vec![fault]),
        }
    }
}

fn check_power(base: &Value, exponent: &Value) -> Result<(), Fault> {
    if exponent.unit().is_some() {
        return Err(Fault::new(ErrorCode::DimensionMismatch, Operand::Right));
    }
    let e = exponent.magnitude();
    if is_integer(e) {
        let fits = match base.unit() {
            Some(unit) => integer_exponent(e).and_then(|n| unit.checked_pow(n)).is_some(),
            None => true,
        };
        return if fits { Ok(()) } else { Err(Fault::new(ErrorCode::Complicated, Operand::Operator)) };
    }
    if base.magnitude() < 0.0 {
        return Err(Fault::new(ErrorCode::NegativeNumberExponentiation, Operand::Operator));
    }
    if let Some(unit) = base.unit() {
        if root_degree(e).and_then(|n| unit.root(n)).is_none() {
            return Err(Fault::new(ErrorCode::FractionalUnitPower, Operand::Operator));
        }
    }
    Ok(())
}

/// An integral exponent that fits an `i32`.
fn integer_exponent(exponent: f64) -> Option<i32> {
    (is_integer(exponent) && exponent.abs() <= f64::from(i32::MAX)).then_some(exponent as i32)
}

/// `n` when `exponent == 1/n` for an integer `n`.
fn root_degree(exponent: f64) -> Option<i32> {
    if exponent == 0.0 {
        return None;
    }
    let n = (1.0 / exponent).round();
    if (1.0 / exponent - n).abs() >= 1e-9 {
        return None;
    }
    integer_exponent(n)
}

/// How a binary operator derives the unit of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPolicy {
    None,
    /// The left unit, or the right one when the left operand has none.
    SameAsLeft,
    Product,
    Quotient,
    Power,
    LeftOnly,
    RightOnly,
}

impl UnitPolicy {
    pub fn result_unit(&self, left: &Value, right: &Value) -> Option<CompoundUnit> {
        match self {
            UnitPolicy::None => None,
            UnitPolicy::SameAsLeft => left.unit().or(right.unit()).cloned(),
            UnitPolicy::Product => combine(left.unit(), right.unit(), |l, r| l.by(r)),
            UnitPolicy::Quotient => {
                let inverse = right.unit().map(|u| u.pow(-1));
                combine(left.unit(), inverse.as_ref(), |l, r| l.by(r))
            }
            UnitPolicy::Power => {
                let unit = left.unit()?;
                let e = right.magnitude();
                if is_integer(e) {
                    integer_exponent(e).and_then(|n| unit.checked_pow(n))
                } else {
                    root_degree(e).and_then(|n| unit.root(n))
                }
            }
            UnitPolicy::LeftOnly => left.unit().cloned(),
            UnitPolicy::RightOnly => right.unit().cloned(),
        }
    }
}

fn combine(
    left: Option<&CompoundUnit>,
    right: Option<&CompoundUnit>,
    op: impl Fn(&CompoundUnit, &CompoundUnit) -> CompoundUnit,
) -> Option<CompoundUnit> {
    match (left, right) {
        (Some(l), Some(r)) => Some(op(l, r)),
        (Some(l), None) => Some(l.clone()),
        (None, Some(r)) => Some(op(&CompoundUnit::empty(), r)),
        (None, None) => None,
    }
}

/// Normalisation of the right operand before the value is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepare {
    None,
    /// Express the right operand in the left operand's unit.
    ConvertToLeft,
    /// Rewrite right-hand unit terms that share a dimension with a left-hand
    /// term into that term's unit, so `1 m * 1 km` is `1000 m^2`.
    MatchLeftDimensions,
}

impl Prepare {
    pub fn apply(&self, left: &Value, right: &Value) -> Result<Value, Fault> {
        match (self, left.unit(), right.unit()) {
            (Prepare::ConvertToLeft, Some(l), Some(_)) => right
                .convert_to(l)
                .map_err(|_| Fault::new(ErrorCode::DimensionMismatch, Operand::Right)),
            (Prepare::MatchLeftDimensions, Some(l), Some(r)) => Ok(match_dimensions(l, r, right)),
            _ => Ok(right.clone()),
        }
    }
}

fn match_dimensions(left: &CompoundUnit, right: &CompoundUnit, value: &Value) -> Value {
    let mut magnitude = value.magnitude();
    let mut terms = Vec::with_capacity(right.terms().len());
    for term in right.terms() {
        let partner = left.terms().iter().find(|l| {
            !l.unit.is_compound()
                && !term.unit.is_compound()
                && l.unit.name() != term.unit.name()
                && l.unit.dimension() == term.unit.dimension()
        });
        match partner.and_then(|l| term.unit.multiple_to(&l.unit).map(|m| (l, m))) {
            Some((l, m)) => {
                magnitude *= m.pow(term.exponent).value();
                terms.push((l.unit.clone(), term.exponent));
            }
            None => terms.push((term.unit.clone(), term.exponent)),
        }
    }
    Value::new(magnitude, Some(CompoundUnit::from_terms(terms)), value.kind())
}

/// Checks run on the operand of a unary operator.
#[derive(Debug, Clone, Copy)]
pub enum UnaryCheck {
    Dimensionless,
    /// Dimensionless, or measured in an angle unit.
    Angle,
    NonNegative,
    /// The unit must have an integer square root.
    EvenRoot,
    /// A unitless non-negative integer.
    Counting,
    /// Outside the function's domain the result is `COMPLICATED`.
    Domain(fn(f64) -> bool),
}

impl UnaryCheck {
    pub fn check(&self, operand: &Value) -> Result<(), Fault> {
        let ok = match self {
            UnaryCheck::Dimensionless => operand.unit().is_none(),
            UnaryCheck::Angle => operand.unit().map_or(true, |u| u.dimension().simple_name() == Some(ANGLE)),
            UnaryCheck::NonNegative => operand.magnitude() >= 0.0,
            UnaryCheck::EvenRoot => operand.unit().map_or(true, |u| u.root(2).is_some()),
            UnaryCheck::Counting => {
                operand.unit().is_none() && is_integer(operand.magnitude()) && operand.magnitude() >= 0.0
            }
            UnaryCheck::Domain(inside) => inside(operand.magnitude()),
        };
        if ok {
            return Ok(());
        }
        let fault = match self {
            UnaryCheck::Dimensionless | UnaryCheck::Angle => Fault::new(ErrorCode::DimensionMismatch, Operand::Left),
            UnaryCheck::NonNegative => Fault::new(ErrorCode::NegativeNumberSqrt, Operand::Operator),
            UnaryCheck::EvenRoot => Fault::new(ErrorCode::FractionalUnitPower, Operand::Operator),
            UnaryCheck::Counting | UnaryCheck::Domain(_) => Fault::new(ErrorCode::Complicated, Operand::Operator),
        };
        Err(fault)
    }
}

/// How a unary operator derives the unit of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryUnits {
    Keep,
    Drop,
    Sqrt,
    /// An angle, expressed in the preferred angle unit.
    Angle,
}

/// Normalisation of the operand before the value is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOperand {
    None,
    /// Angle units and plain numbers (read in the preferred angle unit) to radians.
    ToRadians,
}

impl PrepareOperand {
    pub fn apply(&self, operand: &Value, angles: &AngleUnits) -> f64 {
        match self {
            PrepareOperand::None => operand.magnitude(),
            PrepareOperand::ToRadians => {
                let Some(radians) = &angles.radians else { return operand.magnitude() };
                let source = operand.unit().or(angles.preferred.as_ref());
                match source {
                    Some(unit) => unit.convert(operand.magnitude(), radians).unwrap_or(operand.magnitude()),
                    None => operand.magnitude(),
                }
            }
        }
    }
}

impl UnaryUnits {
    pub fn result(&self, operand: &Value, magnitude: f64, angles: &AngleUnits) -> (f64, Option<CompoundUnit>) {
        match self {
            UnaryUnits::Keep => (magnitude, operand.unit().cloned()),
            UnaryUnits::Drop => (magnitude, None),
            UnaryUnits::Sqrt => (magnitude, operand.unit().and_then(|u| u.root(2))),
            UnaryUnits::Angle => match (&angles.radians, &angles.preferred) {
                (Some(radians), Some(preferred)) => match radians.convert(magnitude, preferred) {
                    Ok(converted) => (converted, Some(preferred.clone())),
                    Err(_) => (magnitude, Some(radians.clone())),
                },
                (Some(radians), None) => (magnitude, Some(radians.clone())),
                _ => (magnitude, None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::compound::tests::fixture;
    use rstest::rstest;

    #[test]
    fn test_same_dimensions_reports_both_operands() {
        let fx = fixture();
        let m = Value::with_unit(1.0, CompoundUnit::named(fx.m.clone()));
        let s = Value::with_unit(1.0, CompoundUnit::named(fx.s.clone()));
        let faults = Preflight::SameDimensions.check(&m, &s).unwrap_err();
        assert_eq!(faults.len(), 2);
        assert!(faults.iter().all(|f| f.code == ErrorCode::DimensionMismatch));
        assert!(Preflight::SameDimensions.check(&m, &Value::number(2.0)).is_ok());
    }

    #[rstest]
    #[case(-8.0, None, 1.0 / 3.0, Some(ErrorCode::NegativeNumberExponentiation))]
    #[case(-8.0, None, 2.0, None)]
    #[case(4.0, Some("m2"), 0.5, None)]
    #[case(4.0, Some("m"), 0.5, Some(ErrorCode::FractionalUnitPower))]
    #[case(4.0, Some("m"), 0.3, Some(ErrorCode::FractionalUnitPower))]
    #[case(1.0, Some("m"), 1e10, Some(ErrorCode::Complicated))]
    #[case(1.0, Some("m"), -1e10, Some(ErrorCode::Complicated))]
    #[case(1.0, Some("m2"), 3e9, Some(ErrorCode::Complicated))]
    #[case(1.0, Some("m2"), -1073741824.0, Some(ErrorCode::Complicated))]
    #[case(1.0, Some("m"), 40000.0, Some(ErrorCode::Complicated))]
    #[case(1.0, Some("m"), 30000.0, None)]
    #[case(2.0, None, 1e10, None)]
    fn test_power_preflight(
        #[case] base: f64,
        #[case] unit: Option<&str>,
        #[case] exponent: f64,
        #[case] expected: Option<ErrorCode>,
    ) {
        let fx = fixture();
        let unit = unit.map(|u| match u {
            "m2" => CompoundUnit::named(fx.m.clone()).pow(2),
            _ => CompoundUnit::named(fx.m.clone()),
        });
        let base = Value::new(base, unit, crate::value::ValueKind::Number);
        let result = Preflight::Power.check(&base, &Value::number(exponent));
        assert_eq!(result.err().map(|f| f[0].code), expected);
    }

    #[test]
    fn test_power_unit_stays_exact() {
        let fx = fixture();
        let base = Value::with_unit(1.0, CompoundUnit::named(fx.m.clone()).pow(2));
        let unit = UnitPolicy::Power.result_unit(&base, &Value::number(-3.0)).unwrap();
        assert_eq!(unit, CompoundUnit::named(fx.m.clone()).pow(-6));
        assert!(UnitPolicy::Power.result_unit(&base, &Value::number(1e10)).is_none());
    }

    #[test]
    fn test_match_left_dimensions_converts_right() {
        let fx = fixture();
        let left = Value::with_unit(1.0, CompoundUnit::named(fx.m.clone()));
        let right = Value::with_unit(1.0, CompoundUnit::named(fx.km.clone()));
        let prepared = Prepare::MatchLeftDimensions.apply(&left, &right).unwrap();
        assert_eq!(prepared.magnitude(), 1000.0);
        assert_eq!(prepared.unit().and_then(|u| u.name()), Some("m"));
        let unit = UnitPolicy::Product.result_unit(&left, &prepared).unwrap();
        assert_eq!(unit.to_string(), "m^2");
    }

    #[test]
    fn test_quotient_of_unitless_left() {
        let fx = fixture();
        let left = Value::number(1.0);
        let right = Value::with_unit(2.0, CompoundUnit::named(fx.s.clone()));
        let unit = UnitPolicy::Quotient.result_unit(&left, &right).unwrap();
        assert_eq!(unit.to_string(), "1/s");
    }
}
