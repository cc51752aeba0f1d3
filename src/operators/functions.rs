//! Named functions: roots, logarithms, trigonometry.
use super::policy::{PrepareOperand, UnaryCheck, UnaryUnits};
use super::{OperatorTable, UnaryOperator};
use crate::value::ValueKind::Number;

fn function(name: &str, calculate: fn(f64) -> f64) -> UnaryOperator {
    UnaryOperator::prefix(name, Number, Number, calculate)
}

/// Dimensionless in, dimensionless out, `COMPLICATED` outside `domain`.
fn scalar(name: &str, calculate: fn(f64) -> f64, domain: fn(f64) -> bool) -> UnaryOperator {
    function(name, calculate)
        .check(UnaryCheck::Dimensionless)
        .check(UnaryCheck::Domain(domain))
        .units(UnaryUnits::Drop)
}

fn trig(name: &str, calculate: fn(f64) -> f64) -> UnaryOperator {
    function(name, calculate)
        .check(UnaryCheck::Angle)
        .prepare(PrepareOperand::ToRadians)
        .units(UnaryUnits::Drop)
}

fn inverse_trig(name: &str, calculate: fn(f64) -> f64, domain: fn(f64) -> bool) -> UnaryOperator {
    scalar(name, calculate, domain).units(UnaryUnits::Angle)
}

fn anywhere(_: f64) -> bool {
    true
}

fn positive(x: f64) -> bool {
    x > 0.0
}

fn unit_interval(x: f64) -> bool {
    (-1.0..=1.0).contains(&x)
}

pub fn register(table: &mut OperatorTable) {
    table.add_unary(
        function("sqrt", f64::sqrt)
            .check(UnaryCheck::NonNegative)
            .check(UnaryCheck::EvenRoot)
            .units(UnaryUnits::Sqrt),
    );
    table.add_unary(function("abs", f64::abs));

    table.add_unary(scalar("ln", f64::ln, positive));
    table.add_unary(scalar("log", f64::log10, positive));
    table.add_unary(scalar("exp", f64::exp, anywhere));

    table.add_unary(trig("sin", f64::sin));
    table.add_unary(trig("cos", f64::cos));
    table.add_unary(trig("tan", f64::tan));
    table.add_unary(inverse_trig("asin", f64::asin, unit_interval));
    table.add_unary(inverse_trig("acos", f64::acos, unit_interval));
    table.add_unary(inverse_trig("atan", f64::atan, anywhere));

    table.add_unary(scalar("sinh", f64::sinh, anywhere));
    table.add_unary(scalar("cosh", f64::cosh, anywhere));
    table.add_unary(scalar("tanh", f64::tanh, anywhere));
    table.add_unary(scalar("asinh", f64::asinh, anywhere));
    table.add_unary(scalar("acosh", f64::acosh, |x| x >= 1.0));
    table.add_unary(scalar("atanh", f64::atanh, |x| x > -1.0 && x < 1.0));
}
