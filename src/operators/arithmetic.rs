use super::policy::{Prepare, Preflight, UnaryCheck, UnitPolicy};
use super::{BinaryOperator, OperatorTable, UnaryOperator};
use crate::value::ValueKind::Number;

pub fn register(table: &mut OperatorTable) {
    let numbers = (Number, Number);

    table.add_binary(
        BinaryOperator::new("+", numbers, Number, |a, b| a + b)
            .preflight(Preflight::SameDimensions)
            .units(UnitPolicy::SameAsLeft)
            .prepare(Prepare::ConvertToLeft),
    );
    table.add_binary(
        BinaryOperator::new("-", numbers, Number, |a, b| a - b)
            .preflight(Preflight::SameDimensions)
            .units(UnitPolicy::SameAsLeft)
            .prepare(Prepare::ConvertToLeft),
    );
    table.add_binary(
        BinaryOperator::new("*", numbers, Number, |a, b| a * b)
            .units(UnitPolicy::Product)
            .prepare(Prepare::MatchLeftDimensions),
    );
    table.add_binary(
        BinaryOperator::new("/", numbers, Number, |a, b| a / b)
            .preflight(Preflight::NonZeroDivisor)
            .units(UnitPolicy::Quotient)
            .prepare(Prepare::MatchLeftDimensions),
    );
    table.add_binary(
        BinaryOperator::new("^", numbers, Number, f64::powf)
            .preflight(Preflight::Power)
            .units(UnitPolicy::Power),
    );

    table.add_unary(UnaryOperator::prefix("-", Number, Number, |a| -a));
    table.add_unary(
        UnaryOperator::postfix("!", Number, Number, factorial).check(UnaryCheck::Counting),
    );
}

/// Largest `n` whose factorial is finite in an `f64`.
const MAX_FINITE_FACTORIAL: f64 = 170.0;

fn factorial(n: f64) -> f64 {
    if n > MAX_FINITE_FACTORIAL {
        return f64::INFINITY;
    }
    (2..=n as u64).fold(1.0, |acc, k| acc * k as f64)
}
