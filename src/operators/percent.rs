//! Percentages. `x + p%` grows `x` by `p` percent; `p% * x` and `p% of x`
//! take `p` percent of `x`.
use super::policy::{Preflight, UnaryCheck, UnaryUnits, UnitPolicy};
use super::{BinaryOperator, OperatorTable, UnaryOperator};
use crate::value::ValueKind::{Number, Percent};

pub fn register(table: &mut OperatorTable) {
    table.add_unary(
        UnaryOperator::postfix("%", Number, Percent, |a| a)
            .check(UnaryCheck::Dimensionless)
            .units(UnaryUnits::Drop),
    );
    table.add_unary(UnaryOperator::prefix("-", Percent, Percent, |a| -a));

    let adjust = (Number, Percent);
    table.add_binary(BinaryOperator::new("+", adjust, Number, |x, p| x * (1.0 + p / 100.0)).units(UnitPolicy::LeftOnly));
    table.add_binary(BinaryOperator::new("-", adjust, Number, |x, p| x * (1.0 - p / 100.0)).units(UnitPolicy::LeftOnly));
    table.add_binary(BinaryOperator::new("*", adjust, Number, |x, p| x * p / 100.0).units(UnitPolicy::LeftOnly));
    table.add_binary(
        BinaryOperator::new("/", adjust, Number, |x, p| x / (p / 100.0))
            .preflight(Preflight::NonZeroDivisor)
            .units(UnitPolicy::LeftOnly),
    );

    let share = (Percent, Number);
    table.add_binary(BinaryOperator::new("*", share, Number, |p, x| p / 100.0 * x).units(UnitPolicy::RightOnly));
    table.add_binary(BinaryOperator::new("of", share, Number, |p, x| p / 100.0 * x).units(UnitPolicy::RightOnly));
    table.add_binary(
        BinaryOperator::new("/", share, Percent, |p, x| p / x)
            .preflight(Preflight::NonZeroDivisor)
            .units(UnitPolicy::None),
    );

    let both = (Percent, Percent);
    table.add_binary(BinaryOperator::new("+", both, Percent, |a, b| a + b));
    table.add_binary(BinaryOperator::new("-", both, Percent, |a, b| a - b));
    table.add_binary(BinaryOperator::new("*", both, Percent, |a, b| a * b / 100.0));
}

#[cfg(test)]
mod tests {
    use crate::operators::{AngleUnits, OperatorTable};
    use crate::units::compound::tests::fixture;
    use crate::units::CompoundUnit;
    use crate::value::{Value, ValueKind};
    use rstest::rstest;

    fn apply(left: &Value, op: &str, right: &Value) -> Value {
        let table = OperatorTable::standard();
        table.binary(left.kind(), op, right.kind()).unwrap().apply(left, right).unwrap()
    }

    #[rstest]
    #[case(Value::percent(10.0), "*", Value::number(150.0), "15")]
    #[case(Value::percent(10.0), "of", Value::number(150.0), "15")]
    #[case(Value::number(200.0), "+", Value::percent(10.0), "220")]
    #[case(Value::number(200.0), "-", Value::percent(25.0), "150")]
    #[case(Value::number(200.0), "*", Value::percent(10.0), "20")]
    #[case(Value::number(20.0), "/", Value::percent(10.0), "200")]
    #[case(Value::percent(10.0), "+", Value::percent(5.0), "15%")]
    #[case(Value::percent(50.0), "*", Value::percent(50.0), "25%")]
    fn test_percent_arithmetic(#[case] left: Value, #[case] op: &str, #[case] right: Value, #[case] expected: &str) {
        assert_eq!(apply(&left, op, &right).to_string(), expected);
    }

    #[test]
    fn test_percent_keeps_quantity_unit() {
        let fx = fixture();
        let price = Value::with_unit(150.0, CompoundUnit::named(fx.kg.clone()));
        let share = apply(&Value::percent(10.0), "of", &price);
        assert_eq!(share.to_string(), "15 kg");
        assert_eq!(share.kind(), ValueKind::Number);
    }

    #[test]
    fn test_postfix_percent() {
        let table = OperatorTable::standard();
        let percent = table.postfix(ValueKind::Number, "%").unwrap();
        let value = percent.apply(&Value::number(12.5), &AngleUnits::default()).unwrap();
        assert_eq!(value.kind(), ValueKind::Percent);
        assert_eq!(value.magnitude(), 12.5);
    }
}
