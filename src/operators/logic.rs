//! Comparisons and boolean connectives. Booleans travel as `1.0`/`0.0`.
use super::policy::{Prepare, Preflight};
use super::{BinaryOperator, OperatorTable, UnaryOperator};
use crate::value::ValueKind::{self, Boolean, Number, Percent};

fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
}

fn comparisons() -> [(&'static str, fn(f64, f64) -> f64); 6] {
    [
        ("<", |a, b| truth(a < b)),
        ("<=", |a, b| truth(a <= b || approx_eq(a, b))),
        (">", |a, b| truth(a > b)),
        (">=", |a, b| truth(a >= b || approx_eq(a, b))),
        ("==", |a, b| truth(approx_eq(a, b))),
        ("!=", |a, b| truth(!approx_eq(a, b))),
    ]
}

fn register_comparisons(table: &mut OperatorTable, kind: ValueKind) {
    for (literal, calculate) in comparisons() {
        table.add_binary(
            BinaryOperator::new(literal, (kind, kind), Boolean, calculate)
                .preflight(Preflight::SameDimensions)
                .prepare(Prepare::ConvertToLeft),
        );
    }
}

pub fn register(table: &mut OperatorTable) {
    register_comparisons(table, Number);
    register_comparisons(table, Percent);

    let booleans = (Boolean, Boolean);
    table.add_binary(BinaryOperator::new("and", booleans, Boolean, |a, b| truth(a != 0.0 && b != 0.0)));
    table.add_binary(BinaryOperator::new("or", booleans, Boolean, |a, b| truth(a != 0.0 || b != 0.0)));
    table.add_binary(BinaryOperator::new("==", booleans, Boolean, |a, b| truth(a == b)));
    table.add_binary(BinaryOperator::new("!=", booleans, Boolean, |a, b| truth(a != b)));
    table.add_unary(UnaryOperator::prefix("not", Boolean, Boolean, |a| truth(a == 0.0)));
}

#[cfg(test)]
mod tests {
    use crate::operators::{AngleUnits, OperatorTable};
    use crate::units::compound::tests::fixture;
    use crate::units::CompoundUnit;
    use crate::value::{Value, ValueKind};
    use rstest::rstest;

    #[rstest]
    #[case(1.0, "<", 2.0, true)]
    #[case(2.0, "<=", 2.0, true)]
    #[case(0.1 + 0.2, "==", 0.3, true)]
    #[case(3.0, "!=", 3.0, false)]
    #[case(3.0, ">", 4.0, false)]
    fn test_number_comparisons(#[case] a: f64, #[case] op: &str, #[case] b: f64, #[case] expected: bool) {
        let table = OperatorTable::standard();
        let cmp = table.binary(ValueKind::Number, op, ValueKind::Number).unwrap();
        let value = cmp.apply(&Value::number(a), &Value::number(b)).unwrap();
        assert_eq!(value.kind(), ValueKind::Boolean);
        assert_eq!(value.as_bool(), expected);
    }

    #[test]
    fn test_comparison_across_units() {
        let fx = fixture();
        let table = OperatorTable::standard();
        let gt = table.binary(ValueKind::Number, ">", ValueKind::Number).unwrap();
        let km = Value::with_unit(1.0, CompoundUnit::named(fx.km.clone()));
        let m = Value::with_unit(500.0, CompoundUnit::named(fx.m.clone()));
        assert!(gt.apply(&km, &m).unwrap().as_bool());
        let s = Value::with_unit(1.0, CompoundUnit::named(fx.s.clone()));
        assert_eq!(gt.apply(&km, &s).unwrap_err().len(), 2);
    }

    #[test]
    fn test_connectives() {
        let table = OperatorTable::standard();
        let t = Value::boolean(true);
        let f = Value::boolean(false);
        let and = table.binary(ValueKind::Boolean, "and", ValueKind::Boolean).unwrap();
        let or = table.binary(ValueKind::Boolean, "or", ValueKind::Boolean).unwrap();
        assert!(!and.apply(&t, &f).unwrap().as_bool());
        assert!(or.apply(&t, &f).unwrap().as_bool());
        let not = table.prefix("not", ValueKind::Boolean).unwrap();
        assert!(not.apply(&f, &AngleUnits::default()).unwrap().as_bool());
    }
}
