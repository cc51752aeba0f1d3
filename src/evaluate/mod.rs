//! Two-pass evaluation of a statement: label, then evaluate.
//!
//! Both passes share one [`EvalContext`]: a side table of per-node labels,
//! the busy set used to detect cyclic definitions and the error list. The AST
//! itself is never written to.
pub mod context;
pub mod error;
pub mod evaluator;
pub mod labeller;

pub use context::{EvalContext, KnownDefinitions, LabelInfo};
pub use error::{ErrorCode, EvalError};
pub use evaluator::Evaluator;
pub use labeller::TypeLabeller;

use crate::ast::{Node, NodeId};
use crate::environment::Environment;
use crate::scope::ScopeId;
use crate::value::{Value, ValueKind};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Owned copy of a node's labels, kept after the context is gone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLabel {
    pub value_type: Option<ValueKind>,
    pub operator: Option<String>,
    pub definition: Option<NodeId>,
    pub error: Option<ErrorCode>,
}

impl From<&LabelInfo<'_>> for NodeLabel {
    fn from(info: &LabelInfo<'_>) -> Self {
        Self {
            value_type: info.value_type,
            operator: info.operator.map(|op| op.literal().to_string()),
            definition: info.definition.as_ref().map(|d| d.id),
            error: info.error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub value: Option<Value>,
    pub errors: Vec<EvalError>,
    #[serde(skip)]
    pub labels: HashMap<NodeId, NodeLabel>,
}

impl Evaluation {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_codes(&self) -> Vec<ErrorCode> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

/// Labels and evaluates one statement. `scope` supplies unit catalogs for
/// scheme conversions and the angle units for trigonometry; identifiers
/// resolve through the scope recorded on each identifier node.
pub fn evaluate_node(env: &Environment, scope: ScopeId, node: &Arc<Node>) -> Evaluation {
    run(EvalContext::new(env, scope), node)
}

/// Like [`evaluate_node`], but identifiers whose definition `known` has
/// already evaluated take that result instead of re-walking the definition.
pub fn evaluate_node_with(
    env: &Environment,
    scope: ScopeId,
    node: &Arc<Node>,
    known: &dyn KnownDefinitions,
) -> Evaluation {
    run(EvalContext::new(env, scope).with_known(known), node)
}

fn run(mut cx: EvalContext<'_>, node: &Arc<Node>) -> Evaluation {
    let labelled = TypeLabeller::new(&mut cx).label(node);
    let value = match labelled {
        Some(_) => Evaluator::new(&mut cx).evaluate(node),
        None => None,
    };
    trace!(statement = %node, errors = cx.errors.len(), "Evaluated statement");
    let value = if cx.has_errors() { None } else { value };
    Evaluation {
        value,
        labels: cx.labels.iter().map(|(id, info)| (*id, NodeLabel::from(info))).collect(),
        errors: cx.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Parser;
    use crate::config::Prefs;
    use rstest::rstest;

    struct Session {
        env: Environment,
        scope: ScopeId,
    }

    impl Session {
        fn new() -> Self {
            Self::with_prefs(Prefs::default())
        }

        fn with_prefs(prefs: Prefs) -> Self {
            let mut env = Environment::new(prefs);
            let root = env.scopes.root();
            let scope = env.scopes.new_scope(root, Some("doc"));
            Self { env, scope }
        }

        fn parse(&mut self, text: &str) -> Arc<Node> {
            Parser::new(&mut self.env, self.scope).parse_statement(text).unwrap()
        }

        /// Parses and binds a definition the way a document would.
        fn define(&mut self, text: &str) -> Arc<Node> {
            let node = self.parse(text);
            if let Some((name, scope)) = node.defined_variable() {
                let name = name.to_string();
                self.env.scopes.set_variable(scope, &name, node.clone());
            }
            node
        }

        fn eval(&mut self, text: &str) -> Evaluation {
            let node = self.parse(text);
            evaluate_node(&self.env, self.scope, &node)
        }
    }

    #[rstest]
    #[case("1 + 2 * 3", "7")]
    #[case("2 ^ 3 ^ 2", "512")]
    #[case("-2 ^ 2", "-4")]
    #[case("5!", "120")]
    #[case("2000 m in km", "2 km")]
    #[case("1 km + 500 m", "1.5 km")]
    #[case("3 km * 2 m", "0.006 km^2")]
    #[case("2 m/s * 3 s", "6 m")]
    #[case("10% * 150", "15")]
    #[case("150 + 10%", "165")]
    #[case("1 km > 500 m", "true")]
    #[case("not (1 < 2) or true", "true")]
    #[case("sqrt(16 m^2)", "4 m")]
    fn test_expressions(#[case] text: &str, #[case] expected: &str) {
        let evaluation = Session::new().eval(text);
        assert!(evaluation.errors.is_empty(), "{}: {:?}", text, evaluation.errors);
        assert_eq!(evaluation.value.unwrap().to_string(), expected, "{}", text);
    }

    #[rstest]
    #[case("1 m + 1 s", vec![ErrorCode::DimensionMismatch, ErrorCode::DimensionMismatch])]
    #[case("1 / 0", vec![ErrorCode::DivideByZero])]
    #[case("(-8) ^ 0.5", vec![ErrorCode::NegativeNumberExponentiation])]
    #[case("sqrt(-1)", vec![ErrorCode::NegativeNumberSqrt])]
    #[case("2.5!", vec![ErrorCode::Complicated])]
    #[case("5 m!", vec![ErrorCode::Complicated])]
    #[case("(1 m)^1e10", vec![ErrorCode::Complicated])]
    #[case("(1 m^2)^3000000000", vec![ErrorCode::Complicated])]
    #[case("(1 m)^-1e10", vec![ErrorCode::Complicated])]
    #[case("true + 1", vec![ErrorCode::TypeMismatch, ErrorCode::TypeMismatch])]
    #[case("nothing * 2", vec![ErrorCode::NoSuchVariable])]
    #[case("2 m in s", vec![ErrorCode::DimensionMismatch])]
    fn test_errors(#[case] text: &str, #[case] expected: Vec<ErrorCode>) {
        let evaluation = Session::new().eval(text);
        assert_eq!(evaluation.error_codes(), expected, "{}", text);
        assert!(evaluation.value.is_none());
    }

    #[test]
    fn test_dimension_mismatch_is_reported_per_operand() {
        let mut session = Session::new();
        let node = session.parse("1 m + 1 s");
        let evaluation = evaluate_node(&session.env, session.scope, &node);
        let children: Vec<NodeId> = node.children().iter().map(|c| c.id).collect();
        let reported: Vec<NodeId> = evaluation.errors.iter().map(|e| e.node).collect();
        assert_eq!(reported, children);
        assert_eq!(evaluation.labels[&children[0]].error, Some(ErrorCode::DimensionMismatch));
    }

    #[rstest]
    #[case("1e12!")]
    #[case("171!")]
    fn test_huge_factorials_are_infinite(#[case] text: &str) {
        let evaluation = Session::new().eval(text);
        assert!(evaluation.errors.is_empty(), "{}: {:?}", text, evaluation.errors);
        assert!(evaluation.value.unwrap().magnitude().is_infinite());
    }

    #[test]
    fn test_large_unit_powers_within_range() {
        let evaluation = Session::new().eval("(1 m)^300");
        assert_eq!(evaluation.value.unwrap().to_string(), "1 m^300");
    }

    struct Known(HashMap<NodeId, Evaluation>);

    impl KnownDefinitions for Known {
        fn evaluation_of(&self, definition: NodeId) -> Option<&Evaluation> {
            self.0.get(&definition)
        }
    }

    #[test]
    fn test_known_definitions_are_not_walked_again() {
        let mut session = Session::new();
        let speed = session.define("speed = 10 km / 2 h");
        let broken = session.define("broken = 1 / 0");
        let unknown = session.define("unknown = 1");
        let stale = Evaluation { value: Some(Value::number(7.0)), ..Evaluation::default() };
        let known = Known(HashMap::from([
            (speed.id, stale),
            (broken.id, evaluate_node(&session.env, session.scope, &broken)),
            (unknown.id, Evaluation::default()),
        ]));

        // The stored result wins over the definition's own text.
        let node = session.parse("speed * 2");
        let evaluation = evaluate_node_with(&session.env, session.scope, &node, &known);
        assert_eq!(evaluation.value.unwrap().to_string(), "14");

        // A failed definition hands its errors on, once.
        let node = session.parse("broken + broken");
        let evaluation = evaluate_node_with(&session.env, session.scope, &node, &known);
        assert_eq!(evaluation.error_codes(), vec![ErrorCode::DivideByZero]);

        let node = session.parse("unknown + 1");
        let evaluation = evaluate_node_with(&session.env, session.scope, &node, &known);
        assert_eq!(evaluation.error_codes(), vec![ErrorCode::UncalculatedVariable]);
    }

    #[test]
    fn test_divide_by_zero_has_no_value() {
        let evaluation = Session::new().eval("1 / 0");
        assert_eq!(evaluation.errors.len(), 1);
        assert_eq!(evaluation.errors[0].code, ErrorCode::DivideByZero);
        assert!(evaluation.value.is_none());
    }

    #[test]
    fn test_percent_of_number_is_plain_number() {
        let value = Session::new().eval("10% * 150").value.unwrap();
        assert!((value.magnitude() - 15.0).abs() < 1e-12);
        assert!(value.unit().is_none());
        assert_eq!(value.kind(), ValueKind::Number);
    }

    #[test]
    fn test_conversion_between_declared_units() {
        let mut session = Session::with_prefs(Prefs { load_prelude: false, ..Prefs::default() });
        session.parse("unit m: Length");
        session.parse("unit km: 1000 m");
        let value = session.eval("2000 m in km").value.unwrap();
        assert!((value.magnitude() - 2.0).abs() < 1e-12);
        assert_eq!(value.unit().and_then(|u| u.name()), Some("km"));
    }

    #[test]
    fn test_variables_resolve_through_scope() {
        let mut session = Session::new();
        session.define("speed = 10 km / 2 h");
        let evaluation = session.eval("speed * 3 h");
        assert_eq!(evaluation.value.unwrap().to_string(), "15 km");
        let definition = session.env.scopes.find_variable(session.scope, "speed").unwrap().id;
        assert!(evaluation.labels.values().any(|l| l.definition == Some(definition)));
    }

    #[test]
    fn test_cyclic_definitions_are_reported() {
        let mut session = Session::new();
        let a = session.define("a = b + 1");
        session.define("b = a * 2");
        let evaluation = evaluate_node(&session.env, session.scope, &a);
        let codes = evaluation.error_codes();
        assert!(codes.contains(&ErrorCode::UncalculatedVariable));
        assert!(codes.contains(&ErrorCode::CyclicDefinition));
        assert!(evaluation.errors.iter().any(|e| e.code == ErrorCode::CyclicDefinition && e.node == a.id));
        assert!(evaluation.value.is_none());

        // No busy state leaks into the next evaluation.
        let again = evaluate_node(&session.env, session.scope, &a);
        assert_eq!(again.error_codes(), codes);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let mut session = Session::new();
        session.define("x = 3 mile / 20 min");
        let node = session.parse("x in kph");
        let first = evaluate_node(&session.env, session.scope, &node);
        let second = evaluate_node(&session.env, session.scope, &node);
        let (a, b) = (first.value.unwrap(), second.value.unwrap());
        assert_eq!(a.magnitude().to_bits(), b.magnitude().to_bits());
        assert_eq!(a.unit(), b.unit());
        assert_eq!(first.errors, second.errors);
    }

    #[test]
    fn test_scheme_conversion() {
        let mut session = Session::new();
        let value = session.eval("5 km in Imperial").value.unwrap();
        assert_eq!(value.unit().and_then(|u| u.name()), Some("mile"));
        assert!((value.magnitude() - 3.10686).abs() < 1e-4);
        // Without a preferred scheme, `to scheme` leaves the value alone.
        assert_eq!(session.eval("5 km to scheme").value.unwrap().to_string(), "5 km");
    }

    #[test]
    fn test_inverse_trig_in_degrees() {
        let mut env = Environment::new(Prefs { angle_unit: "degrees".to_string(), ..Prefs::default() });
        let root = env.scopes.root();
        let node = Parser::new(&mut env, root).parse_statement("asin 0.5").unwrap();
        let value = evaluate_node(&env, root, &node).value.unwrap();
        assert!((value.magnitude() - 30.0).abs() < 1e-9);
        assert_eq!(value.unit().and_then(|u| u.name()), Some("degrees"));
    }
}
