//! User-visible evaluation error codes.
use crate::ast::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TypeMismatch,
    NoSuchVariable,
    UncalculatedVariable,
    CyclicDefinition,
    DimensionMismatch,
    DivideByZero,
    NegativeNumberExponentiation,
    FractionalUnitPower,
    NegativeNumberSqrt,
    /// Domain errors: factorial of a fraction, `ln` of a negative, ...
    Complicated,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::NoSuchVariable => "NO_SUCH_VARIABLE",
            ErrorCode::UncalculatedVariable => "UNCALCULATED_VARIABLE",
            ErrorCode::CyclicDefinition => "CYCLIC_DEFINITION",
            ErrorCode::DimensionMismatch => "DIMENSION_MISMATCH",
            ErrorCode::DivideByZero => "DIVIDE_BY_ZERO",
            ErrorCode::NegativeNumberExponentiation => "NEGATIVE_NUMBER_EXPONENTIATION",
            ErrorCode::FractionalUnitPower => "FRACTIONAL_UNIT_POWER",
            ErrorCode::NegativeNumberSqrt => "NEGATIVE_NUMBER_SQRT",
            ErrorCode::Complicated => "COMPLICATED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported against one AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvalError {
    pub code: ErrorCode,
    pub node: NodeId,
}

impl EvalError {
    pub fn new(code: ErrorCode, node: NodeId) -> Self {
        Self { code, node }
    }
}
