//! Library-level error types.
//!
//! These cover failures of the unit algebra, the parser, configuration loading
//! and the document API. User-visible evaluation problems (type mismatches,
//! dimension mismatches, division by zero, ...) are *not* represented here;
//! they are collected as [`crate::evaluate::EvalError`] records so a document
//! can still render partial results.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Cannot convert '{from}' to '{to}': dimensions differ ({from_dimension} vs {to_dimension})")]
    DimensionMismatch {
        from: String,
        to: String,
        from_dimension: String,
        to_dimension: String,
    },
    #[error("No conversion path between '{from}' and '{to}'")]
    NoConversion { from: String, to: String },
    #[error("Cannot factor unit '{0}'")]
    CannotFactor(String),
}

/// A structured parse failure: what the parser expected and where.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error at offset {offset}: expected {}", expected.join(" or "))]
pub struct ParseError {
    pub expected: Vec<String>,
    pub offset: usize,
}

impl ParseError {
    pub fn new(expected: impl IntoIterator<Item = impl Into<String>>, offset: usize) -> Self {
        Self {
            expected: expected.into_iter().map(Into::into).collect(),
            offset,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read preferences: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid preferences: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Unknown statement '{0}'")]
    UnknownStatement(String),
}
