//! A calculator-document engine with physical units.
//!
//! Statements are parsed into immutable ASTs ([`ast`]), typed and evaluated
//! against lexically nested scopes ([`scope`], [`evaluate`]) using a table of
//! unit-aware operators ([`operators`]). A [`document::DocumentModel`] keeps
//! the statements of one document, the dependency graph between them, and
//! re-evaluates only what an edit affects.
pub mod ast;
pub mod config;
pub mod display;
pub mod document;
pub mod environment;
pub mod error;
pub mod evaluate;
pub mod operators;
pub mod prelude;
pub mod scope;
pub mod units;
pub mod value;

// Re-export key types for convenient access
pub use config::Prefs;
pub use document::{DocumentModel, DocumentState, StatementId};
pub use environment::Environment;
pub use error::{ConfigError, DocumentError, ParseError, UnitError};
pub use evaluate::{evaluate_node, ErrorCode, EvalError, Evaluation};
pub use value::{Value, ValueKind};
