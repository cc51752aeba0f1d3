//! Statement syntax: AST nodes, tokeniser and parser.
pub mod lexer;
pub mod node;
pub mod parser;

pub use node::{ConversionTarget, Node, NodeId, NodeIdAllocator, NodeKind, UnitBody};
pub use parser::{parse_document, ParsedLine, Parser};
