//! Documents: statements, the dependency graph between them and the
//! incremental re-evaluation that keeps their values current.
pub mod builder;
pub mod graph;
pub mod model;
pub mod statement;
pub mod topology;

pub use builder::{BindingChange, GraphBuilder, GraphDelta};
pub use graph::{BindingId, BindingKind, DependencyGraph, EdgeKind, GraphKey, KeyedGraph, StatementId};
pub use model::{DocumentModel, DocumentState};
pub use statement::{Position, Statement};
