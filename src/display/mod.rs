//! Human-readable renderings of documents.
pub mod trace;

pub use trace::format_trace;
