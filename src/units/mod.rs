//! Unit algebra: dimensions, conversion factors, named and compound units,
//! per-scope unit tables and display schemes.
pub mod compound;
pub mod dimension;
pub mod multiple;
pub mod refactor;
pub mod scheme;
pub mod table;

pub use compound::{CompoundUnit, NamedUnit, Simplified, UnitOrdinals, UnitTerm, MAX_UNIT_EXPONENT};
pub use dimension::Dimension;
pub use multiple::Multiple;
pub use refactor::{factorisations, Factorisation, Refactored, UnitCatalog};
pub use scheme::UnitSchemeHelper;
pub use table::{UnitAliases, UnitsTable};
