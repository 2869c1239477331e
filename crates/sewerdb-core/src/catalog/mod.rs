//! Entity catalog for SewerDB.
//!
//! The catalog stores metadata about entities, relations, constraints, and schema versions.

mod builder;
mod catalog;
mod constraint;
mod diff;
mod entity;
mod field;
mod relation;
mod schema;
mod types;

pub use builder::{RelationDecl, SchemaBuilder};
pub use catalog::Catalog;
pub use constraint::ConstraintDef;
pub use diff::{BootstrapOutcome, SchemaDiff};
pub use entity::EntityDef;
pub use field::FieldDef;
pub use relation::{Cardinality, DeleteBehavior, RelationDef, RelationKind};
pub use schema::SchemaBundle;
pub use types::ScalarType;
