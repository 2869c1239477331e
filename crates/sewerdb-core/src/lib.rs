//! SewerDB Core - Entity catalog, record validation, and storage.
//!
//! This crate provides the storage-agnostic catalog (entities, fields,
//! relations, constraints) together with a sled-backed engine that can
//! materialize it. It has no knowledge of the sewer domain itself.

pub mod catalog;
pub mod codec;
pub mod constraint;
pub mod error;
pub mod storage;
pub mod value;

pub use catalog::{
    BootstrapOutcome, Cardinality, Catalog, ConstraintDef, DeleteBehavior, EntityDef, FieldDef,
    RelationDecl, RelationDef, RelationKind, ScalarType, SchemaBuilder, SchemaBundle, SchemaDiff,
};
pub use constraint::{RowLookup, ValidationReport, ValidationWarning, Validator, WriteMode};
pub use error::{BootstrapConflict, ConstraintError, Error, SchemaError};
pub use storage::{Record, StorageConfig, StorageEngine, TableHeader, Transaction, TxResult};
pub use value::{Row, Value};
