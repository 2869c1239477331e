//! SewerDB - a referentially sound store for sewer-pipe condition data.
//!
//! [`Database`] is an explicitly opened handle over a sled store. Writes go
//! through units of work that validate every record against the catalog and
//! commit atomically; deletes follow the per-relation delete behavior.
//!
//! ```no_run
//! use sewerdb::{Database, StorageConfig};
//! use sewerdb::model::{Manhole, Pipe};
//!
//! # fn main() -> Result<(), sewerdb::Error> {
//! let db = Database::open_sewer(StorageConfig::new("./sewer_data"))?;
//! let pipe = db.unit_of_work(|uow| {
//!     let up = uow.insert(&Manhole::default())?;
//!     let down = uow.insert(&Manhole::default())?;
//!     uow.insert(&Pipe {
//!         manhole_up_id: Some(up),
//!         manhole_down_id: Some(down),
//!         ..Default::default()
//!     })
//! })?;
//! assert!(db.get::<Pipe>(pipe)?.is_some());
//! db.close()
//! # }
//! ```

pub mod cascade;
pub mod database;
pub mod mutation;

pub use cascade::{CascadeResult, MAX_CASCADE_DEPTH};
pub use database::Database;
pub use mutation::{abort, UnitOfWork};

pub use sewerdb_core::{
    BootstrapConflict, BootstrapOutcome, ConstraintError, Error, Row, SchemaError, StorageConfig,
    TxResult, ValidationReport, ValidationWarning, Value,
};
pub use sewerdb_model as model;
