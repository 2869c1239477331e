//! Storage layer built on sled.
//!
//! Tree layout:
//! - `tables`: materialized table headers, keyed by entity name
//! - `rows`: row records, keyed by entity name and identity
//! - `seq`: last assigned identity per entity
//! - `index:fk`: child identities per relation and parent
//! - `index:unique`: owner of each unique constraint value

mod config;
mod engine;
pub mod key;
mod record;
mod transaction;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use record::{Record, TableHeader};
pub use transaction::{Transaction, TxResult};
