//! Database handle combining the storage engine and the catalog.

use std::sync::Arc;

use sewerdb_core::{
    BootstrapOutcome, Error, RelationDef, Row, SchemaBundle, StorageConfig, StorageEngine, TxResult,
    ValidationReport, Validator, WriteMode,
};
use sewerdb_model::{sewer_schema, Entity};
use tracing::{debug, info};

use crate::cascade::CascadeResult;
use crate::mutation::UnitOfWork;

/// An open sewer database.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Database {
    storage: StorageEngine,
}

impl Database {
    /// Open a database with the given configuration.
    ///
    /// Nothing is materialized until [`Database::bootstrap`] runs.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let storage = StorageEngine::open(config)?;
        if storage.was_recovered() {
            info!(
                version = storage.catalog().current_version(),
                "opened existing database"
            );
        }
        Ok(Self { storage })
    }

    /// Open a database and materialize the sewer schema.
    pub fn open_sewer(config: StorageConfig) -> Result<Self, Error> {
        let db = Self::open(config)?;
        db.bootstrap(sewer_schema()?)?;
        Ok(db)
    }

    /// Materialize a schema. See [`StorageEngine::bootstrap`].
    pub fn bootstrap(&self, schema: SchemaBundle) -> Result<BootstrapOutcome, Error> {
        self.storage.bootstrap(schema)
    }

    /// The underlying storage engine.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// The current schema.
    pub fn schema(&self) -> Result<Arc<SchemaBundle>, Error> {
        self.storage.schema()
    }

    /// Validate a candidate row for insertion against the stored rows.
    pub fn validate_row(&self, entity: &str, row: &Row) -> Result<ValidationReport, Error> {
        let schema = self.schema()?;
        Validator::new(&schema).validate(&self.storage, entity, row, WriteMode::Insert)
    }

    /// Validate a typed record for insertion.
    pub fn validate<E: Entity>(&self, record: &E) -> Result<ValidationReport, Error> {
        self.validate_row(E::NAME, &record.to_row())
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// Either every write in the unit commits or none does. The closure may
    /// be re-run when it conflicts with a concurrent unit, so it must not
    /// have side effects outside the unit.
    pub fn unit_of_work<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: Fn(&UnitOfWork<'_, '_>) -> TxResult<T>,
    {
        self.storage.transaction(|tx| f(&UnitOfWork::new(tx)))
    }

    /// Validate and store a row, returning its identity.
    pub fn insert_row(&self, entity: &str, row: &Row) -> Result<i64, Error> {
        self.unit_of_work(|uow| uow.insert_row(entity, row))
    }

    /// Validate and store a typed record, returning its identity.
    pub fn insert<E: Entity>(&self, record: &E) -> Result<i64, Error> {
        self.unit_of_work(|uow| uow.insert(record))
    }

    /// Get a row.
    pub fn get_row(&self, entity: &str, id: i64) -> Result<Option<Row>, Error> {
        self.storage.get_row(entity, id)
    }

    /// Get a typed record.
    pub fn get<E: Entity>(&self, id: i64) -> Result<Option<E>, Error> {
        self.get_row(E::NAME, id)?
            .map(|row| E::from_row(&row))
            .transpose()
    }

    /// Merge `changes` into a stored row. Returns the row as stored.
    pub fn update_row(&self, entity: &str, id: i64, changes: &Row) -> Result<Row, Error> {
        self.unit_of_work(|uow| uow.update_row(entity, id, changes))
    }

    /// Replace a stored typed record.
    pub fn update<E: Entity>(&self, record: &E) -> Result<(), Error> {
        self.unit_of_work(|uow| uow.update(record))
    }

    /// Delete a row together with its cascades.
    pub fn delete(&self, entity: &str, id: i64) -> Result<CascadeResult, Error> {
        self.unit_of_work(|uow| uow.delete(entity, id))
    }

    /// All rows of an entity in identity order.
    pub fn scan_rows(&self, entity: &str) -> Result<Vec<(i64, Row)>, Error> {
        self.storage.scan(entity).collect()
    }

    /// All records of an entity in identity order.
    pub fn scan<E: Entity>(&self) -> Result<Vec<E>, Error> {
        self.storage
            .scan(E::NAME)
            .map(|result| result.and_then(|(_, row)| E::from_row(&row)))
            .collect()
    }

    /// Number of rows of an entity.
    pub fn count(&self, entity: &str) -> Result<usize, Error> {
        self.storage.count(entity)
    }

    /// Rows related to `parent_id` through a relation.
    ///
    /// `lookup` is a relation name or an unambiguous inverse name. For a
    /// foreign key the result is the referencing rows; for a many-to-many
    /// relation it is the distinct rows on the far side of the join.
    pub fn related(&self, lookup: &str, parent_id: i64) -> Result<Vec<(i64, Row)>, Error> {
        let schema = self.schema()?;
        let relation = resolve_lookup(&schema, None, lookup)?;
        self.follow(&schema, relation, parent_id)
    }

    /// Like [`Database::related`], choosing among relations that share an
    /// inverse name by the parent entity.
    pub fn related_from(
        &self,
        parent_entity: &str,
        lookup: &str,
        parent_id: i64,
    ) -> Result<Vec<(i64, Row)>, Error> {
        let schema = self.schema()?;
        let relation = resolve_lookup(&schema, Some(parent_entity), lookup)?;
        self.follow(&schema, relation, parent_id)
    }

    fn follow(
        &self,
        schema: &SchemaBundle,
        relation: &RelationDef,
        parent_id: i64,
    ) -> Result<Vec<(i64, Row)>, Error> {
        let mut rows = Vec::new();

        if let Some(join) = &relation.edge_entity {
            let edge = schema
                .foreign_keys_from(join)
                .into_iter()
                .find(|r| r.to_entity == relation.from_entity && r.from_field == relation.from_field)
                .ok_or_else(|| Error::UnknownLookup {
                    lookup: relation.name.clone(),
                })?;

            let mut targets = Vec::new();
            for edge_id in self.storage.child_ids(&edge.name, parent_id)? {
                if let Some(edge_row) = self.storage.get_row(join, edge_id)? {
                    if let Some(target) = edge_row.get_i64(&relation.to_field) {
                        if !targets.contains(&target) {
                            targets.push(target);
                        }
                    }
                }
            }
            targets.sort_unstable();
            for id in targets {
                if let Some(row) = self.storage.get_row(&relation.to_entity, id)? {
                    rows.push((id, row));
                }
            }
        } else {
            for id in self.storage.child_ids(&relation.name, parent_id)? {
                if let Some(row) = self.storage.get_row(&relation.from_entity, id)? {
                    rows.push((id, row));
                }
            }
        }

        debug!(relation = %relation.name, parent_id, found = rows.len(), "related rows");
        Ok(rows)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.storage.flush()
    }

    /// Flush and close the database.
    pub fn close(self) -> Result<(), Error> {
        self.storage.flush()?;
        info!("database closed");
        Ok(())
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.storage.flush() {
            tracing::warn!(error = %e, "flush on drop failed");
        }
    }
}

/// Find the relation a lookup name refers to.
///
/// An exact relation name wins. Otherwise the inverse names are searched,
/// narrowed to relations whose referenced side is `parent` when given.
fn resolve_lookup<'s>(
    schema: &'s SchemaBundle,
    parent: Option<&str>,
    lookup: &str,
) -> Result<&'s RelationDef, Error> {
    if let Some(relation) = schema.get_relation(lookup) {
        return Ok(relation);
    }

    let candidates: Vec<&RelationDef> = schema
        .find_lookup(lookup)
        .into_iter()
        .filter(|r| parent.map_or(true, |p| parent_entity(r) == p))
        .collect();

    match candidates.as_slice() {
        [] => Err(Error::UnknownLookup {
            lookup: lookup.to_string(),
        }),
        [relation] => Ok(*relation),
        many => Err(Error::AmbiguousLookup {
            lookup: lookup.to_string(),
            candidates: many.iter().map(|r| r.name.clone()).collect(),
        }),
    }
}

/// The entity a lookup starts from.
fn parent_entity(relation: &RelationDef) -> &str {
    if relation.is_many_to_many() {
        &relation.from_entity
    } else {
        &relation.to_entity
    }
}
