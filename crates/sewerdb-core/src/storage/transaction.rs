//! Transactional view over the data trees.
//!
//! Every write goes through [`Transaction`], which keeps the foreign-key
//! child lists and the unique index in step with the rows themselves. Reads
//! observe the transaction's own earlier writes.

use super::key::{self, row_key};
use super::Record;
use crate::catalog::{ConstraintDef, EntityDef, SchemaBundle};
use crate::constraint::RowLookup;
use crate::error::{ConstraintError, Error};
use crate::value::{Row, Value};
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use tracing::debug;

/// Result type for operations running inside a transaction.
pub type TxResult<T> = Result<T, ConflictableTransactionError<Error>>;

fn abort<T>(error: impl Into<Error>) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(error.into()))
}

/// A running transaction.
pub struct Transaction<'t> {
    schema: &'t SchemaBundle,
    rows: &'t TransactionalTree,
    seq: &'t TransactionalTree,
    fk: &'t TransactionalTree,
    unique: &'t TransactionalTree,
}

impl<'t> Transaction<'t> {
    pub(crate) fn new(
        schema: &'t SchemaBundle,
        rows: &'t TransactionalTree,
        seq: &'t TransactionalTree,
        fk: &'t TransactionalTree,
        unique: &'t TransactionalTree,
    ) -> Self {
        Self {
            schema,
            rows,
            seq,
            fk,
            unique,
        }
    }

    /// The schema this transaction runs against.
    pub fn schema(&self) -> &'t SchemaBundle {
        self.schema
    }

    fn entity(&self, name: &str) -> TxResult<&'t EntityDef> {
        match self.schema.get_entity(name) {
            Some(def) => Ok(def),
            None => abort(ConstraintError::UnknownEntity {
                entity: name.to_string(),
            }),
        }
    }

    /// Get a stored record.
    pub fn get(&self, entity: &str, id: i64) -> TxResult<Option<Record>> {
        match self.rows.get(row_key(entity, id))? {
            Some(bytes) => Record::from_bytes(&bytes)
                .map(Some)
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(None),
        }
    }

    /// Get a stored row.
    pub fn get_row(&self, entity: &str, id: i64) -> TxResult<Option<Row>> {
        match self.get(entity, id)? {
            Some(record) => record
                .row()
                .map(Some)
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(None),
        }
    }

    /// Identities of rows referencing `parent_id` through `relation`.
    pub fn child_ids(&self, relation: &str, parent_id: i64) -> TxResult<Vec<i64>> {
        match self.fk.get(key::fk_key(relation, parent_id))? {
            Some(bytes) => key::decode_ids(&bytes).map_err(ConflictableTransactionError::Abort),
            None => Ok(Vec::new()),
        }
    }

    fn last_id(&self, entity: &str) -> TxResult<i64> {
        match self.seq.get(entity.as_bytes())? {
            Some(bytes) => key::decode_ids(&bytes)
                .map(|ids| ids.first().copied().unwrap_or(0))
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(0),
        }
    }

    /// Assign the next identity of an entity.
    pub fn next_id(&self, entity: &str) -> TxResult<i64> {
        let Some(id) = self.last_id(entity)?.checked_add(1) else {
            return abort(Error::SequenceExhausted {
                entity: entity.to_string(),
            });
        };
        self.seq.insert(entity.as_bytes(), key::encode_ids(&[id]))?;
        Ok(id)
    }

    /// Make sure future assigned identities stay above an explicit one.
    fn observe_id(&self, entity: &str, id: i64) -> TxResult<()> {
        if id > self.last_id(entity)? {
            self.seq.insert(entity.as_bytes(), key::encode_ids(&[id]))?;
        }
        Ok(())
    }

    /// Store a new row and return its identity.
    ///
    /// A null or absent auto-assigned identity is filled from the entity's
    /// sequence. The row is expected to have been validated already.
    pub fn insert(&self, entity: &str, mut row: Row) -> TxResult<i64> {
        let def = self.entity(entity)?;
        let identity = def.identity_field.as_str();

        let id = match row.value(identity).as_i64() {
            Some(id) => {
                self.observe_id(entity, id)?;
                id
            }
            None if def.has_auto_identity() => self.next_id(entity)?,
            None => {
                return abort(ConstraintError::MissingRequired {
                    entity: entity.to_string(),
                    field: identity.to_string(),
                })
            }
        };
        row.set(identity, id);

        let record = Record::from_row(&row).map_err(ConflictableTransactionError::Abort)?;
        let bytes = record.to_bytes().map_err(ConflictableTransactionError::Abort)?;
        self.rows.insert(row_key(entity, id), bytes)?;
        self.index(def, id, &row)?;

        debug!(entity, id, "row inserted");
        Ok(id)
    }

    /// Replace a stored row, returning the previous version.
    pub fn update(&self, entity: &str, id: i64, mut row: Row) -> TxResult<Row> {
        let def = self.entity(entity)?;
        let Some(old) = self.get(entity, id)? else {
            return abort(Error::NotFound {
                entity: entity.to_string(),
                id,
            });
        };
        let old_row = old.row().map_err(ConflictableTransactionError::Abort)?;
        row.set(def.identity_field.as_str(), id);

        self.unindex(def, id, &old_row)?;
        let encoded = crate::codec::encode_row(&row).map_err(ConflictableTransactionError::Abort)?;
        let record = Record::with_timestamp(encoded, old.created_at);
        let bytes = record.to_bytes().map_err(ConflictableTransactionError::Abort)?;
        self.rows.insert(row_key(entity, id), bytes)?;
        self.index(def, id, &row)?;

        debug!(entity, id, "row updated");
        Ok(old_row)
    }

    /// Remove a stored row, returning it if it existed.
    pub fn remove(&self, entity: &str, id: i64) -> TxResult<Option<Row>> {
        let def = self.entity(entity)?;
        let Some(old) = self.get_row(entity, id)? else {
            return Ok(None);
        };

        self.unindex(def, id, &old)?;
        self.rows.remove(row_key(entity, id))?;

        debug!(entity, id, "row removed");
        Ok(Some(old))
    }

    fn unique_values<'r>(fields: &[String], row: &'r Row) -> Option<Vec<&'r Value>> {
        let values: Vec<&Value> = fields.iter().map(|f| row.value(f)).collect();
        if values.iter().any(|v| v.is_null()) {
            None
        } else {
            Some(values)
        }
    }

    fn index(&self, def: &EntityDef, id: i64, row: &Row) -> TxResult<()> {
        for relation in self.schema.foreign_keys_from(&def.name) {
            if let Some(parent) = row.value(&relation.from_field).as_i64() {
                self.add_child(&relation.name, parent, id)?;
            }
        }

        for constraint in self.schema.constraints_for(&def.name) {
            if let ConstraintDef::Unique { name, fields, .. } = constraint {
                if let Some(values) = Self::unique_values(fields, row) {
                    let key = key::unique_key(&def.name, name, &values)
                        .map_err(ConflictableTransactionError::Abort)?;
                    self.unique.insert(key, key::encode_ids(&[id]))?;
                }
            }
        }
        Ok(())
    }

    fn unindex(&self, def: &EntityDef, id: i64, row: &Row) -> TxResult<()> {
        for relation in self.schema.foreign_keys_from(&def.name) {
            if let Some(parent) = row.value(&relation.from_field).as_i64() {
                self.remove_child(&relation.name, parent, id)?;
            }
        }

        for constraint in self.schema.constraints_for(&def.name) {
            if let ConstraintDef::Unique { name, fields, .. } = constraint {
                if let Some(values) = Self::unique_values(fields, row) {
                    let key = key::unique_key(&def.name, name, &values)
                        .map_err(ConflictableTransactionError::Abort)?;
                    self.unique.remove(key)?;
                }
            }
        }
        Ok(())
    }

    fn add_child(&self, relation: &str, parent: i64, child: i64) -> TxResult<()> {
        let mut ids = self.child_ids(relation, parent)?;
        if !ids.contains(&child) {
            ids.push(child);
            self.fk
                .insert(key::fk_key(relation, parent), key::encode_ids(&ids))?;
        }
        Ok(())
    }

    fn remove_child(&self, relation: &str, parent: i64, child: i64) -> TxResult<()> {
        let mut ids = self.child_ids(relation, parent)?;
        ids.retain(|id| *id != child);
        let key = key::fk_key(relation, parent);
        if ids.is_empty() {
            self.fk.remove(key)?;
        } else {
            self.fk.insert(key, key::encode_ids(&ids))?;
        }
        Ok(())
    }
}

impl RowLookup for Transaction<'_> {
    type Error = ConflictableTransactionError<Error>;

    fn row_exists(&self, entity: &str, id: i64) -> TxResult<bool> {
        Ok(self.rows.get(row_key(entity, id))?.is_some())
    }

    fn unique_owner(
        &self,
        entity: &str,
        constraint: &str,
        values: &[&Value],
    ) -> TxResult<Option<i64>> {
        let key =
            key::unique_key(entity, constraint, values).map_err(ConflictableTransactionError::Abort)?;
        match self.unique.get(key)? {
            Some(bytes) => key::decode_ids(&bytes)
                .map(|ids| ids.first().copied())
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(None),
        }
    }

    fn children(&self, relation: &str, parent_id: i64) -> TxResult<Vec<i64>> {
        self.child_ids(relation, parent_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{
        ConstraintDef, EntityDef, FieldDef, RelationDecl, RelationKind, ScalarType, SchemaBuilder,
    };
    use crate::constraint::RowLookup;
    use crate::error::Error;
    use crate::storage::{StorageConfig, StorageEngine};
    use crate::value::{Row, Value};

    fn engine() -> StorageEngine {
        let mut b = SchemaBuilder::new();
        b.define(
            EntityDef::new("Station", "Station_ID")
                .with_field(FieldDef::surrogate_key("Station_ID"))
                .with_field(FieldDef::optional("Code", ScalarType::String)),
        )
        .unwrap()
        .define(
            EntityDef::new("Reading", "Reading_ID")
                .with_field(FieldDef::surrogate_key("Reading_ID"))
                .with_field(FieldDef::optional("Station_ID", ScalarType::Int64)),
        )
        .unwrap()
        .relate(RelationDecl::new(
            "reading_station",
            "Reading",
            "Station",
            RelationKind::ManyToOne,
            "Station_ID",
        ))
        .unwrap()
        .constrain(ConstraintDef::unique("station_code", "Station", "Code"))
        .unwrap();

        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        engine.bootstrap(b.build()).unwrap();
        engine
    }

    #[test]
    fn test_explicit_id_advances_sequence() {
        let engine = engine();
        let ids = engine
            .transaction(|tx| {
                let a = tx.insert("Station", Row::new().with("Station_ID", 10i64))?;
                let b = tx.insert("Station", Row::new())?;
                Ok((a, b))
            })
            .unwrap();
        assert_eq!(ids, (10, 11));
    }

    #[test]
    fn test_exhausted_sequence_aborts() {
        let engine = engine();
        engine
            .transaction(|tx| tx.insert("Station", Row::new().with("Station_ID", i64::MAX)))
            .unwrap();

        let err = engine
            .transaction(|tx| tx.insert("Station", Row::new()))
            .unwrap_err();
        assert!(matches!(err, Error::SequenceExhausted { ref entity } if entity == "Station"));
        assert_eq!(engine.count("Station").unwrap(), 1);
    }

    #[test]
    fn test_update_moves_child_and_unique_entries() {
        let engine = engine();
        let (s1, s2, r) = engine
            .transaction(|tx| {
                let s1 = tx.insert("Station", Row::new().with("Code", "A"))?;
                let s2 = tx.insert("Station", Row::new().with("Code", "B"))?;
                let r = tx.insert("Reading", Row::new().with("Station_ID", s1))?;
                Ok((s1, s2, r))
            })
            .unwrap();

        engine
            .transaction(|tx| {
                tx.update("Reading", r, Row::new().with("Station_ID", s2))?;
                tx.update("Station", s1, Row::new().with("Code", "C"))?;
                Ok(())
            })
            .unwrap();

        assert!(engine.child_ids("reading_station", s1).unwrap().is_empty());
        assert_eq!(engine.child_ids("reading_station", s2).unwrap(), vec![r]);
        assert_eq!(
            engine
                .unique_owner("Station", "station_code", &[&Value::from("A")])
                .unwrap(),
            None
        );
        assert_eq!(
            engine
                .unique_owner("Station", "station_code", &[&Value::from("C")])
                .unwrap(),
            Some(s1)
        );
    }

    #[test]
    fn test_remove_clears_indexes() {
        let engine = engine();
        let (s, r) = engine
            .transaction(|tx| {
                let s = tx.insert("Station", Row::new().with("Code", "A"))?;
                let r = tx.insert("Reading", Row::new().with("Station_ID", s))?;
                Ok((s, r))
            })
            .unwrap();

        let removed = engine.transaction(|tx| tx.remove("Reading", r)).unwrap();
        assert_eq!(removed.unwrap().get_i64("Station_ID"), Some(s));
        assert!(engine.child_ids("reading_station", s).unwrap().is_empty());

        let missing = engine.transaction(|tx| tx.remove("Reading", r)).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_reads_see_own_writes() {
        let engine = engine();
        engine
            .transaction(|tx| {
                let s = tx.insert("Station", Row::new())?;
                assert!(tx.row_exists("Station", s)?);
                assert_eq!(tx.get_row("Station", s)?.unwrap().get_i64("Station_ID"), Some(s));
                Ok(())
            })
            .unwrap();
    }
}
