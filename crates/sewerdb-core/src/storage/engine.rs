//! Storage engine implementation.

use super::key::{self, row_key, row_prefix};
use super::transaction::{Transaction, TxResult};
use super::{Record, StorageConfig, TableHeader};
use crate::catalog::{BootstrapOutcome, Catalog, SchemaBundle, SchemaDiff};
use crate::constraint::RowLookup;
use crate::error::{BootstrapConflict, Error};
use crate::value::{Row, Value};
use sled::transaction::TransactionError;
use sled::{Db, Transactional, Tree};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tree name for materialized table headers.
const TABLES_TREE: &str = "tables";

/// Tree name for row data.
const ROWS_TREE: &str = "rows";

/// Tree name for per-entity identity sequences.
const SEQ_TREE: &str = "seq";

/// Tree name for the derived foreign-key lookup index.
const FK_INDEX_TREE: &str = "index:fk";

/// Tree name for unique constraint values.
const UNIQUE_INDEX_TREE: &str = "index:unique";

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Schema catalog.
    catalog: Catalog,

    /// Table headers (entity name -> header).
    tables_tree: Tree,

    /// Row data (entity + id -> record).
    rows_tree: Tree,

    /// Last assigned identity per entity.
    seq_tree: Tree,

    /// Child lists (relation + parent id -> child ids).
    fk_tree: Tree,

    /// Unique values (entity + constraint + values -> owner id).
    unique_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let catalog = Catalog::open(&db)?;

        Ok(Self {
            tables_tree: db.open_tree(TABLES_TREE)?,
            rows_tree: db.open_tree(ROWS_TREE)?,
            seq_tree: db.open_tree(SEQ_TREE)?,
            fk_tree: db.open_tree(FK_INDEX_TREE)?,
            unique_tree: db.open_tree(UNIQUE_INDEX_TREE)?,
            catalog,
            db,
        })
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Get the schema catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the current schema, failing if nothing has been bootstrapped.
    pub fn schema(&self) -> Result<Arc<SchemaBundle>, Error> {
        self.catalog.require_schema()
    }

    /// Materialize a schema.
    ///
    /// Idempotent: an identical schema leaves the store untouched, and a
    /// purely additive one only creates the new tables. Anything that would
    /// alter an existing table fails before a single byte is written.
    pub fn bootstrap(&self, bundle: SchemaBundle) -> Result<BootstrapOutcome, Error> {
        let stored = self.catalog.current_schema();

        let added: Vec<String> = match &stored {
            Some(stored) => {
                let diff = SchemaDiff::compute(stored, &bundle);
                if let Some(conflict) = diff.conflicts.first() {
                    warn!(%conflict, conflicts = diff.conflicts.len(), "bootstrap refused");
                    return Err(conflict.clone().into());
                }
                self.check_tables(&bundle)?;
                if diff.is_empty() {
                    debug!(version = stored.version, "schema unchanged");
                    return Ok(BootstrapOutcome::Unchanged {
                        version: stored.version,
                    });
                }
                diff.added_entities
            }
            None => {
                self.check_tables(&bundle)?;
                bundle.entities.keys().cloned().collect()
            }
        };

        for name in &added {
            if let Some(entity) = bundle.get_entity(name) {
                let header = TableHeader::new(entity.fingerprint()?);
                self.tables_tree.insert(name.as_bytes(), header.to_bytes()?)?;
            }
        }
        let version = self.catalog.apply_schema(bundle)?;
        self.db.flush()?;

        if stored.is_some() {
            info!(version, added = ?added, "schema extended");
            Ok(BootstrapOutcome::Extended {
                version,
                added_entities: added,
            })
        } else {
            info!(version, tables = added.len(), "schema bootstrapped");
            Ok(BootstrapOutcome::Created {
                version,
                tables: added.len(),
            })
        }
    }

    /// Verify that every already materialized table matches its definition.
    fn check_tables(&self, bundle: &SchemaBundle) -> Result<(), Error> {
        for (name, entity) in &bundle.entities {
            if let Some(header) = self.table_header(name)? {
                let expected = entity.fingerprint()?;
                if header.fingerprint != expected {
                    return Err(BootstrapConflict::FingerprintMismatch {
                        entity: name.clone(),
                        stored: header.fingerprint,
                        expected,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Get the header of a materialized table.
    pub fn table_header(&self, entity: &str) -> Result<Option<TableHeader>, Error> {
        match self.tables_tree.get(entity.as_bytes())? {
            Some(bytes) => Ok(Some(TableHeader::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List all materialized tables in name order.
    pub fn tables(&self) -> Result<Vec<(String, TableHeader)>, Error> {
        let mut tables = Vec::new();
        for result in self.tables_tree.iter() {
            let (name, bytes) = result?;
            let name = String::from_utf8(name.to_vec())
                .map_err(|_| Error::InvalidData("table name is not UTF-8".into()))?;
            tables.push((name, TableHeader::from_bytes(&bytes)?));
        }
        Ok(tables)
    }

    /// Get a stored record.
    pub fn get(&self, entity: &str, id: i64) -> Result<Option<Record>, Error> {
        match self.rows_tree.get(row_key(entity, id))? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a stored row.
    pub fn get_row(&self, entity: &str, id: i64) -> Result<Option<Row>, Error> {
        self.get(entity, id)?.map(|record| record.row()).transpose()
    }

    /// Scan all rows of an entity in identity order.
    pub fn scan(&self, entity: &str) -> impl Iterator<Item = Result<(i64, Row), Error>> + '_ {
        let prefix = row_prefix(entity);
        let prefix_len = prefix.len();

        self.rows_tree.scan_prefix(prefix).map(move |result| {
            let (key_bytes, value_bytes) = result?;
            let id = key::row_id(&key_bytes, prefix_len)?;
            let row = Record::from_bytes(&value_bytes)?.row()?;
            Ok((id, row))
        })
    }

    /// Count the rows of an entity.
    pub fn count(&self, entity: &str) -> Result<usize, Error> {
        let mut count = 0;
        for result in self.rows_tree.scan_prefix(row_prefix(entity)).keys() {
            result?;
            count += 1;
        }
        Ok(count)
    }

    /// Identities of rows referencing `parent_id` through `relation`.
    pub fn child_ids(&self, relation: &str, parent_id: i64) -> Result<Vec<i64>, Error> {
        match self.fk_tree.get(key::fk_key(relation, parent_id))? {
            Some(bytes) => key::decode_ids(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Run `f` as one serializable transaction over the data trees.
    ///
    /// The closure may be re-run when it conflicts with a concurrent writer,
    /// so it must not have side effects outside the transaction.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: Fn(&Transaction<'_>) -> TxResult<T>,
    {
        let schema = self.schema()?;

        (
            &self.rows_tree,
            &self.seq_tree,
            &self.fk_tree,
            &self.unique_tree,
        )
            .transaction(|(rows, seq, fk, unique)| {
                let tx = Transaction::new(&schema, rows, seq, fk, unique);
                f(&tx)
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => Error::Storage(e),
            })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Approximate size of the database on disk, in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        Ok(self.db.size_on_disk()?)
    }
}

impl RowLookup for StorageEngine {
    type Error = Error;

    fn row_exists(&self, entity: &str, id: i64) -> Result<bool, Error> {
        Ok(self.rows_tree.contains_key(row_key(entity, id))?)
    }

    fn unique_owner(
        &self,
        entity: &str,
        constraint: &str,
        values: &[&Value],
    ) -> Result<Option<i64>, Error> {
        match self
            .unique_tree
            .get(key::unique_key(entity, constraint, values)?)?
        {
            Some(bytes) => Ok(key::decode_ids(&bytes)?.first().copied()),
            None => Ok(None),
        }
    }

    fn children(&self, relation: &str, parent_id: i64) -> Result<Vec<i64>, Error> {
        self.child_ids(relation, parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, RelationDecl, RelationKind, ScalarType, SchemaBuilder};

    fn schema() -> SchemaBundle {
        let mut b = SchemaBuilder::new();
        b.define(
            EntityDef::new("Inspection", "Inspection_ID")
                .with_field(FieldDef::surrogate_key("Inspection_ID"))
                .with_field(FieldDef::optional("Comments", ScalarType::String)),
        )
        .unwrap()
        .define(
            EntityDef::new("Defect", "Defect_ID")
                .with_field(FieldDef::surrogate_key("Defect_ID"))
                .with_field(FieldDef::new("Inspection_ID", ScalarType::Int64)),
        )
        .unwrap()
        .relate(RelationDecl::new(
            "defect_inspection",
            "Defect",
            "Inspection",
            RelationKind::ManyToOne,
            "Inspection_ID",
        ))
        .unwrap();
        b.build()
    }

    fn engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    #[test]
    fn test_transaction_requires_schema() {
        let engine = engine();
        let result = engine.transaction(|_tx| Ok(()));
        assert!(matches!(result, Err(Error::NoSchema)));
    }

    #[test]
    fn test_bootstrap_creates_tables() {
        let engine = engine();
        let outcome = engine.bootstrap(schema()).unwrap();

        assert_eq!(outcome, BootstrapOutcome::Created { version: 1, tables: 2 });
        let tables = engine.tables().unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].0, "Defect");
        assert_eq!(tables[0].1.fingerprint.len(), 64);

        let again = engine.bootstrap(schema()).unwrap();
        assert_eq!(again, BootstrapOutcome::Unchanged { version: 1 });
    }

    #[test]
    fn test_insert_scan_and_index() {
        let engine = engine();
        engine.bootstrap(schema()).unwrap();

        let (inspection, defects) = engine
            .transaction(|tx| {
                let inspection = tx.insert("Inspection", Row::new().with("Comments", "ok"))?;
                let a = tx.insert("Defect", Row::new().with("Inspection_ID", inspection))?;
                let b = tx.insert("Defect", Row::new().with("Inspection_ID", inspection))?;
                Ok((inspection, vec![a, b]))
            })
            .unwrap();

        assert_eq!(inspection, 1);
        assert_eq!(defects, vec![1, 2]);
        assert_eq!(engine.count("Defect").unwrap(), 2);
        assert_eq!(
            engine.child_ids("defect_inspection", inspection).unwrap(),
            vec![1, 2]
        );
        assert!(engine.row_exists("Inspection", 1).unwrap());

        let ids: Vec<i64> = engine
            .scan("Defect")
            .map(|r| r.map(|(id, _)| id))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(ids, vec![1, 2]);

        let row = engine.get_row("Inspection", 1).unwrap().unwrap();
        assert_eq!(row.value("Comments"), &Value::from("ok"));
    }

    #[test]
    fn test_aborted_transaction_leaves_nothing() {
        let engine = engine();
        engine.bootstrap(schema()).unwrap();

        let result: Result<(), Error> = engine.transaction(|tx| {
            tx.insert("Inspection", Row::new())?;
            Err(sled::transaction::ConflictableTransactionError::Abort(
                Error::InvalidData("stop".into()),
            ))
        });

        assert!(result.is_err());
        assert_eq!(engine.count("Inspection").unwrap(), 0);
    }
}
