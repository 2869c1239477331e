//! Catalog manager for storing and retrieving schema metadata.

use super::SchemaBundle;
use crate::error::Error;
use parking_lot::RwLock;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tree name for schema bundles.
const SCHEMA_TREE: &str = "catalog:schemas";

/// Tree name for catalog metadata.
const META_TREE: &str = "catalog:meta";

/// Key for current schema version in meta tree.
const CURRENT_VERSION_KEY: &[u8] = b"current_version";

/// The catalog manager for schema metadata.
pub struct Catalog {
    /// Schema bundles tree.
    schema_tree: Tree,
    /// Metadata tree.
    meta_tree: Tree,
    /// Current schema version (cached).
    current_version: AtomicU64,
    /// Current schema (cached).
    current_schema: RwLock<Option<Arc<SchemaBundle>>>,
}

impl Catalog {
    /// Open or create a catalog using the given sled database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        let schema_tree = db.open_tree(SCHEMA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;

        let current_version = match meta_tree.get(CURRENT_VERSION_KEY)? {
            Some(bytes) => decode_version(&bytes)?,
            None => 0,
        };

        let catalog = Self {
            schema_tree,
            meta_tree,
            current_version: AtomicU64::new(current_version),
            current_schema: RwLock::new(None),
        };

        if current_version > 0 {
            if let Some(schema) = catalog.schema_at_version(current_version)? {
                *catalog.current_schema.write() = Some(Arc::new(schema));
            }
        }

        Ok(catalog)
    }

    /// Get the current schema version.
    pub fn current_version(&self) -> u64 {
        self.current_version.load(Ordering::SeqCst)
    }

    /// Get the current schema bundle.
    pub fn current_schema(&self) -> Option<Arc<SchemaBundle>> {
        self.current_schema.read().clone()
    }

    /// Get the current schema, failing if nothing has been bootstrapped.
    pub fn require_schema(&self) -> Result<Arc<SchemaBundle>, Error> {
        self.current_schema().ok_or(Error::NoSchema)
    }

    /// Get a schema bundle at a specific version.
    pub fn schema_at_version(&self, version: u64) -> Result<Option<SchemaBundle>, Error> {
        let key = version.to_be_bytes();
        match self.schema_tree.get(key)? {
            Some(bytes) => Ok(Some(SchemaBundle::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Apply a new schema bundle.
    ///
    /// The bundle and the version pointer are written in one transaction.
    /// Returns the new version number.
    pub fn apply_schema(&self, mut bundle: SchemaBundle) -> Result<u64, Error> {
        let new_version = self.current_version() + 1;
        bundle.version = new_version;

        let key = new_version.to_be_bytes();
        let value = bundle.to_bytes()?;

        (&self.schema_tree, &self.meta_tree)
            .transaction(|(schemas, meta)| {
                schemas.insert(&key[..], value.as_slice())?;
                meta.insert(CURRENT_VERSION_KEY, &key[..])?;
                Ok::<_, ConflictableTransactionError<Error>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => Error::Storage(e),
            })?;

        self.current_version.store(new_version, Ordering::SeqCst);
        *self.current_schema.write() = Some(Arc::new(bundle));

        Ok(new_version)
    }

    /// List all schema versions.
    pub fn list_versions(&self) -> Result<Vec<u64>, Error> {
        let mut versions = Vec::new();
        for result in self.schema_tree.iter() {
            let (key, _) = result?;
            versions.push(decode_version(&key)?);
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.schema_tree.flush()?;
        self.meta_tree.flush()?;
        Ok(())
    }
}

fn decode_version(bytes: &[u8]) -> Result<u64, Error> {
    let buf: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, RelationDef, ScalarType};

    fn sample_schema() -> SchemaBundle {
        let station = EntityDef::new("WeatherStation", "Weather_station_ID")
            .with_field(FieldDef::surrogate_key("Weather_station_ID"))
            .with_field(FieldDef::optional("X_coordinate", ScalarType::Float64));

        let rainfall = EntityDef::new("Rainfall", "id")
            .with_field(FieldDef::surrogate_key("id"))
            .with_field(FieldDef::optional("Weather_station_ID", ScalarType::Int64))
            .with_field(FieldDef::optional("Intensity", ScalarType::Float64));

        let relation = RelationDef::many_to_one(
            "rainfall_station",
            "Rainfall",
            "Weather_station_ID",
            "WeatherStation",
            "Weather_station_ID",
        );

        SchemaBundle::new(0)
            .with_entity(station)
            .with_entity(rainfall)
            .with_relation(relation)
    }

    fn test_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[test]
    fn test_catalog_open_empty() {
        let db = test_db();
        let catalog = Catalog::open(&db).unwrap();

        assert_eq!(catalog.current_version(), 0);
        assert!(catalog.current_schema().is_none());
        assert!(matches!(catalog.require_schema(), Err(Error::NoSchema)));
    }

    #[test]
    fn test_apply_schema() {
        let db = test_db();
        let catalog = Catalog::open(&db).unwrap();

        let version = catalog.apply_schema(sample_schema()).unwrap();

        assert_eq!(version, 1);
        assert_eq!(catalog.current_version(), 1);
        assert_eq!(catalog.require_schema().unwrap().version, 1);
        let schema = catalog.current_schema().unwrap();
        assert_eq!(schema.entity_names(), vec!["Rainfall", "WeatherStation"]);
        assert!(schema.get_relation("rainfall_station").is_some());
        assert!(schema.get_entity("Pipe").is_none());
    }

    #[test]
    fn test_schema_versioning() {
        let db = test_db();
        let catalog = Catalog::open(&db).unwrap();

        catalog.apply_schema(sample_schema()).unwrap();
        let v2 = catalog
            .apply_schema(sample_schema().with_entity(
                EntityDef::new("Manhole", "Manhole_ID")
                    .with_field(FieldDef::surrogate_key("Manhole_ID")),
            ))
            .unwrap();
        assert_eq!(v2, 2);

        let v1 = catalog.schema_at_version(1).unwrap().unwrap();
        assert_eq!(v1.entities.len(), 2);
        assert_eq!(catalog.list_versions().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let config = sled::Config::new().path(dir.path());

        {
            let db = config.clone().open().unwrap();
            let catalog = Catalog::open(&db).unwrap();
            catalog.apply_schema(sample_schema()).unwrap();
            catalog.flush().unwrap();
        }

        {
            let db = config.open().unwrap();
            let catalog = Catalog::open(&db).unwrap();

            assert_eq!(catalog.current_version(), 1);
            let schema = catalog.current_schema().unwrap();
            assert_eq!(schema.entities.len(), 2);
        }
    }
}
