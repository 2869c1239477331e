//! Units of work: validated writes grouped into one atomic transaction.

use sewerdb_core::{
    ConstraintError, Error, Row, Transaction, TxResult, ValidationReport, Validator, WriteMode,
};
use sewerdb_model::Entity;
use sled::transaction::ConflictableTransactionError;
use tracing::debug;

use crate::cascade::{CascadeExecutor, CascadeResult};

/// Abort the surrounding unit of work with `error`.
pub fn abort<T>(error: impl Into<Error>) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(error.into()))
}

/// Writes and reads running inside one atomic unit.
///
/// Every write is validated against the catalog and against the rows
/// visible to the unit, including its own earlier writes. Any error aborts
/// the whole unit.
pub struct UnitOfWork<'a, 't> {
    tx: &'a Transaction<'t>,
    validator: Validator<'t>,
}

impl<'a, 't> UnitOfWork<'a, 't> {
    pub(crate) fn new(tx: &'a Transaction<'t>) -> Self {
        Self {
            tx,
            validator: Validator::new(tx.schema()),
        }
    }

    /// Validate a candidate row for insertion without writing it.
    pub fn validate_row(&self, entity: &str, row: &Row) -> TxResult<ValidationReport> {
        self.validator
            .validate(self.tx, entity, row, WriteMode::Insert)
    }

    /// Validate a typed record for insertion without writing it.
    pub fn validate<E: Entity>(&self, record: &E) -> TxResult<ValidationReport> {
        self.validate_row(E::NAME, &record.to_row())
    }

    /// Validate and store a new row, returning its identity.
    pub fn insert_row(&self, entity: &str, row: &Row) -> TxResult<i64> {
        let report = self.validate_row(entity, row)?;
        self.tx.insert(entity, report.row)
    }

    /// Validate and store a typed record, returning its identity.
    pub fn insert<E: Entity>(&self, record: &E) -> TxResult<i64> {
        self.insert_row(E::NAME, &record.to_row())
    }

    /// Get a row.
    pub fn get_row(&self, entity: &str, id: i64) -> TxResult<Option<Row>> {
        self.tx.get_row(entity, id)
    }

    /// Get a typed record.
    pub fn get<E: Entity>(&self, id: i64) -> TxResult<Option<E>> {
        match self.tx.get_row(E::NAME, id)? {
            Some(row) => E::from_row(&row)
                .map(Some)
                .map_err(ConflictableTransactionError::Abort),
            None => Ok(None),
        }
    }

    /// Merge `changes` into a stored row and write it back.
    ///
    /// The merged row is validated as a whole. Returns the row as stored.
    pub fn update_row(&self, entity: &str, id: i64, changes: &Row) -> TxResult<Row> {
        let Some(mut row) = self.tx.get_row(entity, id)? else {
            return abort(Error::NotFound {
                entity: entity.to_string(),
                id,
            });
        };
        row.merge(changes.clone());

        let report = self
            .validator
            .validate(self.tx, entity, &row, WriteMode::Update { id })?;
        self.tx.update(entity, id, report.row.clone())?;
        Ok(report.row)
    }

    /// Replace a stored typed record.
    pub fn update<E: Entity>(&self, record: &E) -> TxResult<()> {
        let Some(id) = record.id() else {
            return abort(ConstraintError::MissingRequired {
                entity: E::NAME.to_string(),
                field: E::IDENTITY.to_string(),
            });
        };
        self.update_row(E::NAME, id, &record.to_row())?;
        Ok(())
    }

    /// Delete a row, applying the delete behavior of every relation that
    /// references it.
    pub fn delete(&self, entity: &str, id: i64) -> TxResult<CascadeResult> {
        let result = CascadeExecutor::new(self.tx).delete(entity, id)?;
        debug!(entity, id, affected = result.affected_count(), "delete applied");
        Ok(result)
    }

    /// Identities of rows referencing `parent_id` through `relation`.
    pub fn children(&self, relation: &str, parent_id: i64) -> TxResult<Vec<i64>> {
        self.tx.child_ids(relation, parent_id)
    }
}
