//! Cascade executor for handling referential integrity on deletes.
//!
//! Each relation carries its own delete behavior:
//! - CASCADE: Delete referencing rows recursively
//! - RESTRICT: Refuse the delete while referencing rows exist
//! - SET NULL: Clear the foreign key on referencing rows

use std::collections::HashSet;

use serde::Serialize;
use sewerdb_core::{ConstraintError, DeleteBehavior, Error, Transaction, TxResult, Value};
use tracing::debug;

use crate::mutation::abort;

/// Maximum cascade depth to prevent runaway recursion.
pub const MAX_CASCADE_DEPTH: usize = 100;

/// Result of a cascade operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CascadeResult {
    /// Rows that were deleted, the requested row last.
    pub deleted: Vec<(String, i64)>,
    /// Foreign keys that were set to null: entity, id, field.
    pub nullified: Vec<(String, i64, String)>,
}

impl CascadeResult {
    /// Create an empty cascade result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of affected rows.
    pub fn affected_count(&self) -> usize {
        self.deleted.len() + self.nullified.len()
    }
}

/// Executes a delete together with its cascades inside one transaction.
pub struct CascadeExecutor<'a, 't> {
    tx: &'a Transaction<'t>,
}

impl<'a, 't> CascadeExecutor<'a, 't> {
    /// Create a new cascade executor.
    pub fn new(tx: &'a Transaction<'t>) -> Self {
        Self { tx }
    }

    /// Delete a row, applying the delete behavior of every relation that
    /// references it.
    pub fn delete(&self, entity: &str, id: i64) -> TxResult<CascadeResult> {
        if self.tx.get(entity, id)?.is_none() {
            return abort(Error::NotFound {
                entity: entity.to_string(),
                id,
            });
        }

        let mut result = CascadeResult::new();
        let mut visited = HashSet::new();
        self.delete_recursive(entity, id, &mut result, &mut visited, 0)?;
        Ok(result)
    }

    fn delete_recursive(
        &self,
        entity: &str,
        id: i64,
        result: &mut CascadeResult,
        visited: &mut HashSet<(String, i64)>,
        depth: usize,
    ) -> TxResult<()> {
        if depth > MAX_CASCADE_DEPTH {
            return abort(Error::CascadeDepthExceeded { depth });
        }
        if !visited.insert((entity.to_string(), id)) {
            return Ok(());
        }

        let schema = self.tx.schema();
        for relation in schema.foreign_keys_to(entity) {
            let referencing = self.tx.child_ids(&relation.name, id)?;
            if referencing.is_empty() {
                continue;
            }

            match relation.on_delete {
                DeleteBehavior::Restrict => {
                    return abort(ConstraintError::RestrictViolation {
                        relation: relation.name.clone(),
                        entity: entity.to_string(),
                        id,
                        referencing_entity: relation.from_entity.clone(),
                        count: referencing.len(),
                    });
                }
                DeleteBehavior::Cascade => {
                    for child in referencing {
                        self.delete_recursive(
                            &relation.from_entity,
                            child,
                            result,
                            visited,
                            depth + 1,
                        )?;
                    }
                }
                DeleteBehavior::SetNull => {
                    for child in referencing {
                        if let Some(mut row) = self.tx.get_row(&relation.from_entity, child)? {
                            row.set(relation.from_field.as_str(), Value::Null);
                            self.tx.update(&relation.from_entity, child, row)?;
                            result.nullified.push((
                                relation.from_entity.clone(),
                                child,
                                relation.from_field.clone(),
                            ));
                        }
                    }
                }
            }
        }

        if self.tx.remove(entity, id)?.is_some() {
            debug!(entity, id, depth, "row deleted");
            result.deleted.push((entity.to_string(), id));
        }
        Ok(())
    }
}
