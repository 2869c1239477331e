//! Constraint enforcement module.
//!
//! Record validation against the catalog:
//! - Attribute presence, types and lengths
//! - Range and unique constraints
//! - Foreign keys and one-to-one occupancy
//!
//! Validation reads existing rows through [`RowLookup`], which both the
//! storage engine and its transactional view implement.

mod validator;

pub use validator::Validator;

use crate::error::ConstraintError;
use crate::value::Value;
use std::fmt;

/// Read access needed to validate a record against existing rows.
pub trait RowLookup {
    /// Error type of the backing store.
    type Error: From<ConstraintError>;

    /// Whether a row with this identity exists.
    fn row_exists(&self, entity: &str, id: i64) -> Result<bool, Self::Error>;

    /// Owner of a unique constraint value, if taken.
    fn unique_owner(
        &self,
        entity: &str,
        constraint: &str,
        values: &[&Value],
    ) -> Result<Option<i64>, Self::Error>;

    /// Identities of rows referencing `parent_id` through `relation`.
    fn children(&self, relation: &str, parent_id: i64) -> Result<Vec<i64>, Self::Error>;
}

/// The kind of write being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// A new row.
    Insert,
    /// Replacement of the row with this identity.
    Update {
        /// Identity of the row being replaced.
        id: i64,
    },
}

impl WriteMode {
    /// Identity of the row being replaced, for updates.
    pub fn existing_id(&self) -> Option<i64> {
        match self {
            WriteMode::Insert => None,
            WriteMode::Update { id } => Some(*id),
        }
    }
}

/// A condition worth reporting that does not block the write.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum ValidationWarning {
    /// Two relations from the same entity to the same target carry the same value.
    RoleCollision {
        /// Entity holding both keys.
        entity: String,
        /// Referenced entity.
        target: String,
        /// The colliding relations.
        relations: [String; 2],
        /// Shared key value.
        value: i64,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::RoleCollision {
                entity,
                target,
                relations,
                value,
            } => write!(
                f,
                "{entity}: relations '{}' and '{}' both reference {target} {value}",
                relations[0], relations[1]
            ),
        }
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// The record as it would be stored: every declared attribute present,
    /// integers widened where the attribute is a float.
    pub row: crate::value::Row,
    /// Non-fatal findings.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// Whether the record validated without warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
