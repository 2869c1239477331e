//! Core error types.

use sled::transaction::ConflictableTransactionError;
use thiserror::Error;

/// Core database errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// The schema being defined is internally inconsistent.
    #[error("schema definition error: {0}")]
    Schema(#[from] SchemaError),

    /// A record violates the integrity contract of the catalog.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] ConstraintError),

    /// Materializing the schema would alter an incompatible existing structure.
    #[error("bootstrap conflict: {0}")]
    BootstrapConflict(#[from] BootstrapConflict),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name.
        entity: String,
        /// Identity value that was looked up.
        id: i64,
    },

    /// The store has not been bootstrapped with a schema yet.
    #[error("no schema has been bootstrapped")]
    NoSchema,

    /// Cascading delete went deeper than allowed.
    #[error("cascade depth {depth} exceeded")]
    CascadeDepthExceeded {
        /// Depth reached when the cascade was aborted.
        depth: usize,
    },

    /// No relation or inverse lookup has this name.
    #[error("unknown relation or lookup '{lookup}'")]
    UnknownLookup {
        /// Name that was looked up.
        lookup: String,
    },

    /// An inverse lookup name is shared by several relations.
    #[error("lookup '{lookup}' is ambiguous, it matches {}", candidates.join(", "))]
    AmbiguousLookup {
        /// Name that was looked up.
        lookup: String,
        /// Relations answering to the name.
        candidates: Vec<String>,
    },

    /// The identity sequence of an entity has no values left.
    #[error("identity sequence exhausted for {entity}")]
    SequenceExhausted {
        /// Entity whose sequence ran out.
        entity: String,
    },

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Errors raised while constructing a schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// An entity with this name was already defined.
    #[error("entity '{entity}' is already defined")]
    DuplicateEntity { entity: String },

    /// An entity declares the same attribute twice.
    #[error("entity '{entity}' declares field '{field}' more than once")]
    DuplicateField { entity: String, field: String },

    /// An entity has no attributes at all.
    #[error("entity '{entity}' declares no fields")]
    EmptyEntity { entity: String },

    /// The declared identity field is not among the entity's attributes.
    #[error("identity field '{field}' of entity '{entity}' is not declared")]
    MissingIdentity { entity: String, field: String },

    /// The identity field is nullable.
    #[error("identity field '{field}' of entity '{entity}' cannot be nullable")]
    NullableIdentity { entity: String, field: String },

    /// The identity field is not an integer.
    #[error("identity field '{field}' of entity '{entity}' must be an integer")]
    NonIntegerIdentity { entity: String, field: String },

    /// Only identity fields may be auto-assigned.
    #[error("field '{field}' of entity '{entity}' is auto-assigned but is not the identity")]
    AutoAssignedNonIdentity { entity: String, field: String },

    /// A relation or constraint names an entity that was never defined.
    #[error("'{context}' references unknown entity '{entity}'")]
    UnknownEntity { context: String, entity: String },

    /// A relation or constraint names a field the entity does not have.
    #[error("'{context}' references unknown field '{entity}.{field}'")]
    UnknownField {
        context: String,
        entity: String,
        field: String,
    },

    /// A relation with this name was already registered.
    #[error("relation '{relation}' is already defined")]
    DuplicateRelation { relation: String },

    /// Foreign keys must be integers referencing an integer identity.
    #[error("relation '{relation}': foreign key '{entity}.{field}' must be an integer")]
    NonIntegerForeignKey {
        relation: String,
        entity: String,
        field: String,
    },

    /// The declared cardinality contradicts the key structure.
    #[error("relation '{relation}': {reason}")]
    CardinalityMismatch { relation: String, reason: String },

    /// A many-to-many relation lacks a proper join entity.
    #[error("relation '{relation}': join entity '{join}' {reason}")]
    InvalidJoinEntity {
        relation: String,
        join: String,
        reason: String,
    },

    /// Set-null delete behavior on a field that cannot hold null.
    #[error("relation '{relation}': set-null on delete requires nullable field '{field}'")]
    SetNullOnRequired { relation: String, field: String },

    /// A constraint cannot be applied to the field it names.
    #[error("constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },
}

/// Integrity violations detected while validating a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    /// The entity is not part of the current schema.
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    /// The record carries an attribute the entity does not declare.
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// A required attribute is missing or null.
    #[error("required field '{entity}.{field}' is missing")]
    MissingRequired { entity: String, field: String },

    /// A value does not match the declared attribute type.
    #[error("field '{entity}.{field}' expects {expected}, got {found}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        found: String,
    },

    /// A text value exceeds the declared maximum length.
    #[error("field '{entity}.{field}' allows at most {max} characters, got {len}")]
    TooLong {
        entity: String,
        field: String,
        max: u32,
        len: usize,
    },

    /// A numeric value falls outside a range constraint.
    #[error("constraint '{constraint}': '{entity}.{field}' = {value} is outside {min}..={max}")]
    OutOfRange {
        constraint: String,
        entity: String,
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The identity value is already taken.
    #[error("{entity} with {field} = {value} already exists")]
    DuplicateKey {
        entity: String,
        field: String,
        value: i64,
    },

    /// An update tried to change an identity value.
    #[error("identity field '{entity}.{field}' is immutable")]
    ImmutableKey { entity: String, field: String },

    /// A foreign key references a row that does not exist.
    #[error("relation '{relation}': '{entity}.{field}' = {value} has no matching {referenced_entity}")]
    ForeignKeyViolation {
        relation: String,
        entity: String,
        field: String,
        referenced_entity: String,
        value: i64,
    },

    /// A one-to-one relation target is already linked.
    #[error("relation '{relation}': {referenced_entity} {value} already has a linked {entity}")]
    OneToOneOccupied {
        relation: String,
        entity: String,
        field: String,
        referenced_entity: String,
        value: i64,
    },

    /// A unique constraint would be broken.
    #[error("constraint '{constraint}': {entity}({}) = ({value}) already exists", fields.join(", "))]
    UniqueViolation {
        constraint: String,
        entity: String,
        fields: Vec<String>,
        value: String,
    },

    /// A delete is blocked by rows that still reference the target.
    #[error("relation '{relation}': {count} {referencing_entity} row(s) still reference {entity} {id}")]
    RestrictViolation {
        relation: String,
        entity: String,
        id: i64,
        referencing_entity: String,
        count: usize,
    },
}

impl ConstraintError {
    /// The attribute the violation is about, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConstraintError::UnknownEntity { .. } | ConstraintError::RestrictViolation { .. } => {
                None
            }
            ConstraintError::UniqueViolation { fields, .. } => fields.first().map(String::as_str),
            ConstraintError::UnknownField { field, .. }
            | ConstraintError::MissingRequired { field, .. }
            | ConstraintError::TypeMismatch { field, .. }
            | ConstraintError::TooLong { field, .. }
            | ConstraintError::OutOfRange { field, .. }
            | ConstraintError::DuplicateKey { field, .. }
            | ConstraintError::ImmutableKey { field, .. }
            | ConstraintError::ForeignKeyViolation { field, .. }
            | ConstraintError::OneToOneOccupied { field, .. } => Some(field),
        }
    }

    /// The relation the violation is about, when there is one.
    pub fn relation(&self) -> Option<&str> {
        match self {
            ConstraintError::ForeignKeyViolation { relation, .. }
            | ConstraintError::OneToOneOccupied { relation, .. }
            | ConstraintError::RestrictViolation { relation, .. } => Some(relation),
            _ => None,
        }
    }
}

/// Reasons a bootstrap refuses to touch an existing store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BootstrapConflict {
    /// An existing entity would change shape.
    #[error("entity '{entity}' differs from the stored definition: {detail}")]
    EntityChanged { entity: String, detail: String },

    /// An existing entity is absent from the new schema.
    #[error("entity '{entity}' exists in the store but not in the schema")]
    EntityRemoved { entity: String },

    /// An existing relation would change or disappear.
    #[error("relation '{relation}' differs from the stored definition")]
    RelationChanged { relation: String },

    /// A new relation or constraint would apply to rows that were never checked against it.
    #[error("'{name}' would constrain existing entity '{entity}'")]
    ConstrainsExisting { name: String, entity: String },

    /// An existing constraint would change or disappear.
    #[error("constraint '{constraint}' differs from the stored definition")]
    ConstraintChanged { constraint: String },

    /// The materialized table does not match its definition.
    #[error("table '{entity}' fingerprint {stored} does not match {expected}")]
    FingerprintMismatch {
        entity: String,
        stored: String,
        expected: String,
    },
}

impl From<ConstraintError> for ConflictableTransactionError<Error> {
    fn from(err: ConstraintError) -> Self {
        ConflictableTransactionError::Abort(Error::ConstraintViolation(err))
    }
}
