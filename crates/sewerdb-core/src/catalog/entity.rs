//! Entity definitions.

use super::field::FieldDef;
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};

/// An entity definition (table schema).
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct EntityDef {
    /// Entity name (unique within schema).
    pub name: String,
    /// Name of the primary identity field.
    pub identity_field: String,
    /// Field definitions, in declaration order.
    pub fields: Vec<FieldDef>,
    /// Composite identity for join entities. Identifies the pair, does not
    /// make it unique.
    pub composite_key: Option<Vec<String>>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>, identity_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_field: identity_field.into(),
            fields: Vec::new(),
            composite_key: None,
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Declare the composite identity of a join entity.
    pub fn with_composite_key(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.composite_key = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a mutable field by name.
    pub fn get_field_mut(&mut self, name: &str) -> Option<&mut FieldDef> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Get the identity field definition.
    pub fn get_identity_field(&self) -> Option<&FieldDef> {
        self.get_field(&self.identity_field)
    }

    /// Whether the identity is assigned by the storage layer.
    pub fn has_auto_identity(&self) -> bool {
        self.get_identity_field()
            .map(|f| f.auto_assigned)
            .unwrap_or(false)
    }

    /// Iterate over field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Content fingerprint of this definition.
    ///
    /// Stored with each materialized table so that a later bootstrap can
    /// detect a table whose shape no longer matches the catalog.
    pub fn fingerprint(&self) -> Result<String, Error> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }
}
