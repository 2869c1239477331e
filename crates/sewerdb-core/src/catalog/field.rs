//! Field definitions for entities.

use super::types::ScalarType;
use rkyv::{Archive, Deserialize, Serialize};

/// A field definition within an entity.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: ScalarType,
    /// Whether the field must hold a non-null value.
    pub required: bool,
    /// Maximum length in characters for text fields.
    pub max_length: Option<u32>,
    /// Whether the storage layer assigns the value when it is omitted.
    pub auto_assigned: bool,
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, field_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            max_length: None,
            auto_assigned: false,
        }
    }

    /// Create an optional field (required = false).
    pub fn optional(name: impl Into<String>, field_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            max_length: None,
            auto_assigned: false,
        }
    }

    /// Create a required integer identity assigned by the storage layer.
    pub fn surrogate_key(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Int64).auto_assigned()
    }

    /// Limit the length of a text value.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Mark the value as assigned by the storage layer when omitted.
    pub fn auto_assigned(mut self) -> Self {
        self.auto_assigned = true;
        self
    }

    /// Check if this field accepts null.
    pub fn is_nullable(&self) -> bool {
        !self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::optional("Material", ScalarType::String).with_max_length(20);

        assert_eq!(field.name, "Material");
        assert!(field.is_nullable());
        assert_eq!(field.max_length, Some(20));
        assert!(!field.auto_assigned);
    }

    #[test]
    fn test_surrogate_key() {
        let field = FieldDef::surrogate_key("Pipe_ID");

        assert!(field.required);
        assert!(field.auto_assigned);
        assert_eq!(field.field_type, ScalarType::Int64);
    }
}
