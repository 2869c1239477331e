//! Constraint definitions for entities.
//!
//! Foreign keys are not listed here; they are implied by relations.

use rkyv::{Archive, Deserialize, Serialize};

/// A constraint definition.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub enum ConstraintDef {
    /// Uniqueness constraint (single or composite).
    Unique {
        /// Constraint name.
        name: String,
        /// Entity this constraint applies to.
        entity: String,
        /// Fields that must be unique together.
        fields: Vec<String>,
    },
    /// Inclusive numeric bounds on one field.
    Range {
        /// Constraint name.
        name: String,
        /// Entity this constraint applies to.
        entity: String,
        /// Constrained field.
        field: String,
        /// Lowest allowed value.
        min: f64,
        /// Highest allowed value.
        max: f64,
    },
}

impl ConstraintDef {
    /// Create a unique constraint on a single field.
    pub fn unique(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            entity: entity.into(),
            fields: vec![field.into()],
        }
    }

    /// Create a composite unique constraint.
    pub fn unique_composite(
        name: impl Into<String>,
        entity: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            entity: entity.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a range constraint.
    pub fn range(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
        min: f64,
        max: f64,
    ) -> Self {
        ConstraintDef::Range {
            name: name.into(),
            entity: entity.into(),
            field: field.into(),
            min,
            max,
        }
    }

    /// Get the constraint name.
    pub fn name(&self) -> &str {
        match self {
            ConstraintDef::Unique { name, .. } => name,
            ConstraintDef::Range { name, .. } => name,
        }
    }

    /// Get the entity this constraint applies to.
    pub fn entity(&self) -> &str {
        match self {
            ConstraintDef::Unique { entity, .. } => entity,
            ConstraintDef::Range { entity, .. } => entity,
        }
    }

    /// Fields covered by this constraint.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ConstraintDef::Unique { fields, .. } => fields.iter().map(String::as_str).collect(),
            ConstraintDef::Range { field, .. } => vec![field.as_str()],
        }
    }

    /// Check if this is a unique constraint.
    pub fn is_unique(&self) -> bool {
        matches!(self, ConstraintDef::Unique { .. })
    }

    /// Whether this is a unique constraint on exactly `field`.
    pub fn is_unique_on(&self, field: &str) -> bool {
        matches!(self, ConstraintDef::Unique { fields, .. } if fields.len() == 1 && fields[0] == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_constraint() {
        let constraint = ConstraintDef::unique("station_code_unique", "Station", "code");

        assert!(constraint.is_unique());
        assert!(constraint.is_unique_on("code"));
        assert_eq!(constraint.name(), "station_code_unique");
        assert_eq!(constraint.entity(), "Station");
    }

    #[test]
    fn test_composite_unique() {
        let constraint =
            ConstraintDef::unique_composite("pair_unique", "Edge", ["left_id", "right_id"]);

        assert_eq!(constraint.fields(), vec!["left_id", "right_id"]);
        assert!(!constraint.is_unique_on("left_id"));
    }

    #[test]
    fn test_range_constraint() {
        let constraint = ConstraintDef::range(
            "defect_circumferential_start_clock",
            "Defect",
            "Circumferential_start",
            0.0,
            12.0,
        );

        assert!(!constraint.is_unique());
        assert_eq!(constraint.fields(), vec!["Circumferential_start"]);
        if let ConstraintDef::Range { min, max, .. } = constraint {
            assert_eq!((min, max), (0.0, 12.0));
        }
    }
}
