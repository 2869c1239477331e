//! Relation definitions between entities.
//!
//! A relation is stored once, on the entity that holds the foreign key.
//! Lookups in the other direction go through the derived foreign-key index
//! under the relation's inverse name.

use rkyv::{Archive, Deserialize, Serialize};

/// Stored cardinality of a relation, seen from the foreign-key holder.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum Cardinality {
    /// At most one holder row per target row.
    OneToOne,
    /// Any number of holder rows per target row.
    ManyToOne,
    /// Pairs of rows linked through a join entity.
    ManyToMany,
}

/// Relationship kind as declared by the caller.
///
/// One-to-many is the mirror image of many-to-one: the foreign key lives on
/// the target of the declaration rather than its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Foreign key on the source, unique per target.
    OneToOne,
    /// Foreign key on the target.
    OneToMany,
    /// Foreign key on the source.
    ManyToOne,
    /// Link through a join entity carrying both foreign keys.
    ManyToMany {
        /// Join entity name.
        join: String,
    },
}

/// Behavior when a referenced entity is deleted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum DeleteBehavior {
    /// Delete related entities.
    Cascade,
    /// Prevent deletion if related entities exist.
    Restrict,
    /// Set foreign key to null.
    SetNull,
}

/// A relation definition between two entities.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct RelationDef {
    /// Relation name (unique within schema).
    pub name: String,
    /// Entity holding the foreign key (the first participant for many-to-many).
    pub from_entity: String,
    /// Foreign key field. For many-to-many, the join field referencing `from_entity`.
    pub from_field: String,
    /// Referenced entity.
    pub to_entity: String,
    /// Referenced field. For many-to-many, the join field referencing `to_entity`.
    pub to_field: String,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Delete behavior.
    pub on_delete: DeleteBehavior,
    /// Edge entity for many-to-many relations.
    pub edge_entity: Option<String>,
    /// Name of the derived lookup from the referenced side.
    pub inverse: Option<String>,
}

impl RelationDef {
    /// Create a many-to-one relation.
    pub fn many_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            to_field: to_field.into(),
            cardinality: Cardinality::ManyToOne,
            on_delete: DeleteBehavior::Restrict,
            edge_entity: None,
            inverse: None,
        }
    }

    /// Create a one-to-one relation.
    pub fn one_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            cardinality: Cardinality::OneToOne,
            ..Self::many_to_one(name, from_entity, from_field, to_entity, to_field)
        }
    }

    /// Create a many-to-many relation.
    pub fn many_to_many(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
        edge_entity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            to_field: to_field.into(),
            cardinality: Cardinality::ManyToMany,
            on_delete: DeleteBehavior::Cascade,
            edge_entity: Some(edge_entity.into()),
            inverse: None,
        }
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }

    /// Set the inverse lookup name.
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    /// Check if this is a many-to-many relation.
    pub fn is_many_to_many(&self) -> bool {
        self.cardinality == Cardinality::ManyToMany
    }

    /// Check if this relation is backed by a foreign key on `from_entity`.
    pub fn is_foreign_key(&self) -> bool {
        !self.is_many_to_many()
    }

    /// Whether `name` refers to this relation, by its own name or its inverse.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.inverse.as_deref() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_to_one_relation() {
        let rel = RelationDef::one_to_one(
            "hydraulic_properties_pipe",
            "HydraulicProperties",
            "Pipe_ID",
            "Pipe",
            "Pipe_ID",
        );

        assert_eq!(rel.cardinality, Cardinality::OneToOne);
        assert_eq!(rel.from_entity, "HydraulicProperties");
        assert_eq!(rel.to_entity, "Pipe");
        assert!(rel.edge_entity.is_none());
        assert!(rel.is_foreign_key());
    }

    #[test]
    fn test_many_to_one_relation() {
        let rel = RelationDef::many_to_one(
            "defect_inspection",
            "Defect",
            "Inspection_ID",
            "Inspection",
            "Inspection_ID",
        )
        .with_on_delete(DeleteBehavior::Cascade)
        .with_inverse("defects");

        assert_eq!(rel.cardinality, Cardinality::ManyToOne);
        assert_eq!(rel.on_delete, DeleteBehavior::Cascade);
        assert!(rel.answers_to("defects"));
        assert!(rel.answers_to("defect_inspection"));
        assert!(!rel.answers_to("inspection"));
    }

    #[test]
    fn test_many_to_many_relation() {
        let rel = RelationDef::many_to_many(
            "pipe_seismic_activity",
            "Pipe",
            "Pipe_ID",
            "SeismicActivity",
            "Seismic_activity_ID",
            "PipeSeismicImpact",
        );

        assert!(rel.is_many_to_many());
        assert!(!rel.is_foreign_key());
        assert_eq!(rel.edge_entity.as_deref(), Some("PipeSeismicImpact"));
    }
}
