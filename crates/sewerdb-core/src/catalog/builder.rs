//! Schema builder.
//!
//! Every call checks the new definition against what has been registered so
//! far and fails with a [`SchemaError`] on the first inconsistency. Entities
//! must be defined before they are related or constrained, and a one-to-one
//! relation over a non-identity key needs its unique constraint first.

use super::{
    Cardinality, ConstraintDef, DeleteBehavior, EntityDef, RelationDef, RelationKind, ScalarType,
    SchemaBundle,
};
use crate::error::SchemaError;
use std::collections::{BTreeMap, HashSet};

/// A relationship declaration, as passed to [`SchemaBuilder::relate`].
#[derive(Debug, Clone)]
pub struct RelationDecl {
    name: String,
    source: String,
    target: String,
    kind: RelationKind,
    fk_field: String,
    on_delete: DeleteBehavior,
    inverse: Option<String>,
}

impl RelationDecl {
    /// Declare a relation between `source` and `target` over `fk_field`.
    ///
    /// For one-to-one and many-to-one the key lives on `source`, for
    /// one-to-many it lives on `target`.
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        kind: RelationKind,
        fk_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            kind,
            fk_field: fk_field.into(),
            on_delete: DeleteBehavior::Restrict,
            inverse: None,
        }
    }

    /// Declare a many-to-many relation through `join`.
    ///
    /// The join entity must already relate many-to-one to both sides.
    pub fn many_to_many(
        name: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        join: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            kind: RelationKind::ManyToMany { join: join.into() },
            fk_field: String::new(),
            on_delete: DeleteBehavior::Cascade,
            inverse: None,
        }
    }

    /// Set delete behavior.
    pub fn on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }

    /// Name the derived lookup from the referenced side.
    pub fn inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }
}

/// Incrementally assembles a consistent [`SchemaBundle`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: BTreeMap<String, EntityDef>,
    relations: BTreeMap<String, RelationDef>,
    constraints: Vec<ConstraintDef>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity.
    pub fn define(&mut self, entity: EntityDef) -> Result<&mut Self, SchemaError> {
        let name = entity.name.clone();
        if self.entities.contains_key(&name) {
            return Err(SchemaError::DuplicateEntity { entity: name });
        }
        if entity.fields.is_empty() {
            return Err(SchemaError::EmptyEntity { entity: name });
        }

        let mut seen = HashSet::new();
        for field in &entity.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity: name,
                    field: field.name.clone(),
                });
            }
            if field.auto_assigned && field.name != entity.identity_field {
                return Err(SchemaError::AutoAssignedNonIdentity {
                    entity: name,
                    field: field.name.clone(),
                });
            }
        }

        let identity = entity
            .get_identity_field()
            .ok_or_else(|| SchemaError::MissingIdentity {
                entity: name.clone(),
                field: entity.identity_field.clone(),
            })?;
        if !identity.required {
            return Err(SchemaError::NullableIdentity {
                entity: name,
                field: identity.name.clone(),
            });
        }
        if identity.field_type != ScalarType::Int64 {
            return Err(SchemaError::NonIntegerIdentity {
                entity: name,
                field: identity.name.clone(),
            });
        }

        if let Some(key) = &entity.composite_key {
            for field in key {
                if entity.get_field(field).is_none() {
                    return Err(SchemaError::UnknownField {
                        context: name.clone(),
                        entity: name,
                        field: field.clone(),
                    });
                }
            }
        }

        self.entities.insert(name, entity);
        Ok(self)
    }

    /// Register a relationship.
    pub fn relate(&mut self, decl: RelationDecl) -> Result<&mut Self, SchemaError> {
        if self.relations.contains_key(&decl.name) {
            return Err(SchemaError::DuplicateRelation {
                relation: decl.name,
            });
        }
        self.entity(&decl.name, &decl.source)?;
        self.entity(&decl.name, &decl.target)?;

        let relation = match &decl.kind {
            RelationKind::ManyToMany { join } => self.many_to_many(&decl, join)?,
            RelationKind::OneToOne => self.foreign_key(&decl, Cardinality::OneToOne, false)?,
            RelationKind::ManyToOne => self.foreign_key(&decl, Cardinality::ManyToOne, false)?,
            RelationKind::OneToMany => self.foreign_key(&decl, Cardinality::ManyToOne, true)?,
        };

        self.relations.insert(relation.name.clone(), relation);
        Ok(self)
    }

    /// Register a unique or range constraint.
    pub fn constrain(&mut self, constraint: ConstraintDef) -> Result<&mut Self, SchemaError> {
        let name = constraint.name().to_string();
        if self.constraints.iter().any(|c| c.name() == name) {
            return Err(SchemaError::InvalidConstraint {
                constraint: name,
                reason: "a constraint with this name already exists".into(),
            });
        }
        let entity = self.entity(&name, constraint.entity())?;

        let fields = constraint.fields();
        if fields.is_empty() {
            return Err(SchemaError::InvalidConstraint {
                constraint: name,
                reason: "no fields given".into(),
            });
        }
        for field in &fields {
            if entity.get_field(field).is_none() {
                return Err(SchemaError::UnknownField {
                    context: name,
                    entity: entity.name.clone(),
                    field: field.to_string(),
                });
            }
        }

        if let ConstraintDef::Range {
            field, min, max, ..
        } = &constraint
        {
            let ty = entity.get_field(field).map(|f| f.field_type);
            if !ty.map(|t| t.is_numeric()).unwrap_or(false) {
                return Err(SchemaError::InvalidConstraint {
                    constraint: name,
                    reason: format!("range requires a numeric field, '{field}' is not"),
                });
            }
            if !(min <= max) {
                return Err(SchemaError::InvalidConstraint {
                    constraint: name,
                    reason: format!("empty range {min}..={max}"),
                });
            }
        }

        self.constraints.push(constraint);
        Ok(self)
    }

    /// Look up an entity registered so far.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Finish the schema.
    pub fn build(&self) -> SchemaBundle {
        SchemaBundle {
            entities: self.entities.clone(),
            relations: self.relations.clone(),
            constraints: self.constraints.clone(),
            ..SchemaBundle::new(0)
        }
    }

    fn entity(&self, context: &str, name: &str) -> Result<&EntityDef, SchemaError> {
        self.entities
            .get(name)
            .ok_or_else(|| SchemaError::UnknownEntity {
                context: context.to_string(),
                entity: name.to_string(),
            })
    }

    fn foreign_key(
        &self,
        decl: &RelationDecl,
        cardinality: Cardinality,
        mirrored: bool,
    ) -> Result<RelationDef, SchemaError> {
        let (holder_name, target_name) = if mirrored {
            (&decl.target, &decl.source)
        } else {
            (&decl.source, &decl.target)
        };
        let holder = self.entity(&decl.name, holder_name)?;
        let target = self.entity(&decl.name, target_name)?;

        let fk = holder
            .get_field(&decl.fk_field)
            .ok_or_else(|| SchemaError::UnknownField {
                context: decl.name.clone(),
                entity: holder.name.clone(),
                field: decl.fk_field.clone(),
            })?;
        if fk.field_type != ScalarType::Int64 {
            return Err(SchemaError::NonIntegerForeignKey {
                relation: decl.name.clone(),
                entity: holder.name.clone(),
                field: fk.name.clone(),
            });
        }

        let is_shared_key = fk.name == holder.identity_field;
        match cardinality {
            Cardinality::OneToOne => {
                let is_unique = self
                    .constraints
                    .iter()
                    .any(|c| c.entity() == holder.name && c.is_unique_on(&fk.name));
                if !is_shared_key && !is_unique {
                    return Err(SchemaError::CardinalityMismatch {
                        relation: decl.name.clone(),
                        reason: format!(
                            "one-to-one key '{}.{}' is neither the identity nor unique",
                            holder.name, fk.name
                        ),
                    });
                }
            }
            _ if is_shared_key => {
                return Err(SchemaError::CardinalityMismatch {
                    relation: decl.name.clone(),
                    reason: format!(
                        "foreign key '{}.{}' is the identity, which allows only one row per {}",
                        holder.name, fk.name, target.name
                    ),
                });
            }
            _ => {}
        }

        if decl.on_delete == DeleteBehavior::SetNull && fk.required {
            return Err(SchemaError::SetNullOnRequired {
                relation: decl.name.clone(),
                field: fk.name.clone(),
            });
        }

        let mut relation = RelationDef::many_to_one(
            &decl.name,
            &holder.name,
            &fk.name,
            &target.name,
            &target.identity_field,
        )
        .with_on_delete(decl.on_delete);
        relation.cardinality = cardinality;
        relation.inverse = decl.inverse.clone();
        Ok(relation)
    }

    fn many_to_many(&self, decl: &RelationDecl, join: &str) -> Result<RelationDef, SchemaError> {
        let join_entity = self.entity(&decl.name, join)?;
        let invalid = |reason: String| SchemaError::InvalidJoinEntity {
            relation: decl.name.clone(),
            join: join.to_string(),
            reason,
        };

        let link_to = |target: &str| {
            self.relations
                .values()
                .find(|r| {
                    r.from_entity == join
                        && r.to_entity == target
                        && r.cardinality == Cardinality::ManyToOne
                })
                .map(|r| r.from_field.clone())
                .ok_or_else(|| invalid(format!("has no many-to-one relation to '{target}'")))
        };
        let source_fk = link_to(&decl.source)?;
        let target_fk = link_to(&decl.target)?;

        let key = join_entity
            .composite_key
            .as_ref()
            .ok_or_else(|| invalid("declares no composite identity".into()))?;
        let mut expected = vec![source_fk.as_str(), target_fk.as_str()];
        let mut actual: Vec<&str> = key.iter().map(String::as_str).collect();
        expected.sort_unstable();
        actual.sort_unstable();
        if expected != actual {
            return Err(invalid(format!(
                "composite identity must be ({source_fk}, {target_fk})"
            )));
        }

        let mut relation = RelationDef::many_to_many(
            &decl.name,
            &decl.source,
            source_fk,
            &decl.target,
            target_fk,
            join,
        );
        relation.inverse = decl.inverse.clone();
        Ok(relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldDef;

    fn builder() -> SchemaBuilder {
        let mut b = SchemaBuilder::new();
        b.define(
            EntityDef::new("Pipe", "Pipe_ID")
                .with_field(FieldDef::surrogate_key("Pipe_ID"))
                .with_field(FieldDef::optional("Manhole_up_ID", ScalarType::Int64))
                .with_field(FieldDef::optional("Material", ScalarType::String)),
        )
        .unwrap()
        .define(
            EntityDef::new("Manhole", "Manhole_ID")
                .with_field(FieldDef::surrogate_key("Manhole_ID")),
        )
        .unwrap()
        .define(
            EntityDef::new("HydraulicProperties", "Pipe_ID")
                .with_field(FieldDef::new("Pipe_ID", ScalarType::Int64))
                .with_field(FieldDef::optional("Pipe_capacity", ScalarType::Float64)),
        )
        .unwrap();
        b
    }

    #[test]
    fn test_nullable_identity_rejected() {
        let mut b = SchemaBuilder::new();
        let err = b
            .define(
                EntityDef::new("Thing", "id")
                    .with_field(FieldDef::optional("id", ScalarType::Int64)),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::NullableIdentity { .. }));
    }

    #[test]
    fn test_define_rejections() {
        let mut b = builder();
        assert!(matches!(
            b.define(EntityDef::new("Pipe", "Pipe_ID").with_field(FieldDef::surrogate_key("Pipe_ID"))),
            Err(SchemaError::DuplicateEntity { .. })
        ));
        assert!(matches!(
            b.define(EntityDef::new("A", "id").with_field(FieldDef::new("x", ScalarType::Int64))),
            Err(SchemaError::MissingIdentity { .. })
        ));
        assert!(matches!(
            b.define(EntityDef::new("B", "id").with_field(FieldDef::new("id", ScalarType::String))),
            Err(SchemaError::NonIntegerIdentity { .. })
        ));
        assert!(matches!(
            b.define(
                EntityDef::new("C", "id")
                    .with_field(FieldDef::surrogate_key("id"))
                    .with_field(FieldDef::optional("id", ScalarType::Int64))
            ),
            Err(SchemaError::DuplicateField { .. })
        ));
        assert!(matches!(
            b.define(
                EntityDef::new("D", "id")
                    .with_field(FieldDef::surrogate_key("id"))
                    .with_composite_key(["id", "ghost"])
            ),
            Err(SchemaError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_shared_key_one_to_one() {
        let mut b = builder();
        b.relate(
            RelationDecl::new(
                "hydraulic_properties_pipe",
                "HydraulicProperties",
                "Pipe",
                RelationKind::OneToOne,
                "Pipe_ID",
            )
            .on_delete(DeleteBehavior::Cascade),
        )
        .unwrap();

        let schema = b.build();
        let rel = schema.get_relation("hydraulic_properties_pipe").unwrap();
        assert_eq!(rel.cardinality, Cardinality::OneToOne);
        assert_eq!(rel.to_field, "Pipe_ID");
    }

    #[test]
    fn test_one_to_one_without_unique_key_rejected() {
        let mut b = builder();
        let err = b
            .relate(RelationDecl::new(
                "pipe_manhole",
                "Pipe",
                "Manhole",
                RelationKind::OneToOne,
                "Manhole_up_ID",
            ))
            .unwrap_err();
        assert!(matches!(err, SchemaError::CardinalityMismatch { .. }));

        b.constrain(ConstraintDef::unique("pipe_up_unique", "Pipe", "Manhole_up_ID"))
            .unwrap();
        b.relate(RelationDecl::new(
            "pipe_manhole",
            "Pipe",
            "Manhole",
            RelationKind::OneToOne,
            "Manhole_up_ID",
        ))
        .unwrap();
    }

    #[test]
    fn test_many_to_one_on_identity_rejected() {
        let mut b = builder();
        let err = b
            .relate(RelationDecl::new(
                "hp_pipe",
                "HydraulicProperties",
                "Pipe",
                RelationKind::ManyToOne,
                "Pipe_ID",
            ))
            .unwrap_err();
        assert!(matches!(err, SchemaError::CardinalityMismatch { .. }));
    }

    #[test]
    fn test_one_to_many_is_stored_on_holder() {
        let mut b = builder();
        b.relate(
            RelationDecl::new(
                "pipe_upstream_manhole",
                "Manhole",
                "Pipe",
                RelationKind::OneToMany,
                "Manhole_up_ID",
            )
            .on_delete(DeleteBehavior::SetNull)
            .inverse("pipes_upstream"),
        )
        .unwrap();

        let schema = b.build();
        let rel = schema.get_relation("pipe_upstream_manhole").unwrap();
        assert_eq!(rel.from_entity, "Pipe");
        assert_eq!(rel.to_entity, "Manhole");
        assert_eq!(rel.cardinality, Cardinality::ManyToOne);
        assert_eq!(rel.inverse.as_deref(), Some("pipes_upstream"));
    }

    #[test]
    fn test_relation_rejections() {
        let mut b = builder();
        assert!(matches!(
            b.relate(RelationDecl::new("r", "Pipe", "Ghost", RelationKind::ManyToOne, "x")),
            Err(SchemaError::UnknownEntity { .. })
        ));
        assert!(matches!(
            b.relate(RelationDecl::new("r", "Pipe", "Manhole", RelationKind::ManyToOne, "x")),
            Err(SchemaError::UnknownField { .. })
        ));
        assert!(matches!(
            b.relate(RelationDecl::new(
                "r",
                "Pipe",
                "Manhole",
                RelationKind::ManyToOne,
                "Material"
            )),
            Err(SchemaError::NonIntegerForeignKey { .. })
        ));
        assert!(matches!(
            b.relate(
                RelationDecl::new(
                    "r",
                    "HydraulicProperties",
                    "Pipe",
                    RelationKind::OneToOne,
                    "Pipe_ID"
                )
                .on_delete(DeleteBehavior::SetNull)
            ),
            Err(SchemaError::SetNullOnRequired { .. })
        ));
    }

    #[test]
    fn test_many_to_many_requires_join_links() {
        let mut b = builder();
        b.define(
            EntityDef::new("Link", "id")
                .with_field(FieldDef::surrogate_key("id"))
                .with_field(FieldDef::new("Pipe_ID", ScalarType::Int64))
                .with_field(FieldDef::new("Manhole_ID", ScalarType::Int64))
                .with_composite_key(["Pipe_ID", "Manhole_ID"]),
        )
        .unwrap();

        let err = b
            .relate(RelationDecl::many_to_many("pipe_manholes", "Pipe", "Manhole", "Link"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJoinEntity { .. }));

        b.relate(RelationDecl::new(
            "link_pipe",
            "Link",
            "Pipe",
            RelationKind::ManyToOne,
            "Pipe_ID",
        ))
        .unwrap()
        .relate(RelationDecl::new(
            "link_manhole",
            "Link",
            "Manhole",
            RelationKind::ManyToOne,
            "Manhole_ID",
        ))
        .unwrap()
        .relate(RelationDecl::many_to_many("pipe_manholes", "Pipe", "Manhole", "Link"))
        .unwrap();

        let schema = b.build();
        let rel = schema.get_relation("pipe_manholes").unwrap();
        assert!(rel.is_many_to_many());
        assert_eq!(rel.from_field, "Pipe_ID");
        assert_eq!(rel.to_field, "Manhole_ID");
    }

    #[test]
    fn test_range_requires_numeric_field() {
        let mut b = builder();
        assert!(matches!(
            b.constrain(ConstraintDef::range("m", "Pipe", "Material", 0.0, 1.0)),
            Err(SchemaError::InvalidConstraint { .. })
        ));
        assert!(matches!(
            b.constrain(ConstraintDef::range("c", "HydraulicProperties", "Pipe_capacity", 2.0, 1.0)),
            Err(SchemaError::InvalidConstraint { .. })
        ));
        b.constrain(ConstraintDef::range(
            "c",
            "HydraulicProperties",
            "Pipe_capacity",
            0.0,
            f64::MAX,
        ))
        .unwrap();
    }
}
