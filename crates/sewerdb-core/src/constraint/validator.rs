//! Constraint validation logic.
//!
//! The Validator checks a candidate record against the catalog and, through
//! a [`RowLookup`], against the rows already stored. It never writes.

use super::{RowLookup, ValidationReport, ValidationWarning, WriteMode};
use crate::catalog::{Cardinality, ConstraintDef, EntityDef, ScalarType, SchemaBundle};
use crate::error::ConstraintError;
use crate::value::{Row, Value};
use tracing::warn;

/// Record validator bound to one schema.
pub struct Validator<'a> {
    schema: &'a SchemaBundle,
}

impl<'a> Validator<'a> {
    /// Create a new validator.
    pub fn new(schema: &'a SchemaBundle) -> Self {
        Self { schema }
    }

    /// Check a record in isolation: attribute names, presence, types,
    /// lengths and range constraints.
    ///
    /// Returns the record with every declared attribute present.
    pub fn normalize(&self, entity: &str, row: &Row) -> Result<Row, ConstraintError> {
        let def = self.entity(entity)?;
        self.normalize_with(def, row)
    }

    /// Validate a record for the given write.
    ///
    /// Runs [`Self::normalize`], then checks identity, foreign keys,
    /// one-to-one occupancy and unique constraints against `lookup`.
    pub fn validate<L: RowLookup>(
        &self,
        lookup: &L,
        entity: &str,
        row: &Row,
        mode: WriteMode,
    ) -> Result<ValidationReport, L::Error> {
        let def = self.entity(entity)?;
        let row = self.normalize_with(def, row)?;

        self.check_identity(lookup, def, &row, mode)?;
        self.check_foreign_keys(lookup, def, &row, mode)?;
        self.check_unique(lookup, def, &row, mode)?;

        let warnings = self.collect_warnings(def, &row);
        for warning in &warnings {
            warn!(entity = %def.name, %warning, "record accepted with warning");
        }

        Ok(ValidationReport { row, warnings })
    }

    fn entity(&self, entity: &str) -> Result<&'a EntityDef, ConstraintError> {
        self.schema
            .get_entity(entity)
            .ok_or_else(|| ConstraintError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    fn normalize_with(&self, def: &EntityDef, row: &Row) -> Result<Row, ConstraintError> {
        if let Some((name, _)) = row.iter().find(|(name, _)| def.get_field(name).is_none()) {
            return Err(ConstraintError::UnknownField {
                entity: def.name.clone(),
                field: name.to_string(),
            });
        }

        let mut out = Row::new();
        for field in &def.fields {
            let value = match row.value(&field.name) {
                Value::Null => {
                    // An omitted auto-assigned identity is filled in on insert.
                    if field.required && !field.auto_assigned {
                        return Err(ConstraintError::MissingRequired {
                            entity: def.name.clone(),
                            field: field.name.clone(),
                        });
                    }
                    Value::Null
                }
                Value::Int64(n) if field.field_type == ScalarType::Float64 => {
                    Value::Float64(*n as f64)
                }
                value if value.scalar_type() == Some(field.field_type) => value.clone(),
                value => {
                    return Err(ConstraintError::TypeMismatch {
                        entity: def.name.clone(),
                        field: field.name.clone(),
                        expected: field.field_type.to_string(),
                        found: value.type_name().to_string(),
                    });
                }
            };

            if let (Some(max), Value::String(s)) = (field.max_length, &value) {
                let len = s.chars().count();
                if len > max as usize {
                    return Err(ConstraintError::TooLong {
                        entity: def.name.clone(),
                        field: field.name.clone(),
                        max,
                        len,
                    });
                }
            }

            out.set(field.name.clone(), value);
        }

        for constraint in self.schema.constraints_for(&def.name) {
            if let ConstraintDef::Range {
                name,
                field,
                min,
                max,
                ..
            } = constraint
            {
                let Some(value) = out.value(field).as_number() else {
                    continue;
                };
                if value.is_nan() || value < *min || value > *max {
                    return Err(ConstraintError::OutOfRange {
                        constraint: name.clone(),
                        entity: def.name.clone(),
                        field: field.clone(),
                        value,
                        min: *min,
                        max: *max,
                    });
                }
            }
        }

        Ok(out)
    }

    fn check_identity<L: RowLookup>(
        &self,
        lookup: &L,
        def: &EntityDef,
        row: &Row,
        mode: WriteMode,
    ) -> Result<(), L::Error> {
        let identity = row.value(&def.identity_field).as_i64();

        match mode {
            WriteMode::Update { id } => {
                if identity != Some(id) {
                    return Err(ConstraintError::ImmutableKey {
                        entity: def.name.clone(),
                        field: def.identity_field.clone(),
                    }
                    .into());
                }
            }
            WriteMode::Insert => {
                let Some(id) = identity else {
                    return Ok(());
                };
                if !lookup.row_exists(&def.name, id)? {
                    return Ok(());
                }
                // A shared-key one-to-one reports the occupied relation.
                let shared = self.schema.foreign_keys_from(&def.name).into_iter().find(|r| {
                    r.cardinality == Cardinality::OneToOne && r.from_field == def.identity_field
                });
                let err = match shared {
                    Some(rel) => ConstraintError::OneToOneOccupied {
                        relation: rel.name.clone(),
                        entity: def.name.clone(),
                        field: rel.from_field.clone(),
                        referenced_entity: rel.to_entity.clone(),
                        value: id,
                    },
                    None => ConstraintError::DuplicateKey {
                        entity: def.name.clone(),
                        field: def.identity_field.clone(),
                        value: id,
                    },
                };
                return Err(err.into());
            }
        }

        Ok(())
    }

    fn check_foreign_keys<L: RowLookup>(
        &self,
        lookup: &L,
        def: &EntityDef,
        row: &Row,
        mode: WriteMode,
    ) -> Result<(), L::Error> {
        for rel in self.schema.foreign_keys_from(&def.name) {
            let Some(parent) = row.value(&rel.from_field).as_i64() else {
                continue;
            };

            if !lookup.row_exists(&rel.to_entity, parent)? {
                return Err(ConstraintError::ForeignKeyViolation {
                    relation: rel.name.clone(),
                    entity: def.name.clone(),
                    field: rel.from_field.clone(),
                    referenced_entity: rel.to_entity.clone(),
                    value: parent,
                }
                .into());
            }

            if rel.cardinality == Cardinality::OneToOne && rel.from_field != def.identity_field {
                let holders = lookup.children(&rel.name, parent)?;
                if holders.iter().any(|h| Some(*h) != mode.existing_id()) {
                    return Err(ConstraintError::OneToOneOccupied {
                        relation: rel.name.clone(),
                        entity: def.name.clone(),
                        field: rel.from_field.clone(),
                        referenced_entity: rel.to_entity.clone(),
                        value: parent,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    fn check_unique<L: RowLookup>(
        &self,
        lookup: &L,
        def: &EntityDef,
        row: &Row,
        mode: WriteMode,
    ) -> Result<(), L::Error> {
        for constraint in self.schema.constraints_for(&def.name) {
            let ConstraintDef::Unique { name, fields, .. } = constraint else {
                continue;
            };
            let values: Vec<&Value> = fields.iter().map(|f| row.value(f)).collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }

            if let Some(owner) = lookup.unique_owner(&def.name, name, &values)? {
                if Some(owner) != mode.existing_id() {
                    return Err(ConstraintError::UniqueViolation {
                        constraint: name.clone(),
                        entity: def.name.clone(),
                        fields: fields.clone(),
                        value: values
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    fn collect_warnings(&self, def: &EntityDef, row: &Row) -> Vec<ValidationWarning> {
        let fks = self.schema.foreign_keys_from(&def.name);
        let mut warnings = Vec::new();

        for (i, a) in fks.iter().enumerate() {
            for b in &fks[i + 1..] {
                if a.to_entity != b.to_entity {
                    continue;
                }
                let (Some(va), Some(vb)) = (
                    row.value(&a.from_field).as_i64(),
                    row.value(&b.from_field).as_i64(),
                ) else {
                    continue;
                };
                if va == vb {
                    warnings.push(ValidationWarning::RoleCollision {
                        entity: def.name.clone(),
                        target: a.to_entity.clone(),
                        relations: [a.name.clone(), b.name.clone()],
                        value: va,
                    });
                }
            }
        }

        warnings
    }
}
