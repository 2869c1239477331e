//! Schema diffing for bootstrap.
//!
//! Compares the stored schema with a proposed one and decides whether the
//! proposed schema can be materialized over existing data. Only purely
//! additive changes are accepted: new entities, plus relations and
//! constraints whose holder is one of those new entities.

use super::{EntityDef, FieldDef, SchemaBundle};
use crate::error::BootstrapConflict;
use std::collections::HashMap;

/// Result of a successful bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum BootstrapOutcome {
    /// The store was empty and every entity was materialized.
    Created {
        /// Catalog version written.
        version: u64,
        /// Number of tables created.
        tables: usize,
    },
    /// The store already holds an identical schema; nothing was written.
    Unchanged {
        /// Current catalog version.
        version: u64,
    },
    /// New entities were added next to the existing ones.
    Extended {
        /// Catalog version written.
        version: u64,
        /// Entities materialized by this bootstrap.
        added_entities: Vec<String>,
    },
}

impl BootstrapOutcome {
    /// Catalog version after the bootstrap.
    pub fn version(&self) -> u64 {
        match self {
            BootstrapOutcome::Created { version, .. }
            | BootstrapOutcome::Unchanged { version }
            | BootstrapOutcome::Extended { version, .. } => *version,
        }
    }
}

/// Differences between a stored and a proposed schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    /// Entities present only in the proposed schema.
    pub added_entities: Vec<String>,
    /// Relations present only in the proposed schema.
    pub added_relations: Vec<String>,
    /// Constraints present only in the proposed schema.
    pub added_constraints: Vec<String>,
    /// Changes that cannot be applied over existing data.
    pub conflicts: Vec<BootstrapConflict>,
}

impl SchemaDiff {
    /// Compute the diff between the stored schema and a proposed one.
    pub fn compute(stored: &SchemaBundle, proposed: &SchemaBundle) -> Self {
        let mut diff = SchemaDiff::default();
        diff.diff_entities(stored, proposed);
        diff.diff_relations(stored, proposed);
        diff.diff_constraints(stored, proposed);
        diff
    }

    /// Check if there are no changes at all.
    pub fn is_empty(&self) -> bool {
        self.added_entities.is_empty()
            && self.added_relations.is_empty()
            && self.added_constraints.is_empty()
            && self.conflicts.is_empty()
    }

    /// Whether every change is additive.
    pub fn is_additive(&self) -> bool {
        self.conflicts.is_empty()
    }

    fn diff_entities(&mut self, stored: &SchemaBundle, proposed: &SchemaBundle) {
        for (name, old) in &stored.entities {
            match proposed.entities.get(name) {
                None => self.conflicts.push(BootstrapConflict::EntityRemoved {
                    entity: name.clone(),
                }),
                Some(new) if new != old => {
                    self.conflicts.push(BootstrapConflict::EntityChanged {
                        entity: name.clone(),
                        detail: describe_entity_change(old, new),
                    });
                }
                Some(_) => {}
            }
        }

        for name in proposed.entities.keys() {
            if !stored.entities.contains_key(name) {
                self.added_entities.push(name.clone());
            }
        }
    }

    fn diff_relations(&mut self, stored: &SchemaBundle, proposed: &SchemaBundle) {
        for (name, old) in &stored.relations {
            if proposed.relations.get(name) != Some(old) {
                self.conflicts.push(BootstrapConflict::RelationChanged {
                    relation: name.clone(),
                });
            }
        }

        for (name, rel) in &proposed.relations {
            if stored.relations.contains_key(name) {
                continue;
            }
            let holder = rel.edge_entity.as_deref().unwrap_or(&rel.from_entity);
            if stored.entities.contains_key(holder) {
                self.conflicts.push(BootstrapConflict::ConstrainsExisting {
                    name: name.clone(),
                    entity: holder.to_string(),
                });
            } else {
                self.added_relations.push(name.clone());
            }
        }
    }

    fn diff_constraints(&mut self, stored: &SchemaBundle, proposed: &SchemaBundle) {
        for old in &stored.constraints {
            if proposed.get_constraint(old.name()) != Some(old) {
                self.conflicts.push(BootstrapConflict::ConstraintChanged {
                    constraint: old.name().to_string(),
                });
            }
        }

        for new in &proposed.constraints {
            if stored.get_constraint(new.name()).is_some() {
                continue;
            }
            if stored.entities.contains_key(new.entity()) {
                self.conflicts.push(BootstrapConflict::ConstrainsExisting {
                    name: new.name().to_string(),
                    entity: new.entity().to_string(),
                });
            } else {
                self.added_constraints.push(new.name().to_string());
            }
        }
    }
}

/// Human-readable summary of how an entity definition changed.
fn describe_entity_change(old: &EntityDef, new: &EntityDef) -> String {
    let mut changes = Vec::new();

    if old.identity_field != new.identity_field {
        changes.push(format!(
            "identity '{}' -> '{}'",
            old.identity_field, new.identity_field
        ));
    }
    if old.composite_key != new.composite_key {
        changes.push("composite identity changed".to_string());
    }

    let old_fields: HashMap<&str, &FieldDef> =
        old.fields.iter().map(|f| (f.name.as_str(), f)).collect();
    let new_fields: HashMap<&str, &FieldDef> =
        new.fields.iter().map(|f| (f.name.as_str(), f)).collect();

    for field in &old.fields {
        match new_fields.get(field.name.as_str()) {
            None => changes.push(format!("field '{}' removed", field.name)),
            Some(nf) if nf.field_type != field.field_type => changes.push(format!(
                "field '{}' type {} -> {}",
                field.name, field.field_type, nf.field_type
            )),
            Some(nf) if *nf != field => {
                changes.push(format!("field '{}' attributes changed", field.name))
            }
            Some(_) => {}
        }
    }
    for field in &new.fields {
        if !old_fields.contains_key(field.name.as_str()) {
            changes.push(format!("field '{}' added", field.name));
        }
    }

    if changes.is_empty() {
        changes.push("field order changed".to_string());
    }
    changes.join(", ")
}
