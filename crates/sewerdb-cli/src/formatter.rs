//! Output formatting for catalog and table listings.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use sewerdb_core::{ConstraintDef, DeleteBehavior, FieldDef, RelationDef, SchemaBundle, TableHeader};

use crate::error::CliError;

/// Output format for the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render the catalog in the requested format.
pub fn format_schema(schema: &SchemaBundle, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(schema)?),
        OutputFormat::Table => Ok(schema_as_tables(schema)),
    }
}

fn schema_as_tables(schema: &SchemaBundle) -> String {
    let mut sections = vec![format!("Catalog version {}", schema.version)];

    for entity in schema.entities.values() {
        let mut table = Table::new();
        table.set_header(vec!["Field", "Type", "Required", "Notes"]);
        for field in &entity.fields {
            let is_identity = field.name == entity.identity_field;
            table.add_row(vec![
                Cell::new(&field.name),
                Cell::new(field.field_type),
                Cell::new(if field.required { "yes" } else { "no" }),
                Cell::new(field_notes(field, is_identity)),
            ]);
        }
        sections.push(format!("{}\n{table}", entity.name));
    }

    let mut table = Table::new();
    table.set_header(vec!["Relation", "From", "To", "Cardinality", "On delete", "Lookup"]);
    for relation in schema.relations.values() {
        table.add_row(relation_row(relation));
    }
    sections.push(format!("Relations\n{table}"));

    if !schema.constraints.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Constraint", "Entity", "Rule"]);
        for constraint in &schema.constraints {
            table.add_row(vec![
                Cell::new(constraint.name()),
                Cell::new(constraint.entity()),
                Cell::new(constraint_rule(constraint)),
            ]);
        }
        sections.push(format!("Constraints\n{table}"));
    }

    sections.join("\n\n")
}

fn field_notes(field: &FieldDef, is_identity: bool) -> String {
    let mut notes = Vec::new();
    if is_identity {
        notes.push("identity".to_string());
    }
    if field.auto_assigned {
        notes.push("auto".to_string());
    }
    if let Some(max) = field.max_length {
        notes.push(format!("max {max}"));
    }
    notes.join(", ")
}

fn relation_row(relation: &RelationDef) -> Vec<Cell> {
    let from = match &relation.edge_entity {
        Some(join) => format!("{} (via {join})", relation.from_entity),
        None => format!("{}.{}", relation.from_entity, relation.from_field),
    };
    let on_delete = match relation.on_delete {
        DeleteBehavior::Cascade => "cascade",
        DeleteBehavior::Restrict => "restrict",
        DeleteBehavior::SetNull => "set null",
    };
    vec![
        Cell::new(&relation.name),
        Cell::new(from),
        Cell::new(&relation.to_entity),
        Cell::new(format!("{:?}", relation.cardinality)),
        Cell::new(on_delete),
        Cell::new(relation.inverse.as_deref().unwrap_or("-")),
    ]
}

fn constraint_rule(constraint: &ConstraintDef) -> String {
    match constraint {
        ConstraintDef::Range {
            field, min, max, ..
        } => format!("{field} in {min}..={max}"),
        ConstraintDef::Unique { fields, .. } => format!("unique({})", fields.join(", ")),
    }
}

/// Render materialized tables as a table.
pub fn format_tables(tables: &[(String, TableHeader, usize)]) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Table", "Rows", "Fingerprint"]);
    for (name, header, rows) in tables {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(rows),
            Cell::new(&header.fingerprint[..16.min(header.fingerprint.len())]),
        ]);
    }
    table.to_string()
}
