//! Command implementations.
//!
//! Each command renders its output to a string; `main` decides where it goes.

use comfy_table::{Cell, Table};
use sewerdb::model::sewer_schema;
use sewerdb::{BootstrapOutcome, ConstraintError, Database, Error, ValidationWarning};
use sewerdb_core::{Validator, WriteMode};
use tracing::{debug, info};

use crate::error::CliError;
use crate::formatter::{self, OutputFormat};

/// Materialize the sewer schema.
pub fn bootstrap(db: &Database) -> Result<String, CliError> {
    let outcome = db.bootstrap(sewer_schema()?)?;
    Ok(match outcome {
        BootstrapOutcome::Created { version, tables } => {
            format!("created {tables} tables (catalog version {version})")
        }
        BootstrapOutcome::Unchanged { version } => {
            format!("schema already in place (catalog version {version})")
        }
        BootstrapOutcome::Extended {
            version,
            added_entities,
        } => format!(
            "added {} (catalog version {version})",
            added_entities.join(", ")
        ),
    })
}

/// Print the stored catalog.
pub fn describe(db: &Database, format: OutputFormat) -> Result<String, CliError> {
    let schema = db.schema()?;
    formatter::format_schema(&schema, format)
}

/// List materialized tables.
pub fn tables(db: &Database) -> Result<String, CliError> {
    let mut listing = Vec::new();
    for (name, header) in db.storage().tables()? {
        let rows = db.count(&name)?;
        listing.push((name, header, rows));
    }
    Ok(formatter::format_tables(&listing))
}

/// Print every row of an entity as one JSON object per line.
pub fn dump(db: &Database, entity: &str) -> Result<String, CliError> {
    let schema = db.schema()?;
    if schema.get_entity(entity).is_none() {
        return Err(Error::from(ConstraintError::UnknownEntity {
            entity: entity.to_string(),
        })
        .into());
    }

    let mut lines = Vec::new();
    for (_, row) in db.scan_rows(entity)? {
        lines.push(serde_json::to_string(&row)?);
    }
    Ok(lines.join("\n"))
}

/// Findings of a full re-validation.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Rows examined.
    pub checked: usize,
    /// Rows that no longer validate.
    pub violations: Vec<(String, i64, ConstraintError)>,
    /// Rows accepted with warnings.
    pub warnings: Vec<(String, i64, ValidationWarning)>,
}

impl CheckReport {
    /// Render the report.
    pub fn render(&self) -> String {
        let mut out = format!(
            "checked {} row(s): {} violation(s), {} warning(s)",
            self.checked,
            self.violations.len(),
            self.warnings.len()
        );

        if self.violations.is_empty() && self.warnings.is_empty() {
            return out;
        }

        let mut table = Table::new();
        table.set_header(vec!["Entity", "Id", "Severity", "Finding"]);
        for (entity, id, error) in &self.violations {
            table.add_row(vec![
                Cell::new(entity),
                Cell::new(id),
                Cell::new("error"),
                Cell::new(error),
            ]);
        }
        for (entity, id, warning) in &self.warnings {
            table.add_row(vec![
                Cell::new(entity),
                Cell::new(id),
                Cell::new("warning"),
                Cell::new(warning),
            ]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
        out
    }
}

/// Re-validate every stored row against the current catalog.
pub fn check(db: &Database) -> Result<CheckReport, CliError> {
    let schema = db.schema()?;
    let validator = Validator::new(&schema);
    let mut report = CheckReport::default();

    for entity in schema.entity_names() {
        for result in db.storage().scan(entity) {
            let (id, row) = result?;
            report.checked += 1;

            match validator.validate(db.storage(), entity, &row, WriteMode::Update { id }) {
                Ok(validated) => report.warnings.extend(
                    validated
                        .warnings
                        .into_iter()
                        .map(|w| (entity.to_string(), id, w)),
                ),
                Err(Error::ConstraintViolation(e)) => {
                    debug!(entity, id, error = %e, "stored row fails validation");
                    report.violations.push((entity.to_string(), id, e));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!(
        checked = report.checked,
        violations = report.violations.len(),
        "check complete"
    );
    Ok(report)
}
