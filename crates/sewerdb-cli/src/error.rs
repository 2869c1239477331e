//! CLI error type.

use thiserror::Error;

/// Errors reported by the command-line tool.
#[derive(Debug, Error)]
pub enum CliError {
    /// Database error.
    #[error(transparent)]
    Database(#[from] sewerdb::Error),

    /// Schema definition error in the built-in sewer schema.
    #[error(transparent)]
    Schema(#[from] sewerdb::SchemaError),

    /// JSON output failed.
    #[error("json output failed: {0}")]
    Json(#[from] serde_json::Error),

    /// `check` found rows that no longer validate.
    #[error("{0} stored row(s) failed validation")]
    CheckFailed(usize),
}
