//! Core type definitions for the catalog.

use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;

/// Semantic attribute types supported by SewerDB.
///
/// Every attribute carries exactly one of these; nullability is tracked
/// separately on the field definition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Calendar date without time zone.
    Date,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int64 | ScalarType::Float64)
    }

    /// Lower-case name used in messages and catalog dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int64 => "int",
            ScalarType::Float64 => "float",
            ScalarType::String => "text",
            ScalarType::Date => "date",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_checks() {
        assert!(ScalarType::Int64.is_numeric());
        assert!(ScalarType::Float64.is_numeric());
        assert!(!ScalarType::String.is_numeric());
        assert!(!ScalarType::Bool.is_numeric());
        assert!(!ScalarType::Date.is_numeric());
    }

    #[test]
    fn test_display() {
        assert_eq!(ScalarType::Float64.to_string(), "float");
        assert_eq!(ScalarType::String.to_string(), "text");
    }
}
