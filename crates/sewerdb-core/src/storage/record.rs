//! Record type for stored values.

use crate::codec;
use crate::error::Error;
use crate::value::Row;
use rkyv::{Archive, Deserialize, Serialize};

/// A stored row with metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Encoded row data (see [`crate::codec`]).
    pub data: Vec<u8>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            created_at: super::key::current_timestamp(),
        }
    }

    /// Create a record with a specific timestamp.
    pub fn with_timestamp(data: Vec<u8>, created_at: u64) -> Self {
        Self { data, created_at }
    }

    /// Encode a row into a new record.
    pub fn from_row(row: &Row) -> Result<Self, Error> {
        Ok(Self::new(codec::encode_row(row)?))
    }

    /// Decode the row held by this record.
    pub fn row(&self) -> Result<Row, Error> {
        codec::decode_row(&self.data)
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Header stored for every materialized table.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct TableHeader {
    /// When the table was first materialized (microseconds since Unix epoch).
    pub created_at: u64,
    /// Fingerprint of the entity definition the table was created from.
    pub fingerprint: String,
}

impl TableHeader {
    /// Create a header for a table materialized now.
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            created_at: super::key::current_timestamp(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Serialize the header to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a header from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_record_roundtrip() {
        let row = Row::new().with("Manhole_ID", 4i64).with("X_coordinate", Value::Null);
        let record = Record::from_row(&row).unwrap();
        let bytes = record.to_bytes().unwrap();
        let decoded = Record::from_bytes(&bytes).unwrap();

        assert_eq!(record, decoded);
        assert_eq!(decoded.row().unwrap(), row);
    }

    #[test]
    fn test_table_header_roundtrip() {
        let header = TableHeader::new("abc123");
        let decoded = TableHeader::from_bytes(&header.to_bytes().unwrap()).unwrap();
        assert_eq!(header, decoded);
    }
}
