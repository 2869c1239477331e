//! Value codec for encoding/decoding rows to/from bytes.
//!
//! Rows are stored as a flat tagged list of named values so that a single
//! attribute can be read without decoding the whole record.

use crate::error::Error;
use crate::value::{Row, Value};
use chrono::NaiveDate;

/// Type tag for encoded values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Null = 0,
    Bool = 1,
    Int64 = 3,
    Float64 = 5,
    String = 6,
    Date = 10,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueTag::Null),
            1 => Ok(ValueTag::Bool),
            3 => Ok(ValueTag::Int64),
            5 => Ok(ValueTag::Float64),
            6 => Ok(ValueTag::String),
            10 => Ok(ValueTag::Date),
            _ => Err(Error::InvalidData(format!("Unknown value tag: {}", value))),
        }
    }
}

/// Encode a row to bytes.
///
/// Format:
/// - Field count (4 bytes, little-endian)
/// - For each field:
///   - Field name length (2 bytes, little-endian)
///   - Field name (UTF-8 bytes)
///   - Value tag (1 byte)
///   - Value data (variable length, depends on type)
pub fn encode_row(row: &Row) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();

    buf.extend_from_slice(&(row.len() as u32).to_le_bytes());

    for (name, value) in row.iter() {
        let name_bytes = name.as_bytes();
        if name_bytes.len() > u16::MAX as usize {
            return Err(Error::InvalidData("Field name too long".into()));
        }
        buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(name_bytes);

        encode_value(&mut buf, value)?;
    }

    Ok(buf)
}

/// Decode bytes back to a row.
pub fn decode_row(data: &[u8]) -> Result<Row, Error> {
    let mut reader = Reader::new(data);
    let count = reader.u32("field count")? as usize;

    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let name = reader.name()?.to_string();
        let value = reader.value()?;
        fields.push((name, value));
    }

    Ok(fields.into_iter().collect())
}

/// Encode a single value to the buffer.
pub(crate) fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => {
            buf.push(ValueTag::Null as u8);
        }
        Value::Bool(b) => {
            buf.push(ValueTag::Bool as u8);
            buf.push(u8::from(*b));
        }
        Value::Int64(n) => {
            buf.push(ValueTag::Int64 as u8);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Float64(f) => {
            buf.push(ValueTag::Float64 as u8);
            buf.extend_from_slice(&f.to_le_bytes());
        }
        Value::String(s) => {
            buf.push(ValueTag::String as u8);
            let bytes = s.as_bytes();
            if bytes.len() > u32::MAX as usize {
                return Err(Error::InvalidData("String too long".into()));
            }
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        Value::Date(d) => {
            buf.push(ValueTag::Date as u8);
            buf.extend_from_slice(&chrono::Datelike::num_days_from_ce(d).to_le_bytes());
        }
    }
    Ok(())
}

/// Bounds-checked cursor over encoded bytes.
struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], Error> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidData(format!("Data too short for {what}")))?;
        let slice = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], Error> {
        let slice = self.take(N, what)?;
        slice
            .try_into()
            .map_err(|_| Error::InvalidData(format!("Data too short for {what}")))
    }

    fn u32(&mut self, what: &str) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    fn name(&mut self) -> Result<&'a str, Error> {
        let len = u16::from_le_bytes(self.array("field name length")?) as usize;
        let bytes = self.take(len, "field name")?;
        std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidData("Invalid UTF-8 in field name".into()))
    }

    fn tag(&mut self) -> Result<ValueTag, Error> {
        let [tag] = self.array::<1>("value tag")?;
        ValueTag::try_from(tag)
    }

    fn value(&mut self) -> Result<Value, Error> {
        let value = match self.tag()? {
            ValueTag::Null => Value::Null,
            ValueTag::Bool => {
                let [b] = self.array::<1>("bool")?;
                Value::Bool(b != 0)
            }
            ValueTag::Int64 => Value::Int64(i64::from_le_bytes(self.array("int64")?)),
            ValueTag::Float64 => Value::Float64(f64::from_le_bytes(self.array("float64")?)),
            ValueTag::String => {
                let len = self.u32("string length")? as usize;
                let bytes = self.take(len, "string")?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| Error::InvalidData("Invalid UTF-8 in string".into()))?;
                Value::String(s.to_string())
            }
            ValueTag::Date => {
                let days = i32::from_le_bytes(self.array("date")?);
                let date = NaiveDate::from_num_days_from_ce_opt(days)
                    .ok_or_else(|| Error::InvalidData(format!("Date out of range: {days}")))?;
                Value::Date(date)
            }
        };
        Ok(value)
    }
}
