//! Key encoding for the storage trees.
//!
//! Row key format: `[entity name][0x00][id (8 bytes, big-endian, sign bit flipped)]`
//!
//! Flipping the sign bit makes lexicographic order match numeric order for
//! negative ids too, so a prefix scan yields rows sorted by identity.

use crate::codec;
use crate::error::Error;
use crate::value::Value;

/// Size of an encoded identity in bytes.
pub const ID_SIZE: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// Encode an identity so that byte order matches numeric order.
pub fn encode_id(id: i64) -> [u8; ID_SIZE] {
    ((id as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Decode an identity produced by [`encode_id`].
pub fn decode_id(bytes: &[u8]) -> Result<i64, Error> {
    let buf: [u8; ID_SIZE] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
    Ok((u64::from_be_bytes(buf) ^ SIGN_BIT) as i64)
}

/// Prefix shared by every row of an entity.
pub fn row_prefix(entity: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(entity.len() + 1 + ID_SIZE);
    key.extend_from_slice(entity.as_bytes());
    key.push(0);
    key
}

/// Key of a single row.
pub fn row_key(entity: &str, id: i64) -> Vec<u8> {
    let mut key = row_prefix(entity);
    key.extend_from_slice(&encode_id(id));
    key
}

/// Extract the identity from a row key with a known prefix length.
pub fn row_id(key: &[u8], prefix_len: usize) -> Result<i64, Error> {
    key.get(prefix_len..)
        .ok_or(Error::InvalidKey)
        .and_then(decode_id)
}

/// Key of a parent's child list in the foreign-key index.
///
/// Format: `[relation name][0x00][parent id]`
pub fn fk_key(relation: &str, parent_id: i64) -> Vec<u8> {
    row_key(relation, parent_id)
}

/// Key of a unique constraint entry.
///
/// Format: `entity\0constraint\0` followed by each value in the tagged,
/// length-prefixed row codec encoding.
pub fn unique_key(entity: &str, constraint: &str, values: &[&Value]) -> Result<Vec<u8>, Error> {
    let mut key = Vec::new();
    key.extend_from_slice(entity.as_bytes());
    key.push(0);
    key.extend_from_slice(constraint.as_bytes());
    key.push(0);
    for value in values {
        codec::encode_value(&mut key, value)?;
    }
    Ok(key)
}

/// Encode a list of child identities.
pub fn encode_ids(ids: &[i64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ids.len() * ID_SIZE);
    for id in ids {
        buf.extend_from_slice(&id.to_be_bytes());
    }
    buf
}

/// Decode a list of child identities.
pub fn decode_ids(bytes: &[u8]) -> Result<Vec<i64>, Error> {
    if bytes.len() % ID_SIZE != 0 {
        return Err(Error::InvalidData(format!(
            "id list of {} bytes is not a multiple of {ID_SIZE}",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(ID_SIZE)
        .map(|chunk| {
            let buf: [u8; ID_SIZE] = chunk.try_into().map_err(|_| Error::InvalidKey)?;
            Ok(i64::from_be_bytes(buf))
        })
        .collect()
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
