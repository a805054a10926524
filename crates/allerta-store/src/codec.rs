//! Record codec: the flat byte form stored under each record key.
//!
//! Records are stored as compact JSON. Field order follows the struct and
//! metrics are a `BTreeMap`, so encoding the same record always yields the
//! same bytes.

use crate::error::Result;
use crate::types::AlertRecord;

/// Encodes a record for storage.
#[must_use]
pub fn encode(record: &AlertRecord) -> Vec<u8> {
    // Strings, integers and a string-keyed map never fail to serialize.
    serde_json::to_vec(record).unwrap_or_default()
}

/// Decodes stored bytes, reporting why they were rejected.
///
/// # Errors
///
/// Returns [`StoreError::Decode`](crate::StoreError::Decode) for malformed or truncated input.
pub fn try_decode(bytes: &[u8]) -> Result<AlertRecord> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decodes stored bytes, returning `None` for anything malformed.
#[must_use]
pub fn decode(bytes: &[u8]) -> Option<AlertRecord> {
    try_decode(bytes).ok()
}
