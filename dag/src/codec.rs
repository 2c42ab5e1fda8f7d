//! Canonical encoding.
//!
//! Every identity in the ledger is blake2b-256 over the bincode encoding
//! (fixed-width integers, little endian) of a value. Maps inside hashed
//! values are `BTreeMap`, so the encoding of equal values is byte-identical.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use weave_types::Hash;

use crate::error::DagError;

/// Upper bound on a decoded value; larger inputs are rejected before
/// allocation.
pub const MAX_ENCODED_LEN: u64 = 16 * 1024 * 1024;

/// Canonical bytes of a value.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    bincode::serialize(value).expect("ledger values are always bincode-serializable")
}

/// Decode canonical bytes, rejecting trailing data and oversized input.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DagError> {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ENCODED_LEN)
        .deserialize(bytes)
        .map_err(|e| DagError::Decode(e.to_string()))
}

/// Content hash of a value's canonical encoding.
pub fn hash_of<T: Serialize + ?Sized>(value: &T) -> Hash {
    weave_crypto::content_hash(&encode(value))
}
