//! Blake2b-256 hashing.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use weave_types::Hash;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash several byte slices as if they were concatenated.
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash a canonical encoding into a content [`Hash`].
pub fn content_hash(encoded: &[u8]) -> Hash {
    Hash::new(blake2b_256(encoded))
}
