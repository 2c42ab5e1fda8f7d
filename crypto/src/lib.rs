//! Cryptographic primitives for the weave DAG ledger.
//!
//! - **Blake2b-256** is the only hash function: unit, header, transaction and
//!   payload identities, plus the per-round mediator shuffle.
//! - **Ed25519** for mediator signatures over header signing hashes.
//! - Address derivation with the `P1` prefix and base32 encoding.

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{decode_address, derive_address, validate_address};
pub use hash::{blake2b_256, blake2b_256_multi, content_hash};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
