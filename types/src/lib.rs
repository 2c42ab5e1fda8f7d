//! Fundamental types for the weave DAG ledger.
//!
//! This crate defines the primitives shared across every other crate in the
//! workspace: content hashes, account addresses, asset identifiers,
//! timestamps and key material.

pub mod address;
pub mod asset;
pub mod error;
pub mod hash;
pub mod keys;
pub mod time;

pub use address::Address;
pub use asset::AssetId;
pub use error::TypesError;
pub use hash::Hash;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use time::Timestamp;
