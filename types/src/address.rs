//! Account and mediator address type with the `P1` prefix.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ledger address, always prefixed with `P1`.
///
/// Addresses derived from a public key (see `weave_crypto::derive_address`)
/// additionally carry a checksum; this type only enforces the prefix so that
/// configuration documents can name accounts before keys exist.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// The standard prefix for all addresses.
    pub const PREFIX: &'static str = "P1";

    /// Wrap a string already known to be a valid address.
    ///
    /// # Panics
    /// Panics if the string does not start with `P1`.
    pub fn new(raw: impl Into<String>) -> Self {
        let s = raw.into();
        assert!(s.starts_with(Self::PREFIX), "address must start with P1");
        Self(s)
    }

    /// Parse an address, rejecting strings without the `P1` prefix or with
    /// nothing after it.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        let addr = Self(s);
        if addr.is_valid() {
            Ok(addr)
        } else {
            Err(TypesError::InvalidAddress(addr.0))
        }
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this address is well-formed.
    pub fn is_valid(&self) -> bool {
        self.0.starts_with(Self::PREFIX)
            && self.0.len() > Self::PREFIX.len()
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
