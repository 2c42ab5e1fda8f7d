//! Asset identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16-byte asset identifier.
///
/// Every unit belongs to exactly one asset's main chain; the native asset
/// [`AssetId::PTN`] is the one the genesis unit opens.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId([u8; 16]);

impl AssetId {
    /// The native system asset.
    pub const PTN: Self = Self(*b"PTN\0\0\0\0\0\0\0\0\0\0\0\0\0");

    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build an asset id from an ASCII symbol of at most 16 bytes,
    /// zero-padded on the right.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let raw = symbol.as_bytes();
        if raw.is_empty() || raw.len() > 16 || !symbol.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 16];
        bytes[..raw.len()].copy_from_slice(raw);
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// The symbol with trailing zero padding removed.
    pub fn symbol(&self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(16);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", self.symbol())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ptn_symbol() {
        assert_eq!(AssetId::PTN.symbol(), "PTN");
        assert_eq!(AssetId::from_symbol("PTN"), Some(AssetId::PTN));
    }

    #[test]
    fn from_symbol_rejects_bad_input() {
        assert_eq!(AssetId::from_symbol(""), None);
        assert_eq!(AssetId::from_symbol("ABCDEFGHIJKLMNOPQ"), None);
        assert!(AssetId::from_symbol("ABCDEFGHIJKLMNOP").is_some());
    }

    #[test]
    fn distinct_symbols_distinct_ids() {
        assert_ne!(
            AssetId::from_symbol("GOLD").unwrap(),
            AssetId::from_symbol("SILVER").unwrap()
        );
    }
}
