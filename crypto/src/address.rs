//! Address derivation from public keys.
//!
//! Format: `P1` + base32(public key, 52 chars) + base32(checksum, 8 chars),
//! where the checksum is the first 5 bytes of blake2b-256(public key).
//! The alphabet `13456789abcdefghijkmnopqrstuwxyz` leaves out visually
//! ambiguous characters.

use weave_types::{Address, PublicKey};

const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// ASCII byte -> 5-bit value, 0xFF for characters outside the alphabet.
const DECODE_TABLE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

const KEY_CHARS: usize = 52;
const CHECKSUM_LEN: usize = 5;
const BODY_LEN: usize = KEY_CHARS + 8;

fn to_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut acc: u64 = 0;
    let mut bits = 0;
    for &byte in bytes {
        acc = (acc << 8) | u64::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 0x1F) as usize] as char);
    }
    out
}

fn from_base32<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut acc: u64 = 0;
    let mut bits = 0;
    let mut out = [0u8; N];
    let mut filled = 0;
    for c in s.bytes() {
        let value = *DECODE_TABLE.get(c as usize)?;
        if value == 0xFF {
            return None;
        }
        acc = (acc << 5) | u64::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if filled < N {
                out[filled] = (acc >> bits) as u8;
                filled += 1;
            }
        }
    }
    (filled == N).then_some(out)
}

fn checksum(key: &[u8; 32]) -> [u8; CHECKSUM_LEN] {
    let digest = crate::blake2b_256(key);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Derive the `P1` address that identifies the holder of `public_key`.
pub fn derive_address(public_key: &PublicKey) -> Address {
    Address::new(format!(
        "{}{}{}",
        Address::PREFIX,
        to_base32(public_key.as_bytes()),
        to_base32(&checksum(public_key.as_bytes()))
    ))
}

/// Recover the public key encoded in a derived address.
///
/// Returns `None` for a wrong prefix, wrong length, foreign characters or a
/// checksum mismatch.
pub fn decode_address(address: &str) -> Option<PublicKey> {
    let body = address.strip_prefix(Address::PREFIX)?;
    if body.len() != BODY_LEN {
        return None;
    }
    let (key_part, checksum_part) = body.split_at(KEY_CHARS);
    let key: [u8; 32] = from_base32(key_part)?;
    let sum: [u8; CHECKSUM_LEN] = from_base32(checksum_part)?;
    (sum == checksum(&key)).then_some(PublicKey(key))
}

/// Whether `address` is a derived address with a correct checksum.
pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;

    #[test]
    fn derive_and_validate() {
        let kp = keypair_from_seed(&[11u8; 32]);
        let addr = derive_address(&kp.public);
        assert!(addr.as_str().starts_with("P1"));
        assert_eq!(addr.as_str().len(), 2 + BODY_LEN);
        assert!(validate_address(addr.as_str()));
    }

    #[test]
    fn decode_roundtrip() {
        let kp = keypair_from_seed(&[12u8; 32]);
        let addr = derive_address(&kp.public);
        assert_eq!(decode_address(addr.as_str()), Some(kp.public));
    }

    #[test]
    fn checksum_mismatch_rejected() {
        let kp = keypair_from_seed(&[13u8; 32]);
        let mut bad = derive_address(&kp.public).as_str().to_string();
        let last = bad.pop().unwrap();
        bad.push(if last == '1' { '3' } else { '1' });
        assert!(!validate_address(&bad));
    }

    #[test]
    fn malformed_addresses_rejected() {
        assert!(!validate_address("P1abc..."));
        assert!(!validate_address("P1"));
        assert!(!validate_address(&format!("X1{}", "1".repeat(BODY_LEN))));
        assert!(!validate_address(&format!("P1{}", "0".repeat(BODY_LEN))));
    }

    #[test]
    fn base32_roundtrip() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x42];
        let decoded: [u8; 5] = from_base32(&to_base32(&data)).unwrap();
        assert_eq!(decoded, data);
    }
}
