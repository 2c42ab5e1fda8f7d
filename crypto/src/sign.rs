//! Ed25519 signing and verification.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use weave_types::{PrivateKey, PublicKey, Signature};

/// Sign a message with a private key.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Malformed public keys verify as `false` rather than erroring.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::keypair_from_seed;

    #[test]
    fn sign_and_verify() {
        let kp = keypair_from_seed(&[1u8; 32]);
        let sig = sign_message(b"header signing hash", &kp.private);
        assert!(verify_signature(b"header signing hash", &sig, &kp.public));
    }

    #[test]
    fn wrong_message_or_key_fails() {
        let kp1 = keypair_from_seed(&[1u8; 32]);
        let kp2 = keypair_from_seed(&[2u8; 32]);
        let sig = sign_message(b"m", &kp1.private);
        assert!(!verify_signature(b"n", &sig, &kp1.public));
        assert!(!verify_signature(b"m", &sig, &kp2.public));
    }

    #[test]
    fn zero_signature_never_verifies() {
        let kp = keypair_from_seed(&[5u8; 32]);
        assert!(!verify_signature(b"m", &Signature::ZERO, &kp.public));
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = keypair_from_seed(&[99u8; 32]);
        assert_eq!(sign_message(b"x", &kp.private), sign_message(b"x", &kp.private));
    }
}
