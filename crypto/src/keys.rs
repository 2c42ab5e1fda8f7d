//! Ed25519 key generation.

use ed25519_dalek::SigningKey;
use weave_types::{KeyPair, PrivateKey, PublicKey};

/// Generate a new key pair from the operating system's random source.
pub fn generate_keypair() -> KeyPair {
    let mut seed: [u8; 32] = rand::random();
    let kp = keypair_from_seed(&seed);
    seed.fill(0);
    kp
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing_key = SigningKey::from_bytes(&private.0);
    PublicKey(signing_key.verifying_key().to_bytes())
}

/// Reconstruct a full key pair from a private key.
pub fn keypair_from_private(private: PrivateKey) -> KeyPair {
    let public = public_from_private(&private);
    KeyPair { public, private }
}

/// Derive a key pair from a 32-byte seed. Mediators configure their
/// authoring key this way.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}
