//! P-256 Elliptic Curve Diffie-Hellman key agreement.
//!
//! The shared AES-256 key is the 32-byte x-coordinate of the ECDH point,
//! which is what a browser's `deriveKey({name: "ECDH"}, ..., {name:
//! "AES-GCM", length: 256})` produces. Keeping that derivation means
//! packages sealed in a browser open here and vice versa.
//!
//! For any two key pairs A and B:
//!
//! ```text
//! derive_shared_key(A.private, B.public) == derive_shared_key(B.private, A.public)
//! ```
//!
//! The sender/recipient wrapping scheme relies on that symmetry: the sender
//! wraps with its private key and the recipient's public key, the recipient
//! unwraps with its private key and the sender's public key.

use crate::cipher::{SymmetricKey, KEY_LEN};
use crate::error::CryptoResult;
use crate::keys::{KeyPair, PrivateKey, PublicKey};

/// Generate a fresh P-256 key pair.
pub fn generate_keypair() -> KeyPair {
    KeyPair::generate()
}

/// Export a public key as DER SPKI bytes.
pub fn export_public(key: &PublicKey) -> CryptoResult<Vec<u8>> {
    key.to_der()
}

/// Export a private key as DER PKCS#8 bytes.
pub fn export_private(key: &PrivateKey) -> CryptoResult<zeroize::Zeroizing<Vec<u8>>> {
    key.to_der()
}

/// Import a public key from DER SPKI bytes.
pub fn import_public(der: &[u8]) -> CryptoResult<PublicKey> {
    PublicKey::from_der(der)
}

/// Import a private key from DER PKCS#8 bytes.
pub fn import_private(der: &[u8]) -> CryptoResult<PrivateKey> {
    PrivateKey::from_der(der)
}

/// Derive the AES-256 key shared between `our_private` and `their_public`.
///
/// Both arguments are P-256 by construction; key material for another curve
/// is rejected when it is imported (see [`derive_shared_key_der`]).
pub fn derive_shared_key(our_private: &PrivateKey, their_public: &PublicKey) -> SymmetricKey {
    let shared = p256::ecdh::diffie_hellman(
        our_private.as_p256().to_nonzero_scalar(),
        their_public.as_p256().as_affine(),
    );
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(shared.raw_secret_bytes().as_slice());
    SymmetricKey::from_bytes(key)
}

/// Same as [`derive_shared_key`], starting from exported encodings.
///
/// Fails with `CurveMismatch` when either key belongs to another curve and
/// with `InvalidKeyEncoding` when either cannot be decoded.
pub fn derive_shared_key_der(private_der: &[u8], public_der: &[u8]) -> CryptoResult<SymmetricKey> {
    let private = import_private(private_der)?;
    let public = import_public(public_der)?;
    Ok(derive_shared_key(&private, &public))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;

    #[test]
    fn test_shared_key_symmetric() {
        let alice = generate_keypair();
        let bob = generate_keypair();

        let k_ab = derive_shared_key(&alice.private, &bob.public);
        let k_ba = derive_shared_key(&bob.private, &alice.public);

        assert_eq!(k_ab.as_bytes(), k_ba.as_bytes());
    }

    #[test]
    fn test_shared_key_symmetric_many_pairs() {
        for _ in 0..20 {
            let a = generate_keypair();
            let b = generate_keypair();
            assert_eq!(
                derive_shared_key(&a.private, &b.public).as_bytes(),
                derive_shared_key(&b.private, &a.public).as_bytes()
            );
        }
    }

    #[test]
    fn test_different_peers_different_keys() {
        let alice = generate_keypair();
        let bob = generate_keypair();
        let carol = generate_keypair();

        let k_ab = derive_shared_key(&alice.private, &bob.public);
        let k_ac = derive_shared_key(&alice.private, &carol.public);

        assert_ne!(k_ab.as_bytes(), k_ac.as_bytes());
    }

    #[test]
    fn test_third_party_cannot_derive() {
        let alice = generate_keypair();
        let bob = generate_keypair();
        let eve = generate_keypair();

        let k_ab = derive_shared_key(&alice.private, &bob.public);
        let k_eve_a = derive_shared_key(&eve.private, &alice.public);
        let k_eve_b = derive_shared_key(&eve.private, &bob.public);

        assert_ne!(k_ab.as_bytes(), k_eve_a.as_bytes());
        assert_ne!(k_ab.as_bytes(), k_eve_b.as_bytes());
    }

    #[test]
    fn test_export_import_keeps_agreement() {
        let alice = generate_keypair();
        let bob = generate_keypair();

        let alice_priv = export_private(&alice.private).unwrap();
        let bob_pub = export_public(&bob.public).unwrap();

        let via_der = derive_shared_key_der(&alice_priv, &bob_pub).unwrap();
        let direct = derive_shared_key(&bob.private, &alice.public);
        assert_eq!(via_der.as_bytes(), direct.as_bytes());
    }

    #[test]
    fn test_der_rejects_foreign_algorithm() {
        let alice = generate_keypair();
        let alice_priv = export_private(&alice.private).unwrap();

        // X25519 SubjectPublicKeyInfo
        let mut x25519 = vec![
            0x30, 0x2A, 0x30, 0x05, 0x06, 0x03, 0x2B, 0x65, 0x6E, 0x03, 0x21, 0x00,
        ];
        x25519.extend_from_slice(&[1u8; 32]);

        assert!(matches!(
            derive_shared_key_der(&alice_priv, &x25519),
            Err(CryptoError::CurveMismatch(_))
        ));
    }

    #[test]
    fn test_der_rejects_garbage() {
        let bob = generate_keypair();
        let bob_pub = export_public(&bob.public).unwrap();
        assert!(matches!(
            derive_shared_key_der(b"junk", &bob_pub),
            Err(CryptoError::InvalidKeyEncoding(_))
        ));
    }
}
