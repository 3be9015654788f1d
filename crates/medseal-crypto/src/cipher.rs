//! AES-256-GCM symmetric cipher engine.
//!
//! Every [`encrypt`] call samples a fresh 96-bit nonce from the OS-seeded
//! CSPRNG. Callers never supply nonces, so a nonce cannot be reused under the
//! same key through this API.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, CryptoResult};

/// Symmetric key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes (96-bit GCM nonce).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// 256-bit AES-GCM key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Output of one [`encrypt`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Ciphertext with the 16-byte tag appended.
    pub ciphertext: Vec<u8>,
    /// Nonce sampled for this call.
    pub nonce: [u8; NONCE_LEN],
}

/// Generate cryptographically secure random bytes.
pub fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a random salt (32 bytes).
pub fn generate_salt() -> [u8; 32] {
    generate_random()
}

/// Generate a random nonce (12 bytes).
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    generate_random()
}

/// Generate a fresh random 256-bit key.
pub fn generate_key() -> SymmetricKey {
    SymmetricKey(generate_random())
}

/// Export a key to its raw bytes.
pub fn export_key(key: &SymmetricKey) -> Vec<u8> {
    key.0.to_vec()
}

/// Import a key from raw bytes.
pub fn import_key(bytes: &[u8]) -> CryptoResult<SymmetricKey> {
    let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
        CryptoError::InvalidKeyEncoding(format!(
            "Expected {} key bytes, got {}",
            KEY_LEN,
            bytes.len()
        ))
    })?;
    Ok(SymmetricKey(arr))
}

/// Encrypt under a freshly sampled nonce.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> CryptoResult<Sealed> {
    let nonce = generate_nonce();
    let ciphertext = aes_gcm_encrypt(key.as_bytes(), &nonce, plaintext)?;
    Ok(Sealed { ciphertext, nonce })
}

/// Decrypt and verify.
///
/// A nonce of the wrong length, a truncated ciphertext and a failed tag all
/// yield [`CryptoError::Authentication`]; no plaintext is returned unless the
/// tag verifies.
pub fn decrypt(ciphertext: &[u8], key: &SymmetricKey, nonce: &[u8]) -> CryptoResult<Vec<u8>> {
    let nonce: &[u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| CryptoError::Authentication)?;
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::Authentication);
    }
    aes_gcm_decrypt(key.as_bytes(), nonce, ciphertext)
}

/// Encrypt plaintext with AES-256-GCM under an explicit nonce.
///
/// Returns ciphertext with appended authentication tag (16 bytes).
pub(crate) fn aes_gcm_encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encryption(e.to_string()))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))
}

/// Decrypt ciphertext with AES-256-GCM.
///
/// The ciphertext must include the authentication tag (16 bytes) at the end.
pub(crate) fn aes_gcm_decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Authentication)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}
