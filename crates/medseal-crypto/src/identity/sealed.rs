//! Passphrase-protected storage format for key store values.
//!
//! # Format: MSKEY01
//!
//! ```text
//! +------------------+
//! | Magic: MSKEY01\n | 8 bytes
//! +------------------+
//! | Header Length    | 4 bytes (little-endian)
//! +------------------+
//! | Header (JSON)    | Variable
//! +------------------+
//! | Encrypted Value  | value length + 16-byte auth tag
//! +------------------+
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::cipher::{aes_gcm_decrypt, aes_gcm_encrypt, generate_nonce, generate_salt, NONCE_LEN, TAG_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_decode, base64_encode};
use crate::kdf::{derive_storage_key, KdfParams};

/// Magic bytes for sealed key store values.
pub const MAGIC_SEALED_VALUE: &[u8; 8] = b"MSKEY01\n";

const PREFIX_LEN: usize = 8 + 4;

/// Header for sealed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedValueHeader {
    /// Format version.
    pub version: u8,
    /// KDF algorithm (always "argon2id").
    pub kdf: String,
    /// KDF parameters.
    pub kdf_params: KdfParams,
    /// Salt for key derivation (base64).
    pub salt: String,
    /// Nonce for encryption (base64).
    pub nonce: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Encrypt `value` under a key derived from `passphrase`.
pub fn seal_value(value: &[u8], passphrase: &str, kdf_params: &KdfParams) -> CryptoResult<Vec<u8>> {
    let salt = generate_salt();
    let nonce = generate_nonce();

    let derived = derive_storage_key(passphrase.as_bytes(), &salt, kdf_params)?;
    let ciphertext = aes_gcm_encrypt(derived.as_bytes(), &nonce, value)?;

    let header = SealedValueHeader {
        version: 1,
        kdf: "argon2id".to_string(),
        kdf_params: kdf_params.clone(),
        salt: base64_encode(&salt),
        nonce: base64_encode(&nonce),
        created_at: Utc::now(),
    };

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| CryptoError::Encryption(format!("Header serialization failed: {}", e)))?;
    let header_len = (header_json.len() as u32).to_le_bytes();

    let mut output = Vec::with_capacity(PREFIX_LEN + header_json.len() + ciphertext.len());
    output.extend_from_slice(MAGIC_SEALED_VALUE);
    output.extend_from_slice(&header_len);
    output.extend_from_slice(&header_json);
    output.extend_from_slice(&ciphertext);

    Ok(output)
}

/// Decrypt a value produced by [`seal_value`].
///
/// A wrong passphrase or modified bytes fail with `Authentication`; a
/// structurally broken file with `InvalidFormat`.
pub fn unseal_value(sealed: &[u8], passphrase: &str) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if !is_sealed_value(sealed) {
        return Err(CryptoError::InvalidFormat("Missing MSKEY01 magic".to_string()));
    }
    if sealed.len() < PREFIX_LEN {
        return Err(CryptoError::InvalidFormat("File too short".to_string()));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&sealed[8..PREFIX_LEN]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;

    let body_start = PREFIX_LEN
        .checked_add(header_len)
        .filter(|start| sealed.len() >= start + TAG_LEN)
        .ok_or_else(|| CryptoError::InvalidFormat("File truncated".to_string()))?;

    let header: SealedValueHeader = serde_json::from_slice(&sealed[PREFIX_LEN..body_start])
        .map_err(|e| CryptoError::InvalidFormat(format!("Invalid header: {}", e)))?;

    let salt: [u8; 32] = base64_decode(&header.salt)?
        .try_into()
        .map_err(|_| CryptoError::InvalidFormat("Invalid salt length".to_string()))?;
    let nonce: [u8; NONCE_LEN] = base64_decode(&header.nonce)?
        .try_into()
        .map_err(|_| CryptoError::InvalidFormat("Invalid nonce length".to_string()))?;

    let derived = derive_storage_key(passphrase.as_bytes(), &salt, &header.kdf_params)?;
    let plaintext = aes_gcm_decrypt(derived.as_bytes(), &nonce, &sealed[body_start..])?;

    Ok(Zeroizing::new(plaintext))
}

/// Whether `data` starts with the MSKEY01 magic.
pub fn is_sealed_value(data: &[u8]) -> bool {
    data.len() >= MAGIC_SEALED_VALUE.len() && &data[..MAGIC_SEALED_VALUE.len()] == MAGIC_SEALED_VALUE
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSPHRASE: &str = "correct horse battery staple";

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let value = br#"{"publicKey":"abc","privateKey":"def"}"#;
        let sealed = seal_value(value, PASSPHRASE, &fast_params()).unwrap();
        let opened = unseal_value(&sealed, PASSPHRASE).unwrap();
        assert_eq!(opened.as_slice(), value);
    }

    #[test]
    fn test_magic_bytes() {
        let sealed = seal_value(b"v", PASSPHRASE, &fast_params()).unwrap();
        assert!(is_sealed_value(&sealed));
        assert_eq!(&sealed[..8], MAGIC_SEALED_VALUE);
        assert!(!is_sealed_value(b"{\"publicKey\":1}"));
    }

    #[test]
    fn test_wrong_passphrase() {
        let sealed = seal_value(b"secret", PASSPHRASE, &fast_params()).unwrap();
        assert!(matches!(
            unseal_value(&sealed, "another long passphrase"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_short_passphrase_rejected() {
        assert!(matches!(
            seal_value(b"secret", "short", &fast_params()),
            Err(CryptoError::PassphraseTooShort(_))
        ));
    }

    #[test]
    fn test_tampered_value() {
        let mut sealed = seal_value(b"secret", PASSPHRASE, &fast_params()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert!(unseal_value(&sealed, PASSPHRASE).is_err());
    }

    #[test]
    fn test_truncated_value() {
        let sealed = seal_value(b"secret", PASSPHRASE, &fast_params()).unwrap();
        assert!(matches!(
            unseal_value(&sealed[..20], PASSPHRASE),
            Err(CryptoError::InvalidFormat(_))
        ));
        assert!(matches!(
            unseal_value(b"MSKEY01\n", PASSPHRASE),
            Err(CryptoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_invalid_magic() {
        let mut data = vec![0u8; 100];
        data[..8].copy_from_slice(b"INVALID!");
        assert!(matches!(
            unseal_value(&data, PASSPHRASE),
            Err(CryptoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_same_value_different_output() {
        let a = seal_value(b"same", PASSPHRASE, &fast_params()).unwrap();
        let b = seal_value(b"same", PASSPHRASE, &fast_params()).unwrap();
        assert_ne!(a, b);
    }
}
