//! Passphrase key derivation using Argon2id.
//!
//! Only the file-backed key store uses this. Its sealed files record the
//! Argon2id parameters they were written with, and those parameters are read
//! back from disk before the passphrase is stretched, so they are bounds
//! checked like any other untrusted input.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::cipher::{SymmetricKey, KEY_LEN};
use crate::error::{CryptoError, CryptoResult};

/// Minimum passphrase length.
pub const MIN_PASSPHRASE_LENGTH: usize = 12;

/// Upper bound on memory cost accepted from a stored header (1 GiB).
pub const MAX_MEMORY_KIB: u32 = 1024 * 1024;

/// Upper bound on iterations accepted from a stored header.
pub const MAX_ITERATIONS: u32 = 16;

/// Upper bound on parallelism accepted from a stored header.
pub const MAX_PARALLELISM: u32 = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory in KiB (default: 65536 = 64 MiB).
    pub memory_kib: u32,
    /// Time iterations (default: 3).
    pub iterations: u32,
    /// Parallelism degree (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MiB
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Parameters for constrained devices (32 MiB, one extra pass).
    pub fn low_memory() -> Self {
        Self {
            memory_kib: 32768,
            iterations: 4,
            parallelism: 4,
        }
    }

    /// Reject costs outside what this crate will ever spend on one unlock.
    pub fn check_bounds(&self) -> CryptoResult<()> {
        if self.memory_kib > MAX_MEMORY_KIB
            || self.iterations > MAX_ITERATIONS
            || self.parallelism > MAX_PARALLELISM
        {
            return Err(CryptoError::KeyDerivation(format!(
                "KDF cost out of range: {} KiB, {} iterations, {} lanes",
                self.memory_kib, self.iterations, self.parallelism
            )));
        }
        Ok(())
    }
}

/// Stretch `passphrase` into an AES-256 key for the key store.
pub fn derive_storage_key(
    passphrase: &[u8],
    salt: &[u8; 32],
    params: &KdfParams,
) -> CryptoResult<SymmetricKey> {
    if passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(CryptoError::PassphraseTooShort(MIN_PASSPHRASE_LENGTH));
    }
    params.check_bounds()?;

    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SymmetricKey::from_bytes(key))
}

/// Validate passphrase strength.
pub fn validate_passphrase(passphrase: &str) -> CryptoResult<()> {
    if passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(CryptoError::PassphraseTooShort(MIN_PASSPHRASE_LENGTH));
    }
    Ok(())
}
