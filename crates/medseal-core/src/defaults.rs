//! Centralized default constants for medseal.
//!
//! **This module is the single source of truth** for shared default values.
//! Both crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// IDENTITY KEYS
// =============================================================================

/// Prefix of the key-value store key under which an identity's key pair is
/// persisted. The full key is `<prefix><identity_id>`.
pub const KEY_STORE_PREFIX: &str = "medseal_keys_";

/// Challenge message a wallet signs to derive an identity key pair.
pub const KEY_DERIVATION_MESSAGE: &str = "MedBlock Key Derivation v1.0";

/// Suffix appended to [`KEY_DERIVATION_MESSAGE`] for the ECDH key pair.
pub const KEY_DERIVATION_ECDH_SUFFIX: &str = ":ECDH";

/// Default directory for the file-backed key store.
pub const KEYSTORE_DIR: &str = ".medseal/keys";

/// Encrypt file-backed key store entries at rest by default.
pub const ENCRYPT_KEYSTORE: bool = true;

// =============================================================================
// PACKAGES
// =============================================================================

/// Upper bound on recipients per package.
pub const MAX_RECIPIENTS: usize = 256;

/// Recipient count at which wrapping switches to the parallel path.
///
/// Below this, the per-recipient ECDH is cheap enough that thread hand-off
/// costs more than it saves.
pub const PARALLEL_WRAP_THRESHOLD: usize = 8;
