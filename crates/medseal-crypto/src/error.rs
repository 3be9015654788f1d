//! Error types for envelope-encryption operations.

use thiserror::Error;

/// Envelope-encryption errors.
///
/// [`CryptoError::AccessDenied`] is opaque: a missing wrapped
/// key, a wrong private key and a tampered package all produce the same
/// variant with the same message.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key material could not be decoded.
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Key material belongs to another curve or algorithm.
    #[error("Curve mismatch: {0}")]
    CurveMismatch(String),

    /// A package was built (or found) with no recipients.
    #[error("Recipient set is empty - the package would be unreadable")]
    EmptyRecipientSet,

    /// More recipients than the configured maximum.
    #[error("Too many recipients: {count} (maximum {max})")]
    TooManyRecipients { count: usize, max: usize },

    /// Package format version not understood by this opener.
    #[error("Unsupported package version: {0}")]
    UnsupportedVersion(String),

    /// Caller cannot read this package.
    #[error("Access denied")]
    AccessDenied,

    /// AEAD tag did not verify, or ciphertext/nonce were malformed.
    #[error("Authentication failed - data may be tampered")]
    Authentication,

    /// Identity key persistence could not be read or written.
    #[error("Key store unavailable: {0}")]
    KeyStoreUnavailable(String),

    /// The identity registry has no public key for this identity.
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    /// Blob store or registry could not be reached.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Content id (or other collaborator entry) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Structurally invalid package or record.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Passphrase too short.
    #[error("Passphrase too short (minimum {0} characters required)")]
    PassphraseTooShort(usize),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CryptoError {
    /// Whether retrying the same call could succeed.
    ///
    /// Only collaborator failures qualify; every cryptographic failure is
    /// terminal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CryptoError::KeyStoreUnavailable(_) | CryptoError::Storage(_) | CryptoError::Io(_)
        )
    }
}

impl From<medseal_core::Error> for CryptoError {
    fn from(e: medseal_core::Error) -> Self {
        use medseal_core::Error as CoreError;
        match e {
            CoreError::NotFound(what) => CryptoError::NotFound(what),
            CoreError::Unavailable(_) | CoreError::Io(_) => CryptoError::Storage(e.to_string()),
            CoreError::Serialization(msg) => CryptoError::InvalidFormat(msg),
            CoreError::Config(msg) => CryptoError::InvalidInput(msg),
        }
    }
}

/// Result type for envelope-encryption operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
