//! The sealed envelope package and its wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cipher::{NONCE_LEN, TAG_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_bytes, check_document_version, ensure_supported_version};
use crate::keys::PublicKey;
use crate::recipient::RecipientId;
use crate::wrap::WrappedKeyRecord;

/// Wrapped data keys, one per recipient.
pub type WrappedKeys = BTreeMap<RecipientId, WrappedKeyRecord>;

/// A payload encrypted once under a random data key, with that data key
/// wrapped for every authorized recipient.
///
/// Packages are produced by [`build`](super::build) and never change
/// afterwards; [`open`](super::open) only reads them. The fields are
/// reachable through accessors only.
///
/// ```text
/// {
///   "version": "2.0",
///   "ciphertext": "<base64>",
///   "iv": "<base64>",
///   "encryptedKeys": { "<recipientId>": { "ciphertext": "<base64>", "iv": "<base64>" } },
///   "senderPublicKey": "<base64 SPKI>",
///   "timestamp": 1700000000000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopePackage {
    version: String,

    #[serde(with = "base64_bytes")]
    ciphertext: Vec<u8>,

    #[serde(rename = "iv", with = "base64_bytes")]
    nonce: Vec<u8>,

    #[serde(rename = "encryptedKeys")]
    wrapped_keys: WrappedKeys,

    /// DER SPKI of the sender's public key.
    #[serde(with = "base64_bytes")]
    sender_public_key: Vec<u8>,

    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
}

impl EnvelopePackage {
    pub(crate) fn new(
        version: String,
        ciphertext: Vec<u8>,
        nonce: Vec<u8>,
        wrapped_keys: WrappedKeys,
        sender_public_key: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version,
            ciphertext,
            nonce,
            wrapped_keys,
            sender_public_key,
            created_at,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    pub fn wrapped_keys(&self) -> &WrappedKeys {
        &self.wrapped_keys
    }

    /// DER SPKI bytes of the sender's public key, as carried on the wire.
    pub fn sender_public_key(&self) -> &[u8] {
        &self.sender_public_key
    }

    /// Decode the embedded sender public key.
    pub fn sender_key(&self) -> CryptoResult<PublicKey> {
        PublicKey::from_der(&self.sender_public_key)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Recipients holding a wrapped key, in sorted order.
    ///
    /// Readable without any private key.
    pub fn recipients(&self) -> Vec<&RecipientId> {
        self.wrapped_keys.keys().collect()
    }

    /// Whether `recipient` has a wrapped key in this package.
    ///
    /// A `true` answer does not prove the caller's private key will unwrap
    /// it.
    pub fn can_open(&self, recipient: &RecipientId) -> bool {
        self.wrapped_keys.contains_key(recipient)
    }

    /// Structural validation.
    ///
    /// Checks the version, that at least one recipient exists, nonce and
    /// ciphertext lengths, and that the sender key decodes as P-256. Passing
    /// validation says nothing about whether the ciphertexts authenticate.
    pub fn validate(&self) -> CryptoResult<()> {
        ensure_supported_version(&self.version)?;

        if self.wrapped_keys.is_empty() {
            return Err(CryptoError::EmptyRecipientSet);
        }

        check_sealed_lengths("payload", &self.ciphertext, &self.nonce)?;
        for (id, record) in &self.wrapped_keys {
            check_sealed_lengths(
                &format!("wrapped key for {}", id),
                &record.ciphertext,
                &record.nonce,
            )?;
        }

        self.sender_key()?;
        Ok(())
    }

    /// Serialize to the JSON wire format.
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON wire format.
    ///
    /// The version is checked before the rest of the document, so a package
    /// from a newer format fails with `UnsupportedVersion` rather than a
    /// schema error.
    pub fn from_json(json: &[u8]) -> CryptoResult<Self> {
        check_document_version(json)?;
        Ok(serde_json::from_slice(json)?)
    }
}

/// Length checks shared by packages and secure records.
pub(crate) fn check_sealed_lengths(what: &str, ciphertext: &[u8], nonce: &[u8]) -> CryptoResult<()> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "{}: nonce must be {} bytes, got {}",
            what,
            NONCE_LEN,
            nonce.len()
        )));
    }
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::InvalidFormat(format!(
            "{}: ciphertext shorter than the authentication tag",
            what
        )));
    }
    Ok(())
}
