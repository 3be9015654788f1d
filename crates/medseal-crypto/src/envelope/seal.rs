//! Building and opening envelope packages.

use chrono::{SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use medseal_core::config::VaultConfig;
use medseal_core::defaults::{MAX_RECIPIENTS, PARALLEL_WRAP_THRESHOLD};

use super::package::{EnvelopePackage, WrappedKeys};
use crate::cipher::{self, SymmetricKey};
use crate::error::{CryptoError, CryptoResult};
use crate::format::{ensure_supported_version, PACKAGE_VERSION};
use crate::keys::{KeyPair, PrivateKey, PublicKey};
use crate::recipient::{RecipientId, Recipients};
use crate::wrap::{unwrap_key, wrap_for_recipients};

/// Limits applied while building a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Largest recipient set accepted.
    pub max_recipients: usize,
    /// Recipient count at which wrapping moves to the rayon pool.
    pub parallel_wrap_threshold: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_recipients: MAX_RECIPIENTS,
            parallel_wrap_threshold: PARALLEL_WRAP_THRESHOLD,
        }
    }
}

impl From<&VaultConfig> for BuildOptions {
    fn from(config: &VaultConfig) -> Self {
        Self {
            max_recipients: config.max_recipients,
            parallel_wrap_threshold: config.parallel_wrap_threshold,
        }
    }
}

/// Encrypt `plaintext` for `recipients` with default options.
///
/// # Example
///
/// ```rust
/// use medseal_crypto::{build, open, KeyPair, Recipients};
///
/// let doctor = KeyPair::generate();
/// let patient = KeyPair::generate();
///
/// let mut recipients = Recipients::new();
/// recipients.insert("0xpatient".into(), patient.public.clone());
///
/// let package = build(b"Diagnosis: healthy", &doctor, &recipients).unwrap();
/// let plaintext = open(&package, &"0xpatient".into(), &patient.private).unwrap();
/// assert_eq!(plaintext, b"Diagnosis: healthy");
/// ```
pub fn build(
    plaintext: &[u8],
    sender: &KeyPair,
    recipients: &Recipients,
) -> CryptoResult<EnvelopePackage> {
    build_with_options(plaintext, sender, recipients, &BuildOptions::default())
}

/// Encrypt `plaintext` for `recipients`.
///
/// A fresh data key encrypts the payload once and is then wrapped for every
/// recipient. The package embeds the sender's public key, so recipients need
/// nothing else to open it.
pub fn build_with_options(
    plaintext: &[u8],
    sender: &KeyPair,
    recipients: &Recipients,
    options: &BuildOptions,
) -> CryptoResult<EnvelopePackage> {
    check_recipients(recipients, options)?;

    let data_key = cipher::generate_key();
    let sealed = cipher::encrypt(plaintext, &data_key)?;
    let wrapped_keys = wrap_data_key(&data_key, sender, recipients, options)?;

    debug!(
        recipient_count = recipients.len(),
        payload_len = plaintext.len(),
        version = PACKAGE_VERSION,
        "Envelope package sealed"
    );

    Ok(EnvelopePackage::new(
        PACKAGE_VERSION.to_string(),
        sealed.ciphertext,
        sealed.nonce.to_vec(),
        wrapped_keys,
        sender.public.to_der()?,
        Utc::now().trunc_subsecs(3),
    ))
}

/// Decrypt a package as `recipient`.
///
/// An unknown version fails with `UnsupportedVersion` before anything else
/// is looked at. Every other failure (no wrapped key for `recipient`, a
/// private key that does not match, a tampered ciphertext, nonce or wrapped
/// key) is reported as the same [`CryptoError::AccessDenied`].
pub fn open(
    package: &EnvelopePackage,
    recipient: &RecipientId,
    private_key: &PrivateKey,
) -> CryptoResult<Vec<u8>> {
    let data_key = recover_data_key(
        package.version(),
        package.wrapped_keys(),
        package.sender_public_key(),
        recipient,
        private_key,
    )?;

    let plaintext = cipher::decrypt(package.ciphertext(), &data_key, package.nonce())
        .map_err(|_| deny(recipient, "payload"))?;

    debug!(recipient_id = %recipient, payload_len = plaintext.len(), "Envelope package opened");
    Ok(plaintext)
}

/// Serialize `value` as JSON and seal it.
pub fn build_json<T: Serialize + ?Sized>(
    value: &T,
    sender: &KeyPair,
    recipients: &Recipients,
) -> CryptoResult<EnvelopePackage> {
    let plaintext = serde_json::to_vec(value)?;
    build(&plaintext, sender, recipients)
}

/// Open a package built by [`build_json`] and decode its JSON payload.
pub fn open_json<T: DeserializeOwned>(
    package: &EnvelopePackage,
    recipient: &RecipientId,
    private_key: &PrivateKey,
) -> CryptoResult<T> {
    let plaintext = open(package, recipient, private_key)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

pub(crate) fn check_recipients(recipients: &Recipients, options: &BuildOptions) -> CryptoResult<()> {
    if recipients.is_empty() {
        return Err(CryptoError::EmptyRecipientSet);
    }
    if recipients.len() > options.max_recipients {
        return Err(CryptoError::TooManyRecipients {
            count: recipients.len(),
            max: options.max_recipients,
        });
    }
    Ok(())
}

pub(crate) fn wrap_data_key(
    data_key: &SymmetricKey,
    sender: &KeyPair,
    recipients: &Recipients,
    options: &BuildOptions,
) -> CryptoResult<WrappedKeys> {
    wrap_for_recipients(
        data_key.as_bytes(),
        &sender.private,
        recipients,
        options.parallel_wrap_threshold,
    )
}

/// Version gate, key lookup and unwrap, shared by packages and records.
pub(crate) fn recover_data_key(
    version: &str,
    wrapped_keys: &WrappedKeys,
    sender_public_key: &[u8],
    recipient: &RecipientId,
    private_key: &PrivateKey,
) -> CryptoResult<SymmetricKey> {
    ensure_supported_version(version)?;

    let record = wrapped_keys
        .get(recipient)
        .ok_or_else(|| deny(recipient, "no wrapped key"))?;
    let sender = PublicKey::from_der(sender_public_key).map_err(|_| deny(recipient, "sender key"))?;
    let data_key = unwrap_key(record, private_key, &sender).map_err(|_| deny(recipient, "unwrap"))?;

    cipher::import_key(&data_key).map_err(|_| deny(recipient, "data key"))
}

pub(crate) fn deny(recipient: &RecipientId, stage: &str) -> CryptoError {
    debug!(recipient_id = %recipient, stage, "Access denied");
    CryptoError::AccessDenied
}
