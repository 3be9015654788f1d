//! Secure records: a record body plus attached files under one data key.
//!
//! A record is an envelope package whose data key also encrypts an ordered
//! list of files. One successful unwrap opens the body and every file.
//!
//! For storage a record is split into two documents, the encrypted body
//! ([`RecordBody`]) and the key map ([`RecordKeys`]), stored as separate
//! blobs and joined again on fetch.

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cipher;
use crate::envelope::{
    check_recipients, check_sealed_lengths, deny, recover_data_key, wrap_data_key, BuildOptions,
    WrappedKeys,
};
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_bytes, check_document_version, ensure_supported_version, PACKAGE_VERSION};
use crate::keys::{KeyPair, PrivateKey, PublicKey};
use crate::recipient::{RecipientId, Recipients};

/// A ciphertext and the nonce it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedData {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    #[serde(rename = "iv", with = "base64_bytes")]
    pub nonce: Vec<u8>,
}

/// One encrypted attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFile {
    #[serde(rename = "encryptedData", with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    #[serde(rename = "iv", with = "base64_bytes")]
    pub nonce: Vec<u8>,

    #[serde(rename = "fileName")]
    pub name: String,

    #[serde(rename = "fileType")]
    pub mime_type: String,

    /// Plaintext size in bytes.
    #[serde(rename = "fileSize")]
    pub size: u64,
}

/// A plaintext attachment, given to [`create_secure_record`] and returned by
/// [`open_secure_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl RecordFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// A decrypted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedRecord {
    /// Record body plaintext.
    pub data: Vec<u8>,
    /// Attachments, in the order they were sealed.
    pub files: Vec<RecordFile>,
}

impl OpenedRecord {
    /// Decode the record body as JSON.
    pub fn data_json<T: DeserializeOwned>(&self) -> CryptoResult<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

/// An encrypted record with attachments.
///
/// ```text
/// {
///   "version": "2.0",
///   "recordData": { "ciphertext": "<base64>", "iv": "<base64>" },
///   "files": [ { "encryptedData", "iv", "fileName", "fileType", "fileSize" } ],
///   "encryptedKeys": { "<recipientId>": { "ciphertext", "iv" } },
///   "senderPublicKey": "<base64 SPKI>",
///   "timestamp": 1700000000000
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureRecord {
    version: String,
    record_data: SealedData,
    #[serde(default)]
    files: Vec<EncryptedFile>,
    #[serde(rename = "encryptedKeys")]
    wrapped_keys: WrappedKeys,
    #[serde(with = "base64_bytes")]
    sender_public_key: Vec<u8>,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
}

/// The encrypted half of a split record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBody {
    pub version: String,
    pub record_data: SealedData,
    #[serde(default)]
    pub files: Vec<EncryptedFile>,
    #[serde(with = "base64_bytes")]
    pub sender_public_key: Vec<u8>,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl RecordBody {
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse, gating on the version first.
    pub fn from_json(json: &[u8]) -> CryptoResult<Self> {
        check_document_version(json)?;
        Ok(serde_json::from_slice(json)?)
    }
}

/// The key-map half of a split record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKeys {
    #[serde(rename = "encryptedKeys")]
    pub wrapped_keys: WrappedKeys,
}

impl RecordKeys {
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &[u8]) -> CryptoResult<Self> {
        Ok(serde_json::from_slice(json)?)
    }
}

impl SecureRecord {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn record_data(&self) -> &SealedData {
        &self.record_data
    }

    pub fn files(&self) -> &[EncryptedFile] {
        &self.files
    }

    pub fn wrapped_keys(&self) -> &WrappedKeys {
        &self.wrapped_keys
    }

    pub fn sender_public_key(&self) -> &[u8] {
        &self.sender_public_key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn recipients(&self) -> Vec<&RecipientId> {
        self.wrapped_keys.keys().collect()
    }

    pub fn can_open(&self, recipient: &RecipientId) -> bool {
        self.wrapped_keys.contains_key(recipient)
    }

    /// Structural validation, as for envelope packages, covering every file.
    pub fn validate(&self) -> CryptoResult<()> {
        ensure_supported_version(&self.version)?;
        if self.wrapped_keys.is_empty() {
            return Err(CryptoError::EmptyRecipientSet);
        }

        check_sealed_lengths("record data", &self.record_data.ciphertext, &self.record_data.nonce)?;
        for file in &self.files {
            check_sealed_lengths(&file.name, &file.ciphertext, &file.nonce)?;
        }
        for (id, record) in &self.wrapped_keys {
            check_sealed_lengths(&format!("wrapped key for {}", id), &record.ciphertext, &record.nonce)?;
        }

        PublicKey::from_der(&self.sender_public_key)?;
        Ok(())
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &[u8]) -> CryptoResult<Self> {
        check_document_version(json)?;
        Ok(serde_json::from_slice(json)?)
    }

    /// Separate the encrypted body from the key map.
    pub fn split(&self) -> (RecordBody, RecordKeys) {
        let body = RecordBody {
            version: self.version.clone(),
            record_data: self.record_data.clone(),
            files: self.files.clone(),
            sender_public_key: self.sender_public_key.clone(),
            created_at: self.created_at,
        };
        let keys = RecordKeys {
            wrapped_keys: self.wrapped_keys.clone(),
        };
        (body, keys)
    }

    /// Reassemble a record from its two halves.
    pub fn join(body: RecordBody, keys: RecordKeys) -> Self {
        Self {
            version: body.version,
            record_data: body.record_data,
            files: body.files,
            wrapped_keys: keys.wrapped_keys,
            sender_public_key: body.sender_public_key,
            created_at: body.created_at,
        }
    }
}

/// Encrypt a record body and its files for `recipients`.
pub fn create_secure_record(
    record_data: &[u8],
    files: &[RecordFile],
    sender: &KeyPair,
    recipients: &Recipients,
) -> CryptoResult<SecureRecord> {
    create_secure_record_with_options(record_data, files, sender, recipients, &BuildOptions::default())
}

/// [`create_secure_record`] with explicit limits.
pub fn create_secure_record_with_options(
    record_data: &[u8],
    files: &[RecordFile],
    sender: &KeyPair,
    recipients: &Recipients,
    options: &BuildOptions,
) -> CryptoResult<SecureRecord> {
    check_recipients(recipients, options)?;

    let data_key = cipher::generate_key();
    let body = cipher::encrypt(record_data, &data_key)?;

    let mut encrypted_files = Vec::with_capacity(files.len());
    for file in files {
        trace!(file_name = %file.name, size = file.bytes.len(), "Encrypting attachment");
        let sealed = cipher::encrypt(&file.bytes, &data_key)?;
        encrypted_files.push(EncryptedFile {
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce.to_vec(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size: file.bytes.len() as u64,
        });
    }

    let wrapped_keys = wrap_data_key(&data_key, sender, recipients, options)?;

    debug!(
        recipient_count = recipients.len(),
        file_count = files.len(),
        payload_len = record_data.len(),
        "Secure record sealed"
    );

    Ok(SecureRecord {
        version: PACKAGE_VERSION.to_string(),
        record_data: SealedData {
            ciphertext: body.ciphertext,
            nonce: body.nonce.to_vec(),
        },
        files: encrypted_files,
        wrapped_keys,
        sender_public_key: sender.public.to_der()?,
        created_at: Utc::now().trunc_subsecs(3),
    })
}

/// Serialize `value` as the JSON record body and seal it with `files`.
pub fn create_secure_record_json<T: Serialize + ?Sized>(
    value: &T,
    files: &[RecordFile],
    sender: &KeyPair,
    recipients: &Recipients,
) -> CryptoResult<SecureRecord> {
    let record_data = serde_json::to_vec(value)?;
    create_secure_record(&record_data, files, sender, recipients)
}

/// Decrypt a record and all of its files as `recipient`.
///
/// Same failure semantics as [`open`](crate::envelope::open): unknown
/// versions fail with `UnsupportedVersion`, anything else with
/// `AccessDenied`.
pub fn open_secure_record(
    record: &SecureRecord,
    recipient: &RecipientId,
    private_key: &PrivateKey,
) -> CryptoResult<OpenedRecord> {
    let data_key = recover_data_key(
        &record.version,
        &record.wrapped_keys,
        &record.sender_public_key,
        recipient,
        private_key,
    )?;

    let data = cipher::decrypt(&record.record_data.ciphertext, &data_key, &record.record_data.nonce)
        .map_err(|_| deny(recipient, "record data"))?;

    let mut files = Vec::with_capacity(record.files.len());
    for file in &record.files {
        let bytes = cipher::decrypt(&file.ciphertext, &data_key, &file.nonce)
            .map_err(|_| deny(recipient, "attachment"))?;
        files.push(RecordFile {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            bytes,
        });
    }

    debug!(recipient_id = %recipient, file_count = files.len(), "Secure record opened");
    Ok(OpenedRecord { data, files })
}
