//! # medseal-crypto
//!
//! Envelope encryption for medical records.
//!
//! A payload is encrypted once under a random data key; the data key is then
//! wrapped separately for every authorized recipient using a key agreed by
//! ECDH between the sender and that recipient. The result is a
//! self-describing, versioned JSON package that only the listed recipients
//! can open.
//!
//! ## Cryptographic Primitives
//!
//! - **Key agreement**: ECDH on NIST P-256
//! - **Symmetric cipher**: AES-256-GCM (AEAD), fresh 96-bit nonce per call
//! - **Identity derivation**: HKDF-SHA256 over a wallet signature
//! - **Key store at rest**: Argon2id + AES-256-GCM (MSKEY01)
//! - **Random generation**: OS-seeded ChaCha CSPRNG
//!
//! ## Package Format (v2.0)
//!
//! ```text
//! {
//!   "version": "2.0",
//!   "ciphertext": "<base64>",
//!   "iv": "<base64>",
//!   "encryptedKeys": { "<recipientId>": { "ciphertext": "<base64>", "iv": "<base64>" } },
//!   "senderPublicKey": "<base64 SPKI>",
//!   "timestamp": <ms since epoch>
//! }
//! ```
//!
//! ## Examples
//!
//! ### Seal for a Doctor and a Patient
//!
//! ```rust
//! use medseal_crypto::{build, open, CryptoError, KeyPair, Recipients};
//!
//! let doctor = KeyPair::generate();
//! let patient = KeyPair::generate();
//! let nurse = KeyPair::generate();
//!
//! let mut recipients = Recipients::new();
//! recipients.insert("0xdoctor".into(), doctor.public.clone());
//! recipients.insert("0xpatient".into(), patient.public.clone());
//!
//! let package = build(b"Diagnosis: healthy", &doctor, &recipients).unwrap();
//!
//! assert_eq!(open(&package, &"0xpatient".into(), &patient.private).unwrap(), b"Diagnosis: healthy");
//! assert!(matches!(
//!     open(&package, &"0xnurse".into(), &nurse.private),
//!     Err(CryptoError::AccessDenied)
//! ));
//! ```
//!
//! ### Wire Round Trip
//!
//! ```rust
//! use medseal_crypto::{build, EnvelopePackage, KeyPair, Recipients};
//!
//! let sender = KeyPair::generate();
//! let mut recipients = Recipients::new();
//! recipients.insert("0xpatient".into(), KeyPair::generate().public);
//!
//! let package = build(b"lab results", &sender, &recipients).unwrap();
//! let json = package.to_json().unwrap();
//! let parsed = EnvelopePackage::from_json(json.as_bytes()).unwrap();
//! assert_eq!(parsed.recipients().len(), 1);
//! ```

pub mod cipher;
pub mod ecdh;
pub mod envelope;
pub mod error;
pub mod format;
pub mod identity;
pub mod kdf;
pub mod keys;
pub mod recipient;
pub mod record;
pub mod vault;
pub mod wrap;

// Re-export commonly used types
pub use cipher::{decrypt, encrypt, export_key, generate_key, import_key, Sealed, SymmetricKey};
pub use ecdh::{
    derive_shared_key, export_private, export_public, generate_keypair, import_private,
    import_public,
};
pub use envelope::{
    build, build_json, build_with_options, open, open_json, BuildOptions, EnvelopePackage,
    WrappedKeys,
};
pub use error::{CryptoError, CryptoResult};
pub use format::{PACKAGE_VERSION, SUPPORTED_VERSIONS};
pub use identity::{FileKeyStore, IdentityKeyManager};
pub use kdf::{KdfParams, MIN_PASSPHRASE_LENGTH};
pub use keys::{challenge_message, KeyPair, PrivateKey, PublicKey};
pub use recipient::{RecipientId, Recipients};
pub use record::{
    create_secure_record, create_secure_record_json, open_secure_record, EncryptedFile,
    OpenedRecord, RecordFile, SecureRecord,
};
pub use vault::{RecordLocation, RecordVault};
pub use wrap::{unwrap_key, wrap_key_for_recipient, WrappedKeyRecord};
