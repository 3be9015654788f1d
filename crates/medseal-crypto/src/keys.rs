//! P-256 key pairs for identity keys and key agreement.
//!
//! Public keys travel as DER `SubjectPublicKeyInfo` (the browser "spki"
//! export); private keys as DER PKCS#8. Import checks the algorithm and
//! curve identifiers first, so key material for another curve surfaces as
//! [`CryptoError::CurveMismatch`] instead of a generic decode failure.
//!
//! # Security
//!
//! - Private keys are zeroized on drop (the underlying scalar type does it)
//! - `Debug` never prints private key material
//! - Random number generation uses the ChaCha-based thread CSPRNG

use hkdf::Hkdf;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::elliptic_curve::ALGORITHM_OID;
use p256::pkcs8::{
    AssociatedOid, DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey,
    PrivateKeyInfo, SubjectPublicKeyInfoRef,
};
use p256::NistP256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_decode, base64_encode};
use medseal_core::defaults::{KEY_DERIVATION_ECDH_SUFFIX, KEY_DERIVATION_MESSAGE};

/// HKDF info string for signature-derived identity keys.
const HKDF_INFO_IDENTITY: &[u8] = b"medseal-identity-p256-v1";

/// Candidate scalars tried before giving up on a signature.
///
/// A uniformly random 256-bit string is a valid P-256 scalar with
/// probability about 1 - 2^-32, so the loop practically never runs twice.
const MAX_DERIVATION_ATTEMPTS: u32 = 16;

/// P-256 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(p256::PublicKey);

impl PublicKey {
    /// Export as DER `SubjectPublicKeyInfo`.
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
    }

    /// Import from DER `SubjectPublicKeyInfo`.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let info = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| CryptoError::InvalidKeyEncoding(format!("Invalid SPKI: {}", e)))?;

        if info.algorithm.oid != ALGORITHM_OID {
            return Err(CryptoError::CurveMismatch(format!(
                "Expected EC public key, got algorithm {}",
                info.algorithm.oid
            )));
        }
        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|e| CryptoError::InvalidKeyEncoding(format!("Missing curve: {}", e)))?;
        if curve != NistP256::OID {
            return Err(CryptoError::CurveMismatch(format!(
                "Expected P-256, got curve {}",
                curve
            )));
        }

        p256::PublicKey::from_public_key_der(der)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
    }

    /// Import from a raw SEC1 point (compressed or uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKeyEncoding("Invalid SEC1 point".to_string()))
    }

    /// Export as base64 DER, the form stored in packages and registries.
    pub fn to_base64(&self) -> CryptoResult<String> {
        Ok(base64_encode(&self.to_der()?))
    }

    /// Import from base64 DER.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let der = base64_decode(encoded)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Self::from_der(&der)
    }

    /// Short hex fingerprint for logs and debug output.
    pub fn fingerprint(&self) -> String {
        let point = self.0.to_encoded_point(true);
        let digest = Sha256::digest(point.as_bytes());
        hex::encode(&digest[..8])
    }

    pub(crate) fn as_p256(&self) -> &p256::PublicKey {
        &self.0
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let encoded = self.to_base64().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&encoded)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// P-256 private key.
///
/// Must never leave the local trust boundary.
#[derive(Clone)]
pub struct PrivateKey(p256::SecretKey);

impl PrivateKey {
    /// Export as DER PKCS#8.
    pub fn to_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        self.0
            .to_pkcs8_der()
            .map(|doc| Zeroizing::new(doc.as_bytes().to_vec()))
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
    }

    /// Import from DER PKCS#8.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| CryptoError::InvalidKeyEncoding(format!("Invalid PKCS#8: {}", e)))?;

        if info.algorithm.oid != ALGORITHM_OID {
            return Err(CryptoError::CurveMismatch(format!(
                "Expected EC private key, got algorithm {}",
                info.algorithm.oid
            )));
        }
        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|e| CryptoError::InvalidKeyEncoding(format!("Missing curve: {}", e)))?;
        if curve != NistP256::OID {
            return Err(CryptoError::CurveMismatch(format!(
                "Expected P-256, got curve {}",
                curve
            )));
        }

        p256::SecretKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
    }

    /// Derive the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) fn as_p256(&self) -> &p256::SecretKey {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// P-256 key pair owned by one identity.
#[derive(Clone)]
pub struct KeyPair {
    /// The public key (can be shared).
    pub public: PublicKey,
    /// The private key (must be kept secret).
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let secret = p256::SecretKey::random(&mut rand::thread_rng());
        Self::from_private(PrivateKey(secret))
    }

    /// Create a key pair from an existing private key.
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { public, private }
    }

    /// Deterministically derive a key pair from a wallet signature.
    ///
    /// `signature` is the signer's output over [`challenge_message`]. The
    /// same signature always yields the same key pair, so an identity can be
    /// recovered on a new device by signing the challenge again.
    pub fn derive_from_signature(signature: &[u8]) -> CryptoResult<Self> {
        if signature.is_empty() {
            return Err(CryptoError::InvalidInput("Empty signature".to_string()));
        }

        let salt = challenge_message();
        let hkdf = Hkdf::<Sha256>::new(Some(salt.as_bytes()), signature);

        for attempt in 0..MAX_DERIVATION_ATTEMPTS {
            let mut info = HKDF_INFO_IDENTITY.to_vec();
            info.extend_from_slice(&attempt.to_be_bytes());

            let mut candidate = Zeroizing::new([0u8; 32]);
            hkdf.expand(&info, &mut candidate[..])
                .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

            if let Ok(secret) = p256::SecretKey::from_slice(&candidate[..]) {
                return Ok(Self::from_private(PrivateKey(secret)));
            }
        }

        Err(CryptoError::KeyDerivation(
            "No valid P-256 scalar derived from signature".to_string(),
        ))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// The message a wallet signs to derive its identity key pair.
pub fn challenge_message() -> String {
    format!("{}{}", KEY_DERIVATION_MESSAGE, KEY_DERIVATION_ECDH_SUFFIX)
}
