//! Shared wire-format utilities.
//!
//! Packages and records are JSON documents with base64-encoded binary
//! fields. Every document carries a `version` string that is checked before
//! anything else is parsed.

use base64::Engine;
use serde::Deserialize;

use crate::error::{CryptoError, CryptoResult};

/// Current package/record format version.
pub const PACKAGE_VERSION: &str = "2.0";

/// Versions this opener understands.
pub const SUPPORTED_VERSIONS: &[&str] = &[PACKAGE_VERSION];

/// Whether `version` is one this opener can read.
pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// Fail closed on any version outside [`SUPPORTED_VERSIONS`].
pub fn ensure_supported_version(version: &str) -> CryptoResult<()> {
    if is_supported_version(version) {
        Ok(())
    } else {
        Err(CryptoError::UnsupportedVersion(version.to_string()))
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: String,
}

/// Read only the `version` field of a JSON document and gate on it.
///
/// A document with an unknown version is rejected here, before the full
/// schema is applied, so a future format is never half-parsed.
pub fn check_document_version(json: &[u8]) -> CryptoResult<()> {
    let probe: VersionProbe = serde_json::from_slice(json)
        .map_err(|e| CryptoError::InvalidFormat(format!("Missing or invalid version: {}", e)))?;
    ensure_supported_version(&probe.version)
}

/// Encode bytes as base64.
pub fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decode base64 string to bytes.
pub fn base64_decode(data: &str) -> CryptoResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| CryptoError::InvalidFormat(format!("Invalid base64: {}", e)))
}

/// Serde helper for base64-encoded `Vec<u8>` fields.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}
