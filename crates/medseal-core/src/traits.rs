//! Collaborator traits consumed by the envelope-encryption core.
//!
//! All three are suspending boundaries. Timeouts and retries are the
//! implementor's business; the crypto core calls each method once and
//! propagates whatever comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// =============================================================================
// BLOB STORE
// =============================================================================

/// Opaque identifier returned by a content-addressable blob store.
///
/// The core never inspects its structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Content-addressable blob store (IPFS-style).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist bytes and return their content id.
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId>;

    /// Fetch bytes by content id. Unknown ids yield `Error::NotFound`.
    async fn get(&self, id: &ContentId) -> Result<Vec<u8>>;
}

// =============================================================================
// IDENTITY REGISTRY
// =============================================================================

/// Ledger mapping account identifiers to their published public keys.
///
/// The registry governs who exists; it does not decide who may read a record.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Resolve the published public key (SPKI DER) for an identity.
    ///
    /// Unregistered identities yield `Error::NotFound`.
    async fn resolve_public_key(&self, identity_id: &str) -> Result<Vec<u8>>;

    /// Publish (or replace) the public key for an identity.
    async fn publish_public_key(&self, identity_id: &str, public_key: &[u8]) -> Result<()>;
}

// =============================================================================
// KEY-VALUE STORE
// =============================================================================

/// Local persistence for identity key pairs.
///
/// `get` must distinguish "no value" (`Ok(None)`) from "could not read"
/// (`Err`). Callers rely on that distinction to avoid regenerating a key pair
/// when storage is merely unreachable.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any existing one.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_display() {
        let id = ContentId::new("bafybeigdyrzt");
        assert_eq!(id.to_string(), "bafybeigdyrzt");
        assert_eq!(id.as_str(), "bafybeigdyrzt");
    }

    #[test]
    fn test_content_id_serializes_transparently() {
        let id = ContentId::from("Qm123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"Qm123\"");

        let parsed: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
