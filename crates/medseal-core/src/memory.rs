//! In-memory collaborator implementations.
//!
//! Used by tests and by local tooling that has no ledger or IPFS node. Each
//! store can be switched "offline" to exercise failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::traits::{BlobStore, ContentId, IdentityRegistry, KeyValueStore};

/// Blob store addressed by the BLAKE3 hash of the content.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<ContentId, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Overwrite a stored blob in place. Only useful for tamper tests.
    pub async fn replace(&self, id: &ContentId, bytes: Vec<u8>) -> Result<()> {
        let mut blobs = self.blobs.write().await;
        match blobs.get_mut(id) {
            Some(slot) => {
                *slot = bytes;
                Ok(())
            }
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("blob store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<ContentId> {
        self.check_online()?;
        let id = ContentId::new(blake3::hash(&bytes).to_hex().to_string());
        self.blobs.write().await.insert(id.clone(), bytes);
        Ok(id)
    }

    async fn get(&self, id: &ContentId) -> Result<Vec<u8>> {
        self.check_online()?;
        self.blobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

/// Identity registry backed by a map of identity id to public key bytes.
#[derive(Debug, Default)]
pub struct MemoryIdentityRegistry {
    keys: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryIdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityRegistry for MemoryIdentityRegistry {
    async fn resolve_public_key(&self, identity_id: &str) -> Result<Vec<u8>> {
        self.keys
            .read()
            .await
            .get(identity_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("identity {}", identity_id)))
    }

    async fn publish_public_key(&self, identity_id: &str, public_key: &[u8]) -> Result<()> {
        self.keys
            .write()
            .await
            .insert(identity_id.to_string(), public_key.to_vec());
        Ok(())
    }
}

/// Key-value store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate storage becoming unreadable (or readable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("key store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.check_online()?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_online()?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}
