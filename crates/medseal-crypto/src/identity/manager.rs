//! Identity key manager.
//!
//! Each identity owns one long-lived P-256 key pair, created on first use and
//! persisted through a [`KeyValueStore`] under `medseal_keys_<identity>`:
//!
//! ```text
//! { "publicKey": "<base64 SPKI>", "privateKey": "<base64 PKCS#8>" }
//! ```
//!
//! A store that cannot be read is reported as `KeyStoreUnavailable`, and no
//! replacement pair is generated. Packages already wrapped for the stored
//! public key stay readable once the store is back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use medseal_core::defaults::KEY_STORE_PREFIX;
use medseal_core::{IdentityRegistry, KeyValueStore};

use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_decode, base64_encode};
use crate::keys::{KeyPair, PrivateKey, PublicKey};

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct StoredKeyPair {
    public_key: String,
    private_key: String,
}

impl StoredKeyPair {
    fn encode(keypair: &KeyPair) -> CryptoResult<Self> {
        Ok(Self {
            public_key: keypair.public.to_base64()?,
            private_key: base64_encode(&keypair.private.to_der()?),
        })
    }

    fn decode(&self) -> CryptoResult<KeyPair> {
        let public = PublicKey::from_base64(&self.public_key)?;
        let private_der = zeroize::Zeroizing::new(
            base64_decode(&self.private_key)
                .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?,
        );
        let private = PrivateKey::from_der(&private_der)?;

        if private.public_key() != public {
            return Err(CryptoError::InvalidKeyEncoding(
                "Stored public key does not match the private key".to_string(),
            ));
        }
        Ok(KeyPair { public, private })
    }
}

/// Creates, persists and publishes identity key pairs.
pub struct IdentityKeyManager {
    store: Arc<dyn KeyValueStore>,
    registry: Arc<dyn IdentityRegistry>,
    // Serializes first-use creation so two callers cannot persist different pairs
    create_lock: Mutex<()>,
}

impl IdentityKeyManager {
    pub fn new(store: Arc<dyn KeyValueStore>, registry: Arc<dyn IdentityRegistry>) -> Self {
        Self {
            store,
            registry,
            create_lock: Mutex::new(()),
        }
    }

    /// Storage key for an identity's key pair.
    pub fn storage_key(identity_id: &str) -> String {
        format!("{}{}", KEY_STORE_PREFIX, identity_id)
    }

    /// The persisted key pair, if there is one.
    pub async fn get_keypair(&self, identity_id: &str) -> CryptoResult<Option<KeyPair>> {
        let key = Self::storage_key(identity_id);
        let stored = self.store.get(&key).await.map_err(|e| {
            warn!(identity_id, error = %e, "Key store read failed");
            CryptoError::KeyStoreUnavailable(e.to_string())
        })?;

        let Some(bytes) = stored else {
            return Ok(None);
        };
        let stored: StoredKeyPair = serde_json::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidKeyEncoding(format!("Stored key pair: {}", e)))?;
        stored.decode().map(Some)
    }

    /// Return the persisted key pair, generating and persisting one on first
    /// use. Repeated calls return the same pair.
    #[instrument(skip(self), fields(subsystem = "identity", op = "get_or_create"))]
    pub async fn get_or_create_keypair(&self, identity_id: &str) -> CryptoResult<KeyPair> {
        self.get_or_insert_with(identity_id, || Ok(KeyPair::generate()))
            .await
    }

    /// Like [`get_or_create_keypair`](Self::get_or_create_keypair), but a
    /// missing pair is derived from `signature` (a wallet signature over
    /// [`challenge_message`](crate::keys::challenge_message)) so it can be
    /// recovered later by signing again.
    #[instrument(skip(self, signature), fields(subsystem = "identity", op = "get_or_derive"))]
    pub async fn get_or_derive_keypair(
        &self,
        identity_id: &str,
        signature: &[u8],
    ) -> CryptoResult<KeyPair> {
        self.get_or_insert_with(identity_id, || KeyPair::derive_from_signature(signature))
            .await
    }

    async fn get_or_insert_with<F>(&self, identity_id: &str, make: F) -> CryptoResult<KeyPair>
    where
        F: FnOnce() -> CryptoResult<KeyPair>,
    {
        if let Some(existing) = self.get_keypair(identity_id).await? {
            debug!(identity_id, "Loaded identity key pair");
            return Ok(existing);
        }

        let _guard = self.create_lock.lock().await;

        // Another caller may have created it while we waited
        if let Some(existing) = self.get_keypair(identity_id).await? {
            return Ok(existing);
        }

        let keypair = make()?;
        let stored = serde_json::to_vec(&StoredKeyPair::encode(&keypair)?)?;
        self.store
            .put(&Self::storage_key(identity_id), stored)
            .await
            .map_err(|e| {
                warn!(identity_id, error = %e, "Key store write failed");
                CryptoError::KeyStoreUnavailable(e.to_string())
            })?;

        info!(
            identity_id,
            fingerprint = %keypair.public.fingerprint(),
            "Identity key pair created"
        );
        Ok(keypair)
    }

    /// Publish `public_key` for `identity_id` to the identity registry.
    #[instrument(skip(self, public_key), fields(subsystem = "identity", op = "publish"))]
    pub async fn publish_public_key(
        &self,
        identity_id: &str,
        public_key: &PublicKey,
    ) -> CryptoResult<()> {
        let der = public_key.to_der()?;
        self.registry.publish_public_key(identity_id, &der).await?;
        info!(identity_id, fingerprint = %public_key.fingerprint(), "Public key published");
        Ok(())
    }

    /// Get or create the identity's key pair and publish its public key.
    pub async fn publish_identity(&self, identity_id: &str) -> CryptoResult<PublicKey> {
        let keypair = self.get_or_create_keypair(identity_id).await?;
        self.publish_public_key(identity_id, &keypair.public).await?;
        Ok(keypair.public)
    }

    /// Remove the persisted key pair.
    ///
    /// Packages wrapped for the deleted pair become unreadable for this
    /// identity.
    #[instrument(skip(self), fields(subsystem = "identity", op = "delete"))]
    pub async fn delete_keypair(&self, identity_id: &str) -> CryptoResult<()> {
        self.store
            .delete(&Self::storage_key(identity_id))
            .await
            .map_err(|e| CryptoError::KeyStoreUnavailable(e.to_string()))?;
        info!(identity_id, "Identity key pair deleted");
        Ok(())
    }
}
