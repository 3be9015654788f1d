//! Record vault: envelope packages on top of a blob store and an identity
//! registry.
//!
//! The vault resolves recipient public keys from the registry, seals, and
//! stores the serialized package as a blob. Reading reverses it. It adds no
//! access policy of its own; whoever holds a content id and a matching
//! private key can read.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use medseal_core::config::VaultConfig;
use medseal_core::{BlobStore, ContentId, IdentityRegistry};

use crate::envelope::{build_with_options, open, BuildOptions, EnvelopePackage};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{KeyPair, PrivateKey, PublicKey};
use crate::recipient::{RecipientId, Recipients};
use crate::record::{
    create_secure_record_with_options, open_secure_record, OpenedRecord, RecordBody, RecordFile,
    RecordKeys, SecureRecord,
};

/// Where the two halves of a stored record live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordLocation {
    /// Encrypted body and attachments.
    pub main_cid: ContentId,
    /// Wrapped key map.
    pub keys_cid: ContentId,
}

pub struct RecordVault {
    blobs: Arc<dyn BlobStore>,
    registry: Arc<dyn IdentityRegistry>,
    options: BuildOptions,
}

impl RecordVault {
    pub fn new(blobs: Arc<dyn BlobStore>, registry: Arc<dyn IdentityRegistry>) -> Self {
        Self {
            blobs,
            registry,
            options: BuildOptions::default(),
        }
    }

    pub fn from_config(
        blobs: Arc<dyn BlobStore>,
        registry: Arc<dyn IdentityRegistry>,
        config: &VaultConfig,
    ) -> Self {
        Self::new(blobs, registry).with_options(BuildOptions::from(config))
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Look up the published public key of every recipient.
    ///
    /// An identity the registry does not know fails with `UnknownIdentity`.
    pub async fn resolve_recipients(&self, ids: &[RecipientId]) -> CryptoResult<Recipients> {
        let lookups = ids.iter().map(|id| async move {
            let der = self
                .registry
                .resolve_public_key(id.as_str())
                .await
                .map_err(|e| {
                    if e.is_not_found() {
                        CryptoError::UnknownIdentity(id.to_string())
                    } else {
                        CryptoError::from(e)
                    }
                })?;
            Ok::<_, CryptoError>((id.clone(), PublicKey::from_der(&der)?))
        });

        Ok(try_join_all(lookups).await?.into_iter().collect())
    }

    /// Seal `plaintext` for the given identities and store the package.
    #[instrument(skip(self, plaintext, sender), fields(subsystem = "vault", op = "seal", recipient_count = recipient_ids.len()))]
    pub async fn seal_and_store(
        &self,
        plaintext: &[u8],
        sender: &KeyPair,
        recipient_ids: &[RecipientId],
    ) -> CryptoResult<ContentId> {
        let recipients = self.resolve_recipients(recipient_ids).await?;
        let package = build_with_options(plaintext, sender, &recipients, &self.options)?;

        let cid = self.blobs.put(package.to_json()?.into_bytes()).await?;
        debug!(content_id = %cid, "Package stored");
        Ok(cid)
    }

    /// Fetch and parse a stored package without opening it.
    pub async fn fetch_package(&self, cid: &ContentId) -> CryptoResult<EnvelopePackage> {
        let bytes = self.blobs.get(cid).await?;
        EnvelopePackage::from_json(&bytes)
    }

    /// Fetch a stored package and open it as `recipient`.
    #[instrument(skip(self, private_key), fields(subsystem = "vault", op = "open"))]
    pub async fn fetch_and_open(
        &self,
        cid: &ContentId,
        recipient: &RecipientId,
        private_key: &PrivateKey,
    ) -> CryptoResult<Vec<u8>> {
        let package = self.fetch_package(cid).await?;
        open(&package, recipient, private_key)
    }

    /// Encrypt a record with attachments for the given identities and store
    /// it as two blobs.
    #[instrument(skip_all, fields(subsystem = "vault", op = "seal_record", file_count = files.len()))]
    pub async fn create_and_store_record(
        &self,
        record_data: &[u8],
        files: &[RecordFile],
        sender: &KeyPair,
        recipient_ids: &[RecipientId],
    ) -> CryptoResult<RecordLocation> {
        let recipients = self.resolve_recipients(recipient_ids).await?;
        let record =
            create_secure_record_with_options(record_data, files, sender, &recipients, &self.options)?;
        self.store_record(&record).await
    }

    /// Store a record as its body blob and its key-map blob.
    pub async fn store_record(&self, record: &SecureRecord) -> CryptoResult<RecordLocation> {
        let (body, keys) = record.split();
        let body = body.to_json()?.into_bytes();
        let keys = keys.to_json()?.into_bytes();

        let (main_cid, keys_cid) =
            futures::try_join!(self.blobs.put(body), self.blobs.put(keys))?;

        debug!(main_cid = %main_cid, keys_cid = %keys_cid, "Record stored");
        Ok(RecordLocation { main_cid, keys_cid })
    }

    /// Fetch both halves of a record concurrently and join them.
    pub async fn fetch_record(&self, location: &RecordLocation) -> CryptoResult<SecureRecord> {
        let (body, keys) = futures::try_join!(
            self.blobs.get(&location.main_cid),
            self.blobs.get(&location.keys_cid),
        )?;

        let body = RecordBody::from_json(&body)?;
        let keys = RecordKeys::from_json(&keys)?;
        Ok(SecureRecord::join(body, keys))
    }

    /// Fetch a record and open it as `recipient`.
    #[instrument(skip(self, private_key), fields(subsystem = "vault", op = "open_record"))]
    pub async fn fetch_and_open_record(
        &self,
        location: &RecordLocation,
        recipient: &RecipientId,
        private_key: &PrivateKey,
    ) -> CryptoResult<OpenedRecord> {
        let record = self.fetch_record(location).await?;
        open_secure_record(&record, recipient, private_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medseal_core::{MemoryBlobStore, MemoryIdentityRegistry};

    struct Fixture {
        vault: RecordVault,
        blobs: Arc<MemoryBlobStore>,
        doctor: KeyPair,
        patient: KeyPair,
    }

    async fn fixture() -> Fixture {
        let blobs = Arc::new(MemoryBlobStore::new());
        let registry = Arc::new(MemoryIdentityRegistry::new());
        let doctor = KeyPair::generate();
        let patient = KeyPair::generate();

        for (id, kp) in [("0xdoctor", &doctor), ("0xpatient", &patient)] {
            registry
                .publish_public_key(id, &kp.public.to_der().unwrap())
                .await
                .unwrap();
        }

        Fixture {
            vault: RecordVault::new(blobs.clone(), registry),
            blobs,
            doctor,
            patient,
        }
    }

    fn ids(ids: &[&str]) -> Vec<RecipientId> {
        ids.iter().map(|id| RecipientId::from(*id)).collect()
    }

    #[tokio::test]
    async fn test_seal_store_fetch_open() {
        let f = fixture().await;
        let cid = f
            .vault
            .seal_and_store(b"MRI: normal", &f.doctor, &ids(&["0xdoctor", "0xpatient"]))
            .await
            .unwrap();

        let plaintext = f
            .vault
            .fetch_and_open(&cid, &"0xpatient".into(), &f.patient.private)
            .await
            .unwrap();
        assert_eq!(plaintext, b"MRI: normal");
    }

    #[tokio::test]
    async fn test_unknown_recipient_identity() {
        let f = fixture().await;
        let err = f
            .vault
            .seal_and_store(b"x", &f.doctor, &ids(&["0xdoctor", "0xstranger"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoError::UnknownIdentity(id) if id == "0xstranger"));
        assert!(f.blobs.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_recipient_list() {
        let f = fixture().await;
        assert!(matches!(
            f.vault.seal_and_store(b"x", &f.doctor, &[]).await,
            Err(CryptoError::EmptyRecipientSet)
        ));
    }

    #[tokio::test]
    async fn test_blob_store_offline_is_transient() {
        let f = fixture().await;
        f.blobs.set_offline(true);
        let err = f
            .vault
            .seal_and_store(b"x", &f.doctor, &ids(&["0xpatient"]))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unknown_content_id_is_terminal() {
        let f = fixture().await;
        let err = f
            .vault
            .fetch_and_open(&ContentId::new("does-not-exist"), &"0xpatient".into(), &f.patient.private)
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoError::NotFound(ref cid) if cid == "does-not-exist"));
        assert!(!err.is_transient());

        let missing = RecordLocation {
            main_cid: ContentId::new("gone-main"),
            keys_cid: ContentId::new("gone-keys"),
        };
        let err = f.vault.fetch_record(&missing).await.unwrap_err();
        assert!(matches!(err, CryptoError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_record_split_storage() {
        let f = fixture().await;
        let files = vec![RecordFile::new("ecg.pdf", "application/pdf", vec![1, 2, 3, 4])];

        let location = f
            .vault
            .create_and_store_record(b"{\"hr\":64}", &files, &f.doctor, &ids(&["0xpatient"]))
            .await
            .unwrap();
        assert_ne!(location.main_cid, location.keys_cid);
        assert_eq!(f.blobs.len().await, 2);

        let opened = f
            .vault
            .fetch_and_open_record(&location, &"0xpatient".into(), &f.patient.private)
            .await
            .unwrap();
        assert_eq!(opened.data, b"{\"hr\":64}");
        assert_eq!(opened.files, files);
    }

    #[tokio::test]
    async fn test_record_location_wire_names() {
        let location = RecordLocation {
            main_cid: ContentId::new("a"),
            keys_cid: ContentId::new("b"),
        };
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(json["mainCid"], "a");
        assert_eq!(json["keysCid"], "b");
    }
}
