//! Directory-backed key-value store for identity key pairs.
//!
//! One file per key. Writes go to a temp file that is renamed over the
//! target, so a crash never leaves a half-written key pair behind. With a
//! passphrase, values are sealed in the MSKEY01 format before they touch the
//! disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use medseal_core::config::VaultConfig;
use medseal_core::{Error, KeyValueStore, Result};

use super::sealed::{is_sealed_value, seal_value, unseal_value};
use crate::cipher::generate_random;
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{validate_passphrase, KdfParams};

const KEY_FILE_EXTENSION: &str = "key";

/// Key-value store writing one file per key under a directory.
pub struct FileKeyStore {
    dir: PathBuf,
    passphrase: Option<Zeroizing<String>>,
    kdf_params: KdfParams,
}

impl FileKeyStore {
    /// Store values as plaintext files.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            passphrase: None,
            kdf_params: KdfParams::default(),
        }
    }

    /// Seal every value under `passphrase` (Argon2id + AES-256-GCM).
    pub fn with_passphrase(dir: impl Into<PathBuf>, passphrase: &str) -> CryptoResult<Self> {
        validate_passphrase(passphrase)?;
        Ok(Self {
            dir: dir.into(),
            passphrase: Some(Zeroizing::new(passphrase.to_string())),
            kdf_params: KdfParams::default(),
        })
    }

    /// Build from configuration.
    ///
    /// With `encrypt_keystore` set a passphrase is mandatory.
    pub fn from_config(config: &VaultConfig, passphrase: Option<&str>) -> CryptoResult<Self> {
        match (config.encrypt_keystore, passphrase) {
            (true, Some(passphrase)) => Self::with_passphrase(&config.keystore_dir, passphrase),
            (true, None) => Err(CryptoError::InvalidInput(
                "Encrypted key store requires a passphrase".to_string(),
            )),
            (false, _) => Ok(Self::new(&config.keystore_dir)),
        }
    }

    /// Override the Argon2id parameters used for new writes.
    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_encrypted(&self) -> bool {
        self.passphrase.is_some()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", sanitize_file_name(key), KEY_FILE_EXTENSION))
    }

    async fn seal(&self, value: Vec<u8>) -> Result<Vec<u8>> {
        let Some(passphrase) = self.passphrase.clone() else {
            return Ok(value);
        };
        let params = self.kdf_params.clone();
        let value = Zeroizing::new(value);

        // Argon2id blocks for tens of milliseconds
        tokio::task::spawn_blocking(move || seal_value(&value, &passphrase, &params))
            .await
            .map_err(|e| Error::Unavailable(format!("Key sealing task failed: {}", e)))?
            .map_err(|e| Error::Unavailable(format!("Cannot seal value: {}", e)))
    }

    async fn unseal(&self, key: &str, stored: Vec<u8>) -> Result<Vec<u8>> {
        match (&self.passphrase, is_sealed_value(&stored)) {
            (None, false) => Ok(stored),
            (None, true) => Err(Error::Unavailable(format!(
                "Value for {} is sealed but no passphrase is configured",
                key
            ))),
            (Some(_), false) => Err(Error::Unavailable(format!(
                "Value for {} is not sealed",
                key
            ))),
            (Some(passphrase), true) => {
                let passphrase = passphrase.clone();
                let opened = tokio::task::spawn_blocking(move || unseal_value(&stored, &passphrase))
                    .await
                    .map_err(|e| Error::Unavailable(format!("Key unsealing task failed: {}", e)))?
                    .map_err(|e| Error::Unavailable(format!("Cannot unseal {}: {}", key, e)))?;
                Ok(opened.to_vec())
            }
        }
    }
}

/// Create `path` readable by the owner only, then write and sync `data`.
async fn write_private_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[async_trait]
impl KeyValueStore for FileKeyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        let stored = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "key_store: read failed");
                return Err(e.into());
            }
        };
        self.unseal(key, stored).await.map(Some)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.path_for(key);
        let data = self.seal(value).await?;
        debug!(path = %path.display(), size = data.len(), "key_store: write");

        fs::create_dir_all(&self.dir).await.map_err(|e| {
            warn!(dir = %self.dir.display(), error = %e, "key_store: create_dir_all failed");
            e
        })?;

        // Atomic write: temp file + rename
        let temp_path = path.with_extension(format!("{}.tmp", hex::encode(generate_random::<8>())));
        if let Err(e) = write_private_file(&temp_path, &data).await {
            warn!(temp_path = %temp_path.display(), error = %e, "key_store: temp write failed");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            warn!(from = %temp_path.display(), to = %path.display(), error = %e, "key_store: rename failed");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map a key to a file name.
///
/// ASCII letters, digits, `-` and `_` pass through; every other byte becomes
/// `%XX`. The mapping is injective, and no result can contain a path
/// separator or be `.`/`..`.
fn sanitize_file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSPHRASE: &str = "correct horse battery staple";

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("medseal_keys_0xAbC"), "medseal_keys_0xAbC");
        assert_eq!(sanitize_file_name("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_eq!(sanitize_file_name("a:b"), "a%3Ab");
        assert_ne!(sanitize_file_name("a:b"), sanitize_file_name("a_b"));
        assert_ne!(sanitize_file_name("a%3Ab"), sanitize_file_name("a:b"));
    }

    #[tokio::test]
    async fn test_plaintext_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());

        assert!(store.get("medseal_keys_0xabc").await.unwrap().is_none());
        store.put("medseal_keys_0xabc", b"value".to_vec()).await.unwrap();
        assert_eq!(
            store.get("medseal_keys_0xabc").await.unwrap(),
            Some(b"value".to_vec())
        );
    }

    #[tokio::test]
    async fn test_put_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());

        store.put("k", b"one".to_vec()).await.unwrap();
        store.put("k", b"two".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"two".to_vec()));

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());
        store.put("k", b"private".to_vec()).await.unwrap();

        let mode = std::fs::metadata(store.path_for("k")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_failed_put_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());

        // A directory where the key file should go makes the rename fail
        std::fs::create_dir(store.path_for("k")).unwrap();
        assert!(store.put("k", b"v".to_vec()).await.is_err());

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![store.path_for("k").file_name().unwrap().to_owned()]);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::new(dir.path());

        store.put("k", b"v".to_vec()).await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // Deleting again is fine
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_encrypted_roundtrip_and_at_rest_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyStore::with_passphrase(dir.path(), PASSPHRASE)
            .unwrap()
            .with_kdf_params(fast_params());
        assert!(store.is_encrypted());

        store.put("k", b"private material".to_vec()).await.unwrap();
        assert_eq!(
            store.get("k").await.unwrap(),
            Some(b"private material".to_vec())
        );

        let on_disk = std::fs::read(store.path_for("k")).unwrap();
        assert!(is_sealed_value(&on_disk));
        assert!(!on_disk
            .windows(b"private material".len())
            .any(|w| w == b"private material"));
    }

    #[tokio::test]
    async fn test_wrong_passphrase_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileKeyStore::with_passphrase(dir.path(), PASSPHRASE)
            .unwrap()
            .with_kdf_params(fast_params());
        writer.put("k", b"v".to_vec()).await.unwrap();

        let reader = FileKeyStore::with_passphrase(dir.path(), "a different passphrase").unwrap();
        assert!(matches!(reader.get("k").await, Err(Error::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_mode_mismatch_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let plain = FileKeyStore::new(dir.path());
        plain.put("k", b"v".to_vec()).await.unwrap();

        let sealed = FileKeyStore::with_passphrase(dir.path(), PASSPHRASE).unwrap();
        assert!(matches!(sealed.get("k").await, Err(Error::Unavailable(_))));
    }

    #[test]
    fn test_short_passphrase_rejected() {
        assert!(matches!(
            FileKeyStore::with_passphrase("/tmp/unused", "short"),
            Err(CryptoError::PassphraseTooShort(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = VaultConfig {
            keystore_dir: PathBuf::from("/tmp/medseal-test"),
            encrypt_keystore: true,
            ..VaultConfig::default()
        };
        assert!(matches!(
            FileKeyStore::from_config(&config, None),
            Err(CryptoError::InvalidInput(_))
        ));
        let store = FileKeyStore::from_config(&config, Some(PASSPHRASE)).unwrap();
        assert!(store.is_encrypted());
        assert_eq!(store.dir(), Path::new("/tmp/medseal-test"));

        let config = VaultConfig {
            encrypt_keystore: false,
            ..config
        };
        assert!(!FileKeyStore::from_config(&config, None).unwrap().is_encrypted());
    }
}
