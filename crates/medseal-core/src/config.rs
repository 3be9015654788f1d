//! Runtime configuration for the vault and identity key store.
//!
//! Every setting has a default from [`crate::defaults`] and can be overridden
//! through an environment variable. Unparseable values fall back to the
//! default with a warning instead of aborting startup.

use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::defaults;

/// Environment variable names.
pub const ENV_KEYSTORE_DIR: &str = "MEDSEAL_KEYSTORE_DIR";
pub const ENV_MAX_RECIPIENTS: &str = "MEDSEAL_MAX_RECIPIENTS";
pub const ENV_PARALLEL_WRAP_THRESHOLD: &str = "MEDSEAL_PARALLEL_WRAP_THRESHOLD";
pub const ENV_ENCRYPT_KEYSTORE: &str = "MEDSEAL_ENCRYPT_KEYSTORE";

/// Settings shared by the package builder, the vault and the key store.
///
/// # Example
/// ```
/// use medseal_core::config::VaultConfig;
///
/// let config = VaultConfig::default();
/// assert_eq!(config.max_recipients, 256);
/// assert!(config.encrypt_keystore);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Root directory of the file-backed key store.
    pub keystore_dir: PathBuf,

    /// Maximum number of recipients a single package may carry.
    pub max_recipients: usize,

    /// Recipient count at which key wrapping runs in parallel.
    pub parallel_wrap_threshold: usize,

    /// Encrypt file-backed key store entries with a passphrase.
    pub encrypt_keystore: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            keystore_dir: PathBuf::from(defaults::KEYSTORE_DIR),
            max_recipients: defaults::MAX_RECIPIENTS,
            parallel_wrap_threshold: defaults::PARALLEL_WRAP_THRESHOLD,
            encrypt_keystore: defaults::ENCRYPT_KEYSTORE,
        }
    }
}

impl VaultConfig {
    /// Constructs configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MEDSEAL_KEYSTORE_DIR` (default: `.medseal/keys`)
    /// - `MEDSEAL_MAX_RECIPIENTS` (default: 256, must be > 0)
    /// - `MEDSEAL_PARALLEL_WRAP_THRESHOLD` (default: 8, must be > 0)
    /// - `MEDSEAL_ENCRYPT_KEYSTORE` (default: true)
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            keystore_dir: env::var(ENV_KEYSTORE_DIR)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(base.keystore_dir),
            max_recipients: parse_positive_env(ENV_MAX_RECIPIENTS, base.max_recipients),
            parallel_wrap_threshold: parse_positive_env(
                ENV_PARALLEL_WRAP_THRESHOLD,
                base.parallel_wrap_threshold,
            ),
            encrypt_keystore: parse_bool_env(ENV_ENCRYPT_KEYSTORE, base.encrypt_keystore),
        }
    }
}

/// Parses a boolean environment variable with a default fallback.
///
/// Recognizes "true", "1", "yes", "on" (case-insensitive) as true.
/// Any other value or missing variable returns the default.
fn parse_bool_env(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|val| match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

/// Parses a strictly positive integer environment variable.
fn parse_positive_env(key: &str, default: usize) -> usize {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(var = key, value = %raw, default, "Invalid value, using default");
            default
        }
    }
}
