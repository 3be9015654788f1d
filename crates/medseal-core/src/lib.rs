//! # medseal-core
//!
//! Collaborator traits, shared defaults, and configuration for medseal.
//!
//! The envelope-encryption crate (`medseal-crypto`) never talks to a ledger,
//! a blob store, or a browser-style key store directly. It consumes the
//! traits defined here, so every boundary can be swapped for a real backend
//! or for the in-memory implementations in [`memory`].

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod memory;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::VaultConfig;
pub use error::{Error, Result};
pub use memory::{MemoryBlobStore, MemoryIdentityRegistry, MemoryKeyStore};
pub use traits::{BlobStore, ContentId, IdentityRegistry, KeyValueStore};
