//! Identity key pairs: creation, persistence and publication.

mod file_store;
mod manager;
pub mod sealed;

pub use file_store::FileKeyStore;
pub use manager::IdentityKeyManager;
pub use sealed::{is_sealed_value, seal_value, unseal_value, MAGIC_SEALED_VALUE};
