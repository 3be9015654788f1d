//! Envelope packages.
//!
//! # Build
//!
//! 1. Generate a random 256-bit data key
//! 2. Encrypt the payload once under the data key (AES-256-GCM)
//! 3. For each recipient, wrap the data key under the ECDH key shared by the
//!    sender and that recipient
//! 4. Stamp version, sender public key and creation time
//!
//! # Open
//!
//! 1. Reject unknown versions (`UnsupportedVersion`)
//! 2. Look up the caller's wrapped key
//! 3. Unwrap it with the caller's private key and the embedded sender key
//! 4. Decrypt the payload
//!
//! Steps 2 through 4 fail with a single `AccessDenied`.

mod package;
mod seal;

pub use package::{EnvelopePackage, WrappedKeys};
pub use seal::{build, build_json, build_with_options, open, open_json, BuildOptions};

pub(crate) use package::check_sealed_lengths;
pub(crate) use seal::{check_recipients, deny, recover_data_key, wrap_data_key};
