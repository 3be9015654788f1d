//! Structured logging field names for medseal.
//!
//! Both crates use these names for `tracing` fields so log aggregation can
//! query the same keys across subsystems. Secret material (private keys,
//! data keys, shared keys, plaintext) is never logged under any field.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Persistence boundary failed in a way that needs operator attention |
//! | WARN  | Recoverable issue (bad config value, default applied) |
//! | INFO  | Identity lifecycle events (key pair created, published, deleted) |
//! | DEBUG | Package sealed/opened, recipient counts, content ids |
//! | TRACE | Per-recipient wrapping, per-file encryption |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "crypto", "identity", "vault"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "seal", "open", "get_or_create", "publish"
pub const OPERATION: &str = "op";

/// Account identifier owning a key pair.
pub const IDENTITY_ID: &str = "identity_id";

/// Recipient identifier inside a package.
pub const RECIPIENT_ID: &str = "recipient_id";

/// Content identifier returned by the blob store.
pub const CONTENT_ID: &str = "content_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of recipients a package is sealed for.
pub const RECIPIENT_COUNT: &str = "recipient_count";

/// Number of attached files in a secure record.
pub const FILE_COUNT: &str = "file_count";

/// Byte length of a plaintext payload.
pub const PAYLOAD_LEN: &str = "payload_len";

/// Package format version string.
pub const PACKAGE_VERSION: &str = "version";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Step at which an open was refused.
/// Examples: "no wrapped key", "sender key", "unwrap", "payload"
pub const STAGE: &str = "stage";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
