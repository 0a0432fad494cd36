use std::path::PathBuf;

use sos_backend::BackendError;
use thiserror::Error;

/// Errors surfaced by [`Store`](crate::Store) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Options rejected at open time.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// The file exists but is not a store envelope of the expected shape.
    #[error("invalid store file {}: {reason}", .path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    /// The file did not parse after removing obfuscation. A wrong
    /// passphrase and a corrupted file look the same here.
    #[error("can not decrypt store file {}; maybe the passphrase is wrong?", .path.display())]
    DecryptionFailed { path: PathBuf },

    /// The migration hook refused or failed to convert an older payload.
    #[error("migration from schema version {from} to {to} failed: {reason}")]
    MigrationFailed { from: u32, to: u32, reason: String },

    /// No in-memory value could be established.
    #[error("store value unavailable: {0}")]
    Access(String),

    /// An object-only operation met a non-object value.
    #[error("store value is not a JSON object")]
    NotAnObject,

    /// The in-memory value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage failure other than a missing file.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
