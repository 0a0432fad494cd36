use std::path::Path;

use async_trait::async_trait;

use crate::error::{BackendError, BackendResult};

/// Outcome of a read that tolerates an absent file.
///
/// Together with `Err` this gives the three cases the store's load routine
/// branches on: bytes, nothing there, or a real failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(Vec<u8>),
    Missing,
}

/// Whole-file byte storage.
///
/// Implementations must:
/// - report an absent path as [`BackendError::NotFound`];
/// - replace the file atomically from the caller's point of view on write;
/// - propagate every other failure as [`BackendError::Io`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the full contents of `path`.
    async fn read_all(&self, path: &Path) -> BackendResult<Vec<u8>>;

    /// Create or overwrite `path` with `bytes`.
    async fn write_all(&self, path: &Path, bytes: &[u8]) -> BackendResult<()>;

    /// Read `path`, folding `NotFound` into [`ReadOutcome::Missing`].
    async fn read_if_exists(&self, path: &Path) -> BackendResult<ReadOutcome> {
        match self.read_all(path).await {
            Ok(bytes) => Ok(ReadOutcome::Found(bytes)),
            Err(BackendError::NotFound(_)) => Ok(ReadOutcome::Missing),
            Err(e) => Err(e),
        }
    }

    /// Check whether `path` exists.
    async fn exists(&self, path: &Path) -> BackendResult<bool> {
        Ok(matches!(self.read_if_exists(path).await?, ReadOutcome::Found(_)))
    }
}
