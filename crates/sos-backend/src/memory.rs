use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{BackendError, BackendResult};
use crate::traits::StorageBackend;

#[derive(Default)]
struct Shared {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
    read_only: AtomicBool,
    writes: AtomicUsize,
}

/// In-memory, HashMap-based backend.
///
/// Intended for tests and embedding. Clones share the same contents, so
/// several stores opened over clones of one backend behave like stores
/// sharing a directory.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    shared: Arc<Shared>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail with a permission error.
    pub fn set_read_only(&self, read_only: bool) {
        self.shared.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    /// Raw contents of `path`, if present.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files().get(path.as_ref()).cloned()
    }

    /// Place raw bytes at `path`, bypassing the read-only switch.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files_mut().insert(path.into(), bytes.into());
    }

    /// Sorted list of all stored paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn files(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.shared.files.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn files_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.shared.files.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn read_all(&self, path: &Path) -> BackendResult<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| BackendError::NotFound(path.to_path_buf()))
    }

    async fn write_all(&self, path: &Path, bytes: &[u8]) -> BackendResult<()> {
        if self.shared.read_only.load(Ordering::SeqCst) {
            return Err(BackendError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "backend is read-only"),
            });
        }
        self.files_mut().insert(path.to_path_buf(), bytes.to_vec());
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> BackendResult<bool> {
        Ok(self.files().contains_key(path))
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("file_count", &self.files().len())
            .finish()
    }
}
