use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{BackendError, BackendResult};
use crate::traits::StorageBackend;

/// Local file-system backend.
///
/// Relative paths resolve against `root` when one is set, otherwise against
/// the process working directory. Writes go to a temporary sibling file that
/// is then renamed over the target, so readers see either the old or the new
/// contents, never a torn file.
#[derive(Clone, Debug, Default)]
pub struct FileBackend {
    root: Option<PathBuf>,
    fsync: bool,
}

impl FileBackend {
    /// Backend resolving relative paths against the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend resolving relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            fsync: false,
        }
    }

    /// `fsync` the temporary file before the rename.
    pub fn fsync(mut self, enabled: bool) -> Self {
        self.fsync = enabled;
        self
    }

    /// Absolute or working-directory-relative location of `path`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn write_atomic(target: &Path, bytes: &[u8], fsync: bool) -> std::io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    if fsync {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn read_all(&self, path: &Path) -> BackendResult<Vec<u8>> {
        let full = self.resolve(path);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| BackendError::from_io(&full, e))?;
        debug!(path = %full.display(), bytes = bytes.len(), "read store file");
        Ok(bytes)
    }

    async fn write_all(&self, path: &Path, bytes: &[u8]) -> BackendResult<()> {
        let full = self.resolve(path);
        let data = bytes.to_vec();
        let fsync = self.fsync;
        let target = full.clone();

        tokio::task::spawn_blocking(move || write_atomic(&target, &data, fsync))
            .await
            .map_err(|e| BackendError::Io {
                path: full.clone(),
                source: std::io::Error::from(e),
            })?
            .map_err(|e| BackendError::Io {
                path: full.clone(),
                source: e,
            })?;

        debug!(path = %full.display(), bytes = bytes.len(), "wrote store file");
        Ok(())
    }

    async fn exists(&self, path: &Path) -> BackendResult<bool> {
        let full = self.resolve(path);
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| BackendError::from_io(&full, e))
    }
}
