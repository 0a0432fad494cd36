use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sos_codec::DEFAULT_SCHEMA_VERSION;

use crate::migrate::Migrate;

/// File used when neither a name nor an explicit path is given.
pub const DEFAULT_FILE_NAME: &str = "store.json";

/// Suffix appended to a lowercased store name.
pub const FILE_SUFFIX: &str = ".store.json";

/// Resolve the backing file path.
///
/// An explicit path wins over `<lowercased-name>.store.json`, which wins over
/// `store.json`. Empty strings count as absent.
pub fn resolve_store_path(name: Option<&str>, file_path: Option<&Path>) -> PathBuf {
    if let Some(path) = file_path.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }
    match name.filter(|n| !n.is_empty()) {
        Some(name) => PathBuf::from(format!("{}{}", name.to_lowercase(), FILE_SUFFIX)),
        None => PathBuf::from(DEFAULT_FILE_NAME),
    }
}

/// Open-time options for a [`Store`](crate::Store).
pub struct StoreOptions<T> {
    /// Logical name; derives `<name>.store.json` when no path is given.
    pub name: Option<String>,
    /// Value adopted when the backing file does not exist.
    pub default: Option<T>,
    /// Explicit backing file path.
    pub file_path: Option<PathBuf>,
    /// Passphrase enabling content obfuscation.
    pub encrypt: Option<String>,
    /// Trust the in-memory copy until `reload`.
    pub lazy_read: bool,
    /// Defer persisting until `sync`. Implies `lazy_read`.
    pub lazy_write: bool,
    /// Target schema version, at least 1.
    pub version: u32,
    /// Conversion for payloads written under an older version.
    pub migrate: Option<Arc<dyn Migrate>>,
}

impl<T> Default for StoreOptions<T> {
    fn default() -> Self {
        Self {
            name: None,
            default: None,
            file_path: None,
            encrypt: None,
            lazy_read: false,
            lazy_write: false,
            version: DEFAULT_SCHEMA_VERSION,
            migrate: None,
        }
    }
}

impl<T> StoreOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying everything `settings` describes.
    pub fn from_settings(settings: StoreSettings) -> Self {
        Self {
            name: settings.name,
            file_path: settings.file_path,
            encrypt: settings.encrypt,
            lazy_read: settings.lazy_read,
            lazy_write: settings.lazy_write,
            version: settings.version.unwrap_or(DEFAULT_SCHEMA_VERSION),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn encrypt(mut self, passphrase: impl Into<String>) -> Self {
        self.encrypt = Some(passphrase.into());
        self
    }

    pub fn lazy_read(mut self, enabled: bool) -> Self {
        self.lazy_read = enabled;
        self
    }

    pub fn lazy_write(mut self, enabled: bool) -> Self {
        self.lazy_write = enabled;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn migrate<M: Migrate + 'static>(mut self, hook: M) -> Self {
        self.migrate = Some(Arc::new(hook));
        self
    }

    /// The path these options resolve to.
    pub fn store_file_path(&self) -> PathBuf {
        resolve_store_path(self.name.as_deref(), self.file_path.as_deref())
    }
}

impl<T> fmt::Debug for StoreOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("name", &self.name)
            .field("has_default", &self.default.is_some())
            .field("file_path", &self.file_path)
            .field("encrypted", &self.encrypt.is_some())
            .field("lazy_read", &self.lazy_read)
            .field("lazy_write", &self.lazy_write)
            .field("version", &self.version)
            .field("has_migrate", &self.migrate.is_some())
            .finish()
    }
}

/// Serializable subset of [`StoreOptions`], suitable for config files.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    pub name: Option<String>,
    pub file_path: Option<PathBuf>,
    pub encrypt: Option<String>,
    pub lazy_read: bool,
    pub lazy_write: bool,
    pub version: Option<u32>,
}

impl StoreSettings {
    /// Overlay `other` onto `self`; set fields in `other` win.
    pub fn merge(self, other: StoreSettings) -> StoreSettings {
        StoreSettings {
            name: other.name.or(self.name),
            file_path: other.file_path.or(self.file_path),
            encrypt: other.encrypt.or(self.encrypt),
            lazy_read: self.lazy_read || other.lazy_read,
            lazy_write: self.lazy_write || other.lazy_write,
            version: other.version.or(self.version),
        }
    }
}
