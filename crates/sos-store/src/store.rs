use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use sos_backend::{FileBackend, ReadOutcome, StorageBackend};
use sos_codec::{CodecError, DocumentCodec, Envelope};
use sos_crypto::ByteTransform;
use tracing::{debug, info, warn};

use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::migrate::Migrate;
use crate::state::CacheState;

/// Boxed future returned by asynchronous accessors and mutators.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single-file document store holding one value of type `T`.
///
/// Every operation runs a load step, the caller's closure, and (for writes)
/// a persist step:
///
/// - Without `lazy_read`, each operation reloads the file first, so stores
///   sharing a file see each other's last persisted write.
/// - With `lazy_read`, the first load is cached until [`reload`](Self::reload).
/// - With `lazy_write`, writes stay in memory until [`sync`](Self::sync).
///
/// Closures mutate a working copy. The copy replaces the in-memory value only
/// after it has been persisted (or immediately, under `lazy_write`), so a
/// failed operation leaves the previous value in place.
///
/// There is no locking. Two stores writing the same file race, and the last
/// writer wins; sequential operations are consistent, concurrent ones can
/// lose updates.
pub struct Store<T> {
    name: Option<String>,
    path: PathBuf,
    default: Option<T>,
    transform: Option<ByteTransform>,
    lazy_read: bool,
    lazy_write: bool,
    version: u32,
    migrate: Option<Arc<dyn Migrate>>,
    backend: Arc<dyn StorageBackend>,
    value: Option<T>,
    state: CacheState,
}

impl<T> Store<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Open a store on the local file system. No file is touched until the
    /// first operation.
    pub fn open(options: StoreOptions<T>) -> StoreResult<Self> {
        Self::open_with_backend(options, FileBackend::new())
    }

    /// Open `<name>.store.json` with otherwise default options.
    pub fn open_named(name: &str) -> StoreResult<Self> {
        Self::open(StoreOptions::new().name(name))
    }

    /// Open a store over a custom backend.
    pub fn open_with_backend<B>(options: StoreOptions<T>, backend: B) -> StoreResult<Self>
    where
        B: StorageBackend + 'static,
    {
        Self::open_with_shared_backend(options, Arc::new(backend))
    }

    /// Open a store over a backend shared with other stores.
    pub fn open_with_shared_backend(
        options: StoreOptions<T>,
        backend: Arc<dyn StorageBackend>,
    ) -> StoreResult<Self> {
        if options.version == 0 {
            return Err(StoreError::InvalidConfig(
                "schema version must be at least 1".into(),
            ));
        }
        let transform = options
            .encrypt
            .as_deref()
            .map(ByteTransform::new)
            .transpose()
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;

        let path = options.store_file_path();
        debug!(
            path = %path.display(),
            version = options.version,
            lazy_read = options.lazy_read || options.lazy_write,
            lazy_write = options.lazy_write,
            encrypted = transform.is_some(),
            "opened store"
        );

        Ok(Self {
            name: options.name,
            path,
            default: options.default,
            transform,
            lazy_read: options.lazy_read || options.lazy_write,
            lazy_write: options.lazy_write,
            version: options.version,
            migrate: options.migrate,
            backend,
            value: None,
            state: CacheState::default(),
        })
    }

    // ---- Accessors ----

    /// Path of the backing file, as handed to the backend.
    pub fn store_file_path(&self) -> &Path {
        &self.path
    }

    /// Target schema version.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_encrypted(&self) -> bool {
        self.transform.is_some()
    }

    /// Whether writes are waiting for [`sync`](Self::sync).
    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    /// Whether a value has been established since opening.
    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    // ---- Read contract ----

    /// Current value.
    pub async fn read(&mut self) -> StoreResult<T> {
        self.read_with(T::clone).await
    }

    /// Run `accessor` against the current value.
    pub async fn read_with<F, R>(&mut self, accessor: F) -> StoreResult<R>
    where
        F: FnOnce(&T) -> R,
    {
        self.ensure_loaded().await?;
        Ok(accessor(self.current()?))
    }

    /// Run an asynchronous `accessor` against the current value and wait
    /// for it to settle.
    pub async fn read_with_async<F, R>(&mut self, accessor: F) -> StoreResult<R>
    where
        F: for<'a> FnOnce(&'a T) -> BoxFuture<'a, R>,
    {
        self.ensure_loaded().await?;
        Ok(accessor(self.current()?).await)
    }

    /// Alias for [`read`](Self::read).
    pub async fn get(&mut self) -> StoreResult<T> {
        self.read().await
    }

    // ---- Write contract ----

    /// Mutate the value in place, then persist unless `lazy_write` defers it.
    pub async fn write<F, R>(&mut self, mutator: F) -> StoreResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        self.ensure_loaded().await?;
        let mut draft = self.current()?.clone();
        let out = mutator(&mut draft);
        self.commit(draft).await?;
        Ok(out)
    }

    /// Like [`write`](Self::write), for mutators that can fail. An `Err`
    /// from the mutator discards the draft; nothing is persisted and the
    /// cached value is left as it was.
    pub async fn try_write<F, R, E>(&mut self, mutator: F) -> StoreResult<Result<R, E>>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        self.ensure_loaded().await?;
        let mut draft = self.current()?.clone();
        match mutator(&mut draft) {
            Ok(out) => {
                self.commit(draft).await?;
                Ok(Ok(out))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    /// Asynchronous form of [`write`](Self::write). The mutator settles
    /// before anything is persisted.
    pub async fn write_async<F, R>(&mut self, mutator: F) -> StoreResult<R>
    where
        F: for<'a> FnOnce(&'a mut T) -> BoxFuture<'a, R>,
    {
        self.ensure_loaded().await?;
        let mut draft = self.current()?.clone();
        let out = mutator(&mut draft).await;
        self.commit(draft).await?;
        Ok(out)
    }

    /// Replace the whole value.
    pub async fn set(&mut self, value: T) -> StoreResult<()> {
        self.write(move |data| *data = value).await
    }

    /// Add every top-level key of `defaults` missing from the current value,
    /// then persist. Existing keys keep their values. Both sides must
    /// serialize to JSON objects.
    pub async fn assure(&mut self, defaults: &T) -> StoreResult<()> {
        let Value::Object(defaults) = to_json(defaults)? else {
            return Err(StoreError::NotAnObject);
        };

        self.ensure_loaded().await?;
        let mut current = to_json(self.current()?)?;
        let Value::Object(fields) = &mut current else {
            return Err(StoreError::NotAnObject);
        };
        for (key, value) in defaults {
            fields.entry(key).or_insert(value);
        }

        let draft = self.parse_payload(current)?;
        self.commit(draft).await
    }

    // ---- Cache control ----

    /// Reload from disk, ignoring `lazy_read`. Unsynced lazy writes are
    /// discarded.
    pub async fn reload(&mut self) -> StoreResult<()> {
        if self.state.is_dirty() {
            warn!(path = %self.path.display(), "reload discards unsynced changes");
        }
        self.load().await
    }

    /// Persist the current value, ignoring `lazy_write`.
    pub async fn sync(&mut self) -> StoreResult<()> {
        self.ensure_loaded().await?;
        self.persist(self.current()?).await?;
        self.state.on_synced();
        Ok(())
    }

    // ---- Internals ----

    fn current(&self) -> StoreResult<&T> {
        self.value
            .as_ref()
            .ok_or_else(|| StoreError::Access("no value has been loaded".into()))
    }

    async fn ensure_loaded(&mut self) -> StoreResult<()> {
        if self.state.needs_load(self.lazy_read) {
            self.load().await?;
        }
        Ok(())
    }

    async fn load(&mut self) -> StoreResult<()> {
        let value = match self.backend.read_if_exists(&self.path).await? {
            ReadOutcome::Missing => {
                debug!(path = %self.path.display(), "no store file; adopting default");
                self.initial_value()?
            }
            ReadOutcome::Found(bytes) => {
                let envelope = self.decode(bytes)?;
                self.adopt(envelope).await?
            }
        };
        self.value = Some(value);
        self.state.on_loaded();
        Ok(())
    }

    async fn commit(&mut self, draft: T) -> StoreResult<()> {
        let persisted = !self.lazy_write;
        if persisted {
            self.persist(&draft).await?;
        }
        self.value = Some(draft);
        self.state.on_written(persisted);
        Ok(())
    }

    fn initial_value(&self) -> StoreResult<T> {
        if let Some(default) = &self.default {
            return Ok(default.clone());
        }
        serde_json::from_value(Value::Object(Map::new())).map_err(|e| {
            StoreError::Access(format!(
                "no default configured and an empty document does not fit the value type: {e}"
            ))
        })
    }

    fn decode(&self, mut bytes: Vec<u8>) -> StoreResult<Envelope> {
        if let Some(transform) = &self.transform {
            transform.decode_in_place(&mut bytes);
        }
        DocumentCodec::decode(&bytes).map_err(|e| match e {
            // Parse failures under a passphrase are reported as a wrong
            // passphrase, which also covers corrupted obfuscated files.
            CodecError::MalformedPayload(_) if self.transform.is_some() => {
                StoreError::DecryptionFailed {
                    path: self.path.clone(),
                }
            }
            CodecError::MalformedPayload(reason) | CodecError::InvalidFormat(reason) => {
                StoreError::InvalidFormat {
                    path: self.path.clone(),
                    reason,
                }
            }
            CodecError::Serialization(reason) => StoreError::Serialization(reason),
        })
    }

    async fn adopt(&self, envelope: Envelope) -> StoreResult<T> {
        let target = self.version;
        let from = envelope.version;

        if envelope.is_older_than(target) {
            if let Some(hook) = &self.migrate {
                let payload = hook
                    .migrate(envelope.data, from)
                    .await
                    .map_err(|e| StoreError::MigrationFailed {
                        from,
                        to: target,
                        reason: format!("{e:#}"),
                    })?;
                let value = self.parse_payload(payload)?;
                self.persist(&value).await?;
                info!(path = %self.path.display(), from, to = target, "migrated store");
                return Ok(value);
            }
            debug!(from, to = target, "older schema without migration hook; adopting as is");
        } else if from > target {
            warn!(
                path = %self.path.display(),
                stored = from,
                target,
                "store file has a newer schema version; adopting as is"
            );
        }

        self.parse_payload(envelope.data)
    }

    fn parse_payload(&self, payload: Value) -> StoreResult<T> {
        serde_json::from_value(payload).map_err(|e| StoreError::InvalidFormat {
            path: self.path.clone(),
            reason: format!("payload does not fit the value type: {e}"),
        })
    }

    async fn persist(&self, value: &T) -> StoreResult<()> {
        let mut bytes = DocumentCodec::encode(self.version, value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(transform) = &self.transform {
            transform.encode_in_place(&mut bytes);
        }
        self.backend.write_all(&self.path, &bytes).await?;
        debug!(
            path = %self.path.display(),
            version = self.version,
            bytes = bytes.len(),
            "persisted store"
        );
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("encrypted", &self.transform.is_some())
            .field("lazy_read", &self.lazy_read)
            .field("lazy_write", &self.lazy_write)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use sos_backend::InMemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
    }

    fn temp_store(dir: &Path, options: StoreOptions<Value>) -> Store<Value> {
        Store::open_with_backend(options, FileBackend::with_root(dir)).unwrap()
    }

    fn memory_store(backend: &InMemoryBackend, options: StoreOptions<Value>) -> Store<Value> {
        Store::open_with_backend(options, backend.clone()).unwrap()
    }

    fn john() -> Value {
        json!({
            "name": "John",
            "surname": "Doe",
            "age": 42,
            "children": ["Peter", "Jill", "Mary"],
            "job": "Freelancer"
        })
    }

    // -----------------------------------------------------------------------
    // Defaults and basic read/write
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn missing_file_reads_as_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = temp_store(dir.path(), StoreOptions::new());

        assert_eq!(store.read().await.unwrap(), json!({}));
        assert!(!dir.path().join("store.json").exists());
    }

    #[tokio::test]
    async fn configured_default_is_adopted() {
        let dir = tempfile::tempdir().unwrap();
        let default = json!({"name": "John", "array": [1, 2, 3], "object": {"foo": "bar"}});
        let mut store = temp_store(dir.path(), StoreOptions::new().default_value(default.clone()));

        assert_eq!(store.read().await.unwrap(), default);
    }

    #[tokio::test]
    async fn default_becomes_durable_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let options = || StoreOptions::new().default_value(json!({"todos": []}));
        let mut store = temp_store(dir.path(), options());

        store
            .write(|data| data["todos"].as_array_mut().unwrap().push(json!("milk")))
            .await
            .unwrap();
        assert!(dir.path().join("store.json").exists());

        let mut other = temp_store(dir.path(), StoreOptions::new());
        assert_eq!(other.read().await.unwrap(), json!({"todos": ["milk"]}));
    }

    #[tokio::test]
    async fn set_then_get_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = temp_store(dir.path(), StoreOptions::new());
        first.set(json!({"name": "John"})).await.unwrap();
        assert_eq!(first.get().await.unwrap(), json!({"name": "John"}));

        let mut second = temp_store(dir.path(), StoreOptions::new());
        assert_eq!(second.get().await.unwrap(), json!({"name": "John"}));
    }

    #[tokio::test]
    async fn written_file_is_an_envelope() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new());
        store.write(|data| data["value"] = json!(42)).await.unwrap();

        let raw: Value = serde_json::from_slice(&backend.get("store.json").unwrap()).unwrap();
        assert_eq!(
            raw,
            json!({"isStoreFile": true, "type": "v1", "version": 1, "data": {"value": 42}})
        );
    }

    #[tokio::test]
    async fn read_with_and_write_return_closure_results() {
        let backend = InMemoryBackend::new();
        let mut store: Store<Counter> = Store::open_with_backend(
            StoreOptions::new().default_value(Counter { count: 0 }),
            backend.clone(),
        )
        .unwrap();

        let after = store
            .write(|c| {
                c.count += 1;
                c.count
            })
            .await
            .unwrap();
        assert_eq!(after, 1);
        assert_eq!(store.read_with(|c| c.count * 10).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn typed_store_without_default_reports_access_error() {
        let backend = InMemoryBackend::new();
        let mut store: Store<Counter> =
            Store::open_with_backend(StoreOptions::new(), backend).unwrap();

        let err = store.read().await.unwrap_err();
        assert!(matches!(err, StoreError::Access(_)));
        assert!(!store.is_loaded());
    }

    #[tokio::test]
    async fn scalar_values_are_stored() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new());
        store.set(json!(true)).await.unwrap();

        let mut other = memory_store(&backend, StoreOptions::new());
        assert_eq!(other.read().await.unwrap(), json!(true));
    }

    // -----------------------------------------------------------------------
    // Async accessors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn async_mutator_settles_before_persist() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new());

        store
            .write_async(|data| {
                Box::pin(async move {
                    tokio::task::yield_now().await;
                    data["entries"] = json!(["lorem"]);
                })
            })
            .await
            .unwrap();

        let mut other = memory_store(&backend, StoreOptions::new());
        assert_eq!(other.read().await.unwrap(), json!({"entries": ["lorem"]}));
    }

    #[tokio::test]
    async fn async_accessor_sees_current_value() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new().default_value(json!({"n": 5})));

        let n = store
            .read_with_async(|data| {
                Box::pin(async move {
                    tokio::task::yield_now().await;
                    data["n"].as_u64().unwrap()
                })
            })
            .await
            .unwrap();
        assert_eq!(n, 5);
    }

    // -----------------------------------------------------------------------
    // Path resolution
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn store_file_names() {
        let dir = tempfile::tempdir().unwrap();

        let mut plain = temp_store(dir.path(), StoreOptions::new());
        assert_eq!(plain.store_file_path(), Path::new("store.json"));
        plain.set(json!(true)).await.unwrap();
        assert!(dir.path().join("store.json").exists());

        let mut named = temp_store(dir.path(), StoreOptions::new().name("counter"));
        assert_eq!(named.store_file_path(), Path::new("counter.store.json"));
        named.set(json!(true)).await.unwrap();
        assert!(dir.path().join("counter.store.json").exists());

        let mut custom = temp_store(
            dir.path(),
            StoreOptions::new().file_path("custom-file.any.store.json"),
        );
        assert_eq!(custom.store_file_path(), Path::new("custom-file.any.store.json"));
        custom.set(json!(true)).await.unwrap();
        assert!(dir.path().join("custom-file.any.store.json").exists());

        let mut both = temp_store(
            dir.path(),
            StoreOptions::new()
                .name("books")
                .file_path("custom-book-file.store.json"),
        );
        assert_eq!(both.store_file_path(), Path::new("custom-book-file.store.json"));
        both.set(json!(true)).await.unwrap();
        assert!(dir.path().join("custom-book-file.store.json").exists());
        assert!(!dir.path().join("books.store.json").exists());
    }

    #[test]
    fn open_named_derives_path() {
        let store = Store::<Value>::open_named("Counter").unwrap();
        assert_eq!(store.store_file_path(), Path::new("counter.store.json"));
        assert_eq!(store.name(), Some("Counter"));
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    #[test]
    fn empty_passphrase_is_rejected() {
        let err = Store::<Value>::open(StoreOptions::new().encrypt("")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn zero_version_is_rejected() {
        let err = Store::<Value>::open(StoreOptions::new().version(0)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[test]
    fn version_defaults_to_one() {
        let store = Store::<Value>::open(StoreOptions::new()).unwrap();
        assert_eq!(store.version(), 1);
        let store = Store::<Value>::open(StoreOptions::new().version(2)).unwrap();
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn open_touches_nothing() {
        let backend = InMemoryBackend::new();
        let store = memory_store(&backend, StoreOptions::new());
        assert!(!store.is_loaded());
        assert!(backend.paths().is_empty());
    }

    // -----------------------------------------------------------------------
    // Obfuscation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn encrypted_file_hides_content() {
        let dir = tempfile::tempdir().unwrap();
        let options = || StoreOptions::new().encrypt("secret-passphrase");

        let mut first = temp_store(dir.path(), options());
        assert!(first.is_encrypted());
        first.write(|data| data["person"] = john()).await.unwrap();

        let raw = std::fs::read(dir.path().join("store.json")).unwrap();
        let text = String::from_utf8_lossy(&raw);
        for marker in ["John", "Doe", "Peter", "Jill", "Mary", "isStoreFile"] {
            assert!(!text.contains(marker), "{marker} leaked into the file");
        }

        let mut second = temp_store(dir.path(), options());
        assert_eq!(second.read_with(|d| d["person"].clone()).await.unwrap(), john());
    }

    #[tokio::test]
    async fn wrong_passphrase_fails_to_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = temp_store(dir.path(), StoreOptions::new().encrypt("secret-passphrase"));
        writer.write(|data| data["person"] = john()).await.unwrap();

        let mut reader = temp_store(dir.path(), StoreOptions::new().encrypt("invalid-passphrase"));
        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, StoreError::DecryptionFailed { .. }));
        assert!(err.to_string().contains("passphrase"));
    }

    #[tokio::test]
    async fn encrypted_file_without_passphrase_is_invalid_format() {
        let backend = InMemoryBackend::new();
        let mut writer = memory_store(&backend, StoreOptions::new().encrypt("secret-passphrase"));
        writer.set(john()).await.unwrap();

        let mut reader = memory_store(&backend, StoreOptions::new());
        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
    }

    // -----------------------------------------------------------------------
    // Format errors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn foreign_json_is_invalid_format() {
        let backend = InMemoryBackend::new();
        backend.insert("store.json", br#"{"name":"John"}"#.to_vec());

        let mut store = memory_store(&backend, StoreOptions::new());
        let err = store.read().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
    }

    #[tokio::test]
    async fn payload_of_wrong_shape_is_invalid_format() {
        let backend = InMemoryBackend::new();
        backend.insert(
            "store.json",
            br#"{"isStoreFile":true,"type":"v1","version":1,"data":{"count":"many"}}"#.to_vec(),
        );

        let mut store: Store<Counter> =
            Store::open_with_backend(StoreOptions::new(), backend).unwrap();
        let err = store.read().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat { .. }));
    }

    #[tokio::test]
    async fn backend_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("store.json")).unwrap();

        let mut store = temp_store(dir.path(), StoreOptions::new());
        let err = store.read().await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    // -----------------------------------------------------------------------
    // Failure atomicity
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn failed_persist_keeps_previous_value() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new().lazy_read(true));
        store.set(json!({"count": 1})).await.unwrap();

        backend.set_read_only(true);
        let err = store.write(|data| data["count"] = json!(2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert_eq!(store.read().await.unwrap(), json!({"count": 1}));
    }

    #[tokio::test]
    async fn failed_mutator_writes_nothing() {
        let backend = InMemoryBackend::new();
        backend.insert(
            "store.json",
            br#"{"isStoreFile":true,"type":"v1","version":1,"data":{"value":"text"}}"#.to_vec(),
        );
        let mut store = memory_store(&backend, StoreOptions::new().version(2).lazy_read(true));

        let result = store
            .try_write(|data| {
                data["value"] = json!(0);
                Err::<(), _>("value is not a number")
            })
            .await
            .unwrap();
        assert_eq!(result, Err("value is not a number"));
        assert_eq!(backend.write_count(), 0);
        assert!(!store.is_dirty());
        assert_eq!(store.read().await.unwrap(), json!({"value": "text"}));

        let stored = DocumentCodec::decode(&backend.get("store.json").unwrap()).unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn successful_try_write_commits() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new());

        let out = store
            .try_write(|data| {
                data["count"] = json!(1);
                Ok::<_, String>(1)
            })
            .await
            .unwrap();
        assert_eq!(out, Ok(1));
        assert_eq!(backend.write_count(), 1);
        assert_eq!(store.read().await.unwrap(), json!({"count": 1}));
    }

    // -----------------------------------------------------------------------
    // Migration
    // -----------------------------------------------------------------------

    fn value_to_counter(old: Value, version: u32) -> anyhow::Result<Value> {
        anyhow::ensure!(version == 1, "can not migrate from unknown version {version}");
        Ok(json!({ "counter": old["value"] }))
    }

    #[tokio::test]
    async fn migration_upgrades_old_payload() {
        let backend = InMemoryBackend::new();
        let mut v1 = memory_store(&backend, StoreOptions::new());
        assert_eq!(v1.version(), 1);
        v1.write(|data| data["value"] = json!(42)).await.unwrap();

        let mut v2 = memory_store(
            &backend,
            StoreOptions::new().version(2).migrate(value_to_counter),
        );
        assert_eq!(v2.version(), 2);
        assert_eq!(v2.read().await.unwrap(), json!({"counter": 42}));

        // The migrated value is written back under the new version.
        let raw = DocumentCodec::decode(&backend.get("store.json").unwrap()).unwrap();
        assert_eq!(raw.version, 2);
        assert_eq!(raw.data, json!({"counter": 42}));
    }

    #[tokio::test]
    async fn migration_persists_even_with_lazy_write() {
        let backend = InMemoryBackend::new();
        memory_store(&backend, StoreOptions::new())
            .set(json!({"value": 7}))
            .await
            .unwrap();

        let mut v2 = memory_store(
            &backend,
            StoreOptions::new()
                .version(2)
                .lazy_write(true)
                .migrate(value_to_counter),
        );
        v2.read().await.unwrap();
        assert!(!v2.is_dirty());

        let raw = DocumentCodec::decode(&backend.get("store.json").unwrap()).unwrap();
        assert_eq!(raw.version, 2);
    }

    #[tokio::test]
    async fn migration_into_typed_store() {
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        struct NewModel {
            counter: u32,
        }

        let backend = InMemoryBackend::new();
        memory_store(&backend, StoreOptions::new())
            .set(json!({"value": 42}))
            .await
            .unwrap();

        let mut store: Store<NewModel> = Store::open_with_backend(
            StoreOptions::new().version(2).migrate(value_to_counter),
            backend,
        )
        .unwrap();
        assert_eq!(store.read().await.unwrap(), NewModel { counter: 42 });
    }

    #[tokio::test]
    async fn missing_hook_passes_old_payload_through() {
        let backend = InMemoryBackend::new();
        memory_store(&backend, StoreOptions::new())
            .write(|data| data["value"] = json!(42))
            .await
            .unwrap();

        let mut v2 = memory_store(&backend, StoreOptions::new().version(2));
        assert_eq!(v2.read().await.unwrap(), json!({"value": 42}));

        // Nothing was rewritten.
        let raw = DocumentCodec::decode(&backend.get("store.json").unwrap()).unwrap();
        assert_eq!(raw.version, 1);
    }

    #[tokio::test]
    async fn hook_not_called_for_same_version() {
        let backend = InMemoryBackend::new();
        memory_store(&backend, StoreOptions::new().version(2))
            .write(|data| data["value"] = json!(42))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let hook = move |old: Value, _version: u32| -> anyhow::Result<Value> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(old)
        };

        let mut store = memory_store(&backend, StoreOptions::new().version(2).migrate(hook));
        assert_eq!(store.read().await.unwrap(), json!({"value": 42}));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hook_not_called_for_newer_file() {
        let backend = InMemoryBackend::new();
        memory_store(&backend, StoreOptions::new().version(3))
            .set(json!({"value": 1}))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let hook = move |old: Value, _version: u32| -> anyhow::Result<Value> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(old)
        };

        let mut store = memory_store(&backend, StoreOptions::new().version(2).migrate(hook));
        assert_eq!(store.read().await.unwrap(), json!({"value": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_hook_surfaces_migration_error() {
        let backend = InMemoryBackend::new();
        backend.insert(
            "store.json",
            br#"{"isStoreFile":true,"type":"v1","version":5,"data":{}}"#.to_vec(),
        );
        let before = backend.get("store.json").unwrap();

        let mut store = memory_store(
            &backend,
            StoreOptions::new().version(6).migrate(value_to_counter),
        );
        let err = store.read().await.unwrap_err();
        match err {
            StoreError::MigrationFailed { from, to, reason } => {
                assert_eq!((from, to), (5, 6));
                assert!(reason.contains("unknown version"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.get("store.json").unwrap(), before);
        assert!(!store.is_loaded());
    }

    #[tokio::test]
    async fn async_migration_hook() {
        struct Slow;

        #[async_trait::async_trait]
        impl Migrate for Slow {
            async fn migrate(&self, old: Value, _from: u32) -> anyhow::Result<Value> {
                tokio::task::yield_now().await;
                Ok(json!({ "entries": old["lines"] }))
            }
        }

        let backend = InMemoryBackend::new();
        memory_store(&backend, StoreOptions::new())
            .set(json!({"lines": ["a", "b"]}))
            .await
            .unwrap();

        let mut store = memory_store(&backend, StoreOptions::new().version(2).migrate(Slow));
        assert_eq!(store.read().await.unwrap(), json!({"entries": ["a", "b"]}));
    }

    // -----------------------------------------------------------------------
    // Lazy read / lazy write
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn lazy_read_isolates_until_reload() {
        let backend = InMemoryBackend::new();
        let lazy = || StoreOptions::new().lazy_read(true);

        let mut a = memory_store(&backend, lazy());
        let mut b = memory_store(&backend, lazy());
        assert_eq!(b.read().await.unwrap(), json!({}));

        a.set(json!({"name": "John"})).await.unwrap();
        assert_eq!(b.read().await.unwrap(), json!({}));

        b.reload().await.unwrap();
        assert_eq!(b.read().await.unwrap(), json!({"name": "John"}));

        b.write(|data| data["age"] = json!(42)).await.unwrap();
        assert_eq!(a.read().await.unwrap(), json!({"name": "John"}));
        a.reload().await.unwrap();
        assert_eq!(a.read().await.unwrap(), json!({"name": "John", "age": 42}));
    }

    #[tokio::test]
    async fn lazy_read_skips_disk_after_first_load() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new().lazy_read(true));
        store.read().await.unwrap();

        backend.insert("store.json", b"garbage".to_vec());
        assert_eq!(store.read().await.unwrap(), json!({}));
        assert!(store.reload().await.is_err());
    }

    #[tokio::test]
    async fn lazy_write_defers_until_sync() {
        let backend = InMemoryBackend::new();
        let mut writer = memory_store(&backend, StoreOptions::new().lazy_write(true));
        writer.set(json!({"name": "John"})).await.unwrap();
        assert_eq!(writer.read().await.unwrap(), json!({"name": "John"}));
        assert!(writer.is_dirty());
        assert_eq!(backend.write_count(), 0);

        let mut reader = memory_store(&backend, StoreOptions::new());
        assert_eq!(reader.read().await.unwrap(), json!({}));

        writer.sync().await.unwrap();
        assert!(!writer.is_dirty());
        assert_eq!(reader.read().await.unwrap(), json!({"name": "John"}));
    }

    #[tokio::test]
    async fn lazy_write_batches_many_writes() {
        let backend = InMemoryBackend::new();
        let mut diary = memory_store(
            &backend,
            StoreOptions::new()
                .name("diary")
                .encrypt("secret-phrase")
                .lazy_write(true)
                .default_value(json!({"entries": []})),
        );

        for _ in 0..100 {
            diary
                .write(|data| data["entries"].as_array_mut().unwrap().push(json!("lorem ipsum")))
                .await
                .unwrap();
        }
        assert_eq!(backend.write_count(), 0);
        diary.sync().await.unwrap();
        assert_eq!(backend.write_count(), 1);

        let mut reopened = memory_store(
            &backend,
            StoreOptions::new().name("diary").encrypt("secret-phrase"),
        );
        let len = reopened
            .read_with(|data| data["entries"].as_array().map(Vec::len))
            .await
            .unwrap();
        assert_eq!(len, Some(100));
    }

    #[tokio::test]
    async fn reload_discards_unsynced_writes() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new().lazy_write(true));
        store.set(json!({"draft": true})).await.unwrap();

        store.reload().await.unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.read().await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn sync_without_prior_access_writes_default() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new().default_value(json!({"count": 0})));
        store.sync().await.unwrap();

        let raw = DocumentCodec::decode(&backend.get("store.json").unwrap()).unwrap();
        assert_eq!(raw.data, json!({"count": 0}));
    }

    // -----------------------------------------------------------------------
    // Cross-instance consistency
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sequential_instances_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = temp_store(dir.path(), StoreOptions::new());
        let mut b = temp_store(dir.path(), StoreOptions::new());

        a.set(json!({"propA": "First"})).await.unwrap();
        assert_eq!(b.read_with(|d| d["propA"].clone()).await.unwrap(), json!("First"));
        b.write(|d| d["propB"] = json!("Second")).await.unwrap();

        let both = json!({"propA": "First", "propB": "Second"});
        assert_eq!(a.read().await.unwrap(), both);
        assert_eq!(b.read().await.unwrap(), both);
    }

    #[tokio::test]
    async fn interleaved_counters_stay_consistent() {
        let backend = InMemoryBackend::new();
        let options = || StoreOptions::new().default_value(Counter { count: 0 });
        let mut stores: Vec<Store<Counter>> = (0..2)
            .map(|_| Store::open_with_backend(options(), backend.clone()).unwrap())
            .collect();

        for i in 1..=100u32 {
            let writer = (i as usize * 7) % 2;
            let reader = (i as usize * 3 / 2) % 2;
            stores[writer].write(|c| c.count += 1).await.unwrap();
            assert_eq!(stores[reader].read().await.unwrap().count, i);
        }
        for store in &mut stores {
            assert_eq!(store.read().await.unwrap(), Counter { count: 100 });
        }
    }

    // -----------------------------------------------------------------------
    // Assure
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn assure_fills_only_missing_keys() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new());
        store.set(json!({"name": "John", "nickname": null})).await.unwrap();

        store
            .assure(&json!({"name": "Jane", "nickname": "JJ", "todos": []}))
            .await
            .unwrap();
        assert_eq!(
            store.read().await.unwrap(),
            json!({"name": "John", "nickname": null, "todos": []})
        );
    }

    #[tokio::test]
    async fn assure_rejects_non_objects() {
        let backend = InMemoryBackend::new();
        let mut store = memory_store(&backend, StoreOptions::new());
        assert!(matches!(
            store.assure(&json!([1, 2])).await.unwrap_err(),
            StoreError::NotAnObject
        ));

        store.set(json!(3)).await.unwrap();
        assert!(matches!(
            store.assure(&json!({"a": 1})).await.unwrap_err(),
            StoreError::NotAnObject
        ));
    }

    #[test]
    fn debug_format() {
        let store = Store::<Value>::open(StoreOptions::new().encrypt("pw")).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("Store"));
        assert!(debug.contains("encrypted: true"));
        assert!(!debug.contains("pw\""));
    }
}
