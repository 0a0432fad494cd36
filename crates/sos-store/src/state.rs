/// Cache freshness of a store's in-memory value.
///
/// `loaded` means a value has been established from disk or defaults;
/// `dirty` means the value holds writes not yet persisted (lazy-write only).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheState {
    loaded: bool,
    dirty: bool,
}

impl CacheState {
    /// Whether the next access must go to disk first.
    pub fn needs_load(&self, lazy_read: bool) -> bool {
        !(lazy_read && self.loaded)
    }

    /// A fresh value was read from disk or adopted from defaults.
    pub fn on_loaded(&mut self) {
        self.loaded = true;
        self.dirty = false;
    }

    /// A write replaced the value, persisted or deferred.
    pub fn on_written(&mut self, persisted: bool) {
        self.loaded = true;
        self.dirty = !persisted;
    }

    /// The current value reached disk.
    pub fn on_synced(&mut self) {
        self.dirty = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
