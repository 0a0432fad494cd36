//! Persistence backends for storeosaurus.
//!
//! A backend moves whole files of bytes in and out of storage. It never
//! interprets contents; envelopes and obfuscation live in the layers above.
//!
//! # Backends
//!
//! All backends implement the [`StorageBackend`] trait:
//!
//! - [`FileBackend`] -- local file system, atomic write-then-rename
//! - [`InMemoryBackend`] -- `HashMap`-based store for tests and embedding
//!
//! # Rules
//!
//! 1. A missing file is reported as [`BackendError::NotFound`], never as a
//!    generic I/O failure.
//! 2. Writes replace the whole file; readers never observe a partial write
//!    through the same backend.
//! 3. Backends never delete files.
//! 4. There is no locking. Concurrent writers to the same path race and
//!    the last one wins.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use traits::{ReadOutcome, StorageBackend};
