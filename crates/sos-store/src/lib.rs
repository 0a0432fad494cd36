//! Embedded single-file document store.
//!
//! A [`Store`] persists one serde value to one JSON file, keeps a working
//! copy in memory, and gives scoped read/modify/write access to it.
//!
//! ```no_run
//! # async fn demo() -> sos_store::StoreResult<()> {
//! use serde::{Deserialize, Serialize};
//! use sos_store::{Store, StoreOptions};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Counter {
//!     value: u64,
//! }
//!
//! let mut counter = Store::open(
//!     StoreOptions::new()
//!         .name("counter")
//!         .default_value(Counter { value: 0 }),
//! )?;
//! counter.write(|c| c.value += 1).await?;
//! println!("counter: {}", counter.read_with(|c| c.value).await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Options
//!
//! - `name` / `file_path` -- where the file lives (`store.json` by default)
//! - `default` -- value adopted while no file exists
//! - `encrypt` -- passphrase for [`sos_crypto::ByteTransform`] obfuscation
//! - `lazy_read` / `lazy_write` -- cache reads until `reload`, defer writes
//!   until `sync`
//! - `version` / `migrate` -- schema version and upgrade hook
//!
//! # Concurrency
//!
//! Stores are independent. Several may point at the same file; each
//! non-lazy operation re-reads the file, so sequential operations across
//! stores observe each other. Nothing is locked: concurrent writers lose
//! updates, and the last writer wins.

pub mod config;
pub mod error;
pub mod migrate;
pub mod state;
pub mod store;

pub use config::{resolve_store_path, StoreOptions, StoreSettings, DEFAULT_FILE_NAME, FILE_SUFFIX};
pub use error::{StoreError, StoreResult};
pub use migrate::Migrate;
pub use state::CacheState;
pub use store::{BoxFuture, Store};

// Re-export the collaborator types callers commonly need.
pub use sos_backend::{BackendError, FileBackend, InMemoryBackend, StorageBackend};
pub use sos_codec::DEFAULT_SCHEMA_VERSION;
