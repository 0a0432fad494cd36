//! Passphrase-keyed byte obfuscation for storeosaurus.
//!
//! Provides [`ByteTransform`], a reversible keystream transform applied to
//! whole document files when a store is opened with a passphrase.
//!
//! This is obfuscation, not encryption. The transform has no diffusion and
//! no integrity check; it only keeps file contents from being readable at a
//! glance. Anyone holding the file and a little patience can recover the
//! plaintext without the passphrase.

pub mod transform;

pub use transform::{ByteTransform, CryptoError, CryptoResult, SEED_MODULUS};
