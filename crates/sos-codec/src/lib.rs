//! On-disk envelope format for storeosaurus.
//!
//! Every store file is a JSON object of the form
//!
//! ```text
//! {"isStoreFile": true, "type": "v1", "version": <u32>, "data": <payload>}
//! ```
//!
//! `type` names the envelope format family and stays fixed across schema
//! versions. `version` is the caller's schema version for `data`.
//!
//! [`DocumentCodec`] turns envelopes into bytes and back, telling apart
//! bytes that are not JSON at all ([`CodecError::MalformedPayload`]) from
//! JSON that is not an envelope ([`CodecError::InvalidFormat`]).

pub mod codec;
pub mod envelope;
pub mod error;

pub use codec::DocumentCodec;
pub use envelope::{Envelope, DEFAULT_SCHEMA_VERSION, FORMAT_TYPE};
pub use error::{CodecError, CodecResult};
