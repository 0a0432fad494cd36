use serde::Serialize;
use serde_json::Value;

/// Format-family tag written to every envelope.
pub const FORMAT_TYPE: &str = "v1";

/// Schema version assumed when none is configured, and for envelopes
/// written before the `version` field existed.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// A decoded store file: schema version plus untyped payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub version: u32,
    pub data: Value,
}

impl Envelope {
    pub fn new(version: u32, data: Value) -> Self {
        Self { version, data }
    }

    /// Whether the payload was written by an older schema than `target`.
    pub fn is_older_than(&self, target: u32) -> bool {
        self.version < target
    }
}

/// Borrowed wire shape used for encoding, so typed payloads serialize
/// without an intermediate `Value`.
#[derive(Serialize)]
pub(crate) struct WireEnvelope<'a, T: ?Sized> {
    #[serde(rename = "isStoreFile")]
    pub is_store_file: bool,
    #[serde(rename = "type")]
    pub format: &'static str,
    pub version: u32,
    pub data: &'a T,
}

impl<'a, T: ?Sized + Serialize> WireEnvelope<'a, T> {
    pub fn new(version: u32, data: &'a T) -> Self {
        Self {
            is_store_file: true,
            format: FORMAT_TYPE,
            version,
            data,
        }
    }
}
