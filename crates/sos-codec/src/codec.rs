use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::envelope::{Envelope, WireEnvelope, DEFAULT_SCHEMA_VERSION, FORMAT_TYPE};
use crate::error::{CodecError, CodecResult};

/// Codec for store envelopes.
pub struct DocumentCodec;

impl DocumentCodec {
    /// Wrap `payload` in an envelope at `version` and serialize it.
    pub fn encode<T: ?Sized + Serialize>(version: u32, payload: &T) -> CodecResult<Vec<u8>> {
        let bytes = serde_json::to_vec(&WireEnvelope::new(version, payload))
            .map_err(|e| CodecError::Serialization(e.to_string()))?;
        trace!(version, bytes = bytes.len(), "encoded envelope");
        Ok(bytes)
    }

    /// Parse bytes back into an [`Envelope`].
    ///
    /// Fails with `MalformedPayload` when the bytes are not JSON, and with
    /// `InvalidFormat` when the JSON lacks the `isStoreFile: true` marker, the
    /// `"v1"` type tag, or a `data` field. A missing `version` reads as
    /// [`DEFAULT_SCHEMA_VERSION`].
    pub fn decode(bytes: &[u8]) -> CodecResult<Envelope> {
        let document: Value = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::MalformedPayload(e.to_string()))?;

        let Value::Object(mut fields) = document else {
            return Err(CodecError::InvalidFormat("document is not an object".into()));
        };

        if fields.get("isStoreFile") != Some(&Value::Bool(true)) {
            return Err(CodecError::InvalidFormat("missing isStoreFile marker".into()));
        }
        match fields.get("type") {
            Some(Value::String(tag)) if tag == FORMAT_TYPE => {}
            Some(other) => {
                return Err(CodecError::InvalidFormat(format!(
                    "unsupported format type {other}"
                )))
            }
            None => return Err(CodecError::InvalidFormat("missing format type".into())),
        }

        let version = Self::version_of(&fields)?;
        let data = fields
            .remove("data")
            .ok_or_else(|| CodecError::InvalidFormat("missing data field".into()))?;

        Ok(Envelope::new(version, data))
    }

    fn version_of(fields: &Map<String, Value>) -> CodecResult<u32> {
        match fields.get("version") {
            None => Ok(DEFAULT_SCHEMA_VERSION),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| CodecError::InvalidFormat(format!("invalid schema version {n}"))),
            Some(other) => Err(CodecError::InvalidFormat(format!(
                "invalid schema version {other}"
            ))),
        }
    }
}
