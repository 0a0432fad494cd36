use thiserror::Error;

/// Errors from envelope encoding and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes parsed, but are not a store envelope.
    #[error("invalid store file format: {0}")]
    InvalidFormat(String),

    /// The bytes could not be parsed as JSON at all.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
