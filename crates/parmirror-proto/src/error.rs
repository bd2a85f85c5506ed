/// Errors that can occur while moving frames over a byte stream.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x504D \"PM\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A message failed to serialize to JSON.
    #[error("message serialization failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors that can occur while decoding a message payload.
///
/// Receivers treat every variant the same way: log it and drop the
/// frame. Nothing here is allowed to terminate a connection.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not a JSON object.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The payload has no string `"type"` field.
    #[error("message has no \"type\" field")]
    MissingType,

    /// The `"type"` is recognized but the payload shape is wrong.
    #[error("bad {kind} payload: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, WireError>;
